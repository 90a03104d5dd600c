// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reconciler configuration.

/// Tunables for a [`Reconciler`](crate::reconciler::Reconciler).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// How many times a render that raised a component error is retried
    /// before [`ReconcileError::RenderFailed`](crate::error::ReconcileError::RenderFailed)
    /// is returned.
    pub max_render_retries: u32,
    /// Whether non-sync lanes render with the yielding driver.
    ///
    /// When `false`, every scheduled task renders to completion in one go,
    /// as if it had timed out.
    pub time_slicing: bool,
}

impl ReconcilerConfig {
    /// Default configuration: time slicing on, 20 retries.
    pub const DEFAULT: Self = Self {
        max_render_retries: 20,
        time_slicing: true,
    };

    /// Configuration that never yields mid-render.
    #[must_use]
    pub const fn blocking() -> Self {
        Self {
            time_slicing: false,
            ..Self::DEFAULT
        }
    }

    /// Returns a copy with a different retry budget.
    #[must_use]
    pub const fn with_max_render_retries(self, max_render_retries: u32) -> Self {
        Self {
            max_render_retries,
            ..self
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        assert_eq!(ReconcilerConfig::default(), ReconcilerConfig::DEFAULT);
        assert!(!ReconcilerConfig::blocking().time_slicing);
        assert_eq!(ReconcilerConfig::blocking().max_render_retries, 20);
        assert_eq!(
            ReconcilerConfig::DEFAULT
                .with_max_render_retries(2)
                .max_render_retries,
            2
        );
    }
}
