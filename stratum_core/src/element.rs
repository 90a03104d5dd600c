// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable element descriptors.
//!
//! A [`Node`] describes the desired shape of a subtree. Descriptors are cheap
//! to clone (everything heavy sits behind an [`Rc`]) and are compared by
//! identity, not by value: handing the reconciler the same [`Props`]
//! allocation again is how a caller says "nothing changed here".

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use core::any::Any;
use core::cell::RefCell;
use core::fmt;

use crate::hooks::Scope;
use crate::suspense::Throw;

/// An opaque, reference-counted value carried by contexts and hook state.
pub type Value = Rc<dyn Any>;

/// What a function component returns.
pub type RenderResult = Result<Node, Throw>;

/// A description of zero or more children.
#[derive(Clone, Default)]
pub enum Node {
    /// Renders nothing.
    #[default]
    Empty,
    /// A host text node.
    Text(Rc<str>),
    /// A single element.
    Element(Element),
    /// An ordered list of children.
    List(Rc<[Node]>),
}

impl Node {
    /// Creates a text node.
    #[must_use]
    pub fn text(content: impl Into<Rc<str>>) -> Self {
        Self::Text(content.into())
    }

    /// Creates a list of children.
    #[must_use]
    pub fn list(children: impl IntoIterator<Item = Self>) -> Self {
        Self::List(children.into_iter().collect())
    }

    /// Identity comparison.
    ///
    /// Two descriptors are the same when they share allocations; structurally
    /// equal but separately built descriptors are not.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => Rc::ptr_eq(a, b),
            (Self::Element(a), Self::Element(b)) => a.same(b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<&str> for Node {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(t) => write!(f, "Text({t:?})"),
            Self::Element(e) => e.fmt(f),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

/// An explicit reconciliation key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Rc<str>);

impl Key {
    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self(key.into())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self(key.into())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", &*self.0)
    }
}

/// Props shared by every element kind.
///
/// Host elements hand `attrs` to the host adapter; components read whatever
/// they need. `fallback` is only meaningful on suspense boundaries and
/// `value` only on context providers.
#[derive(Clone, Default)]
pub struct Props {
    /// Host attributes, or arbitrary string inputs for components.
    pub attrs: BTreeMap<String, String>,
    /// Child description.
    pub children: Node,
    /// Suspense fallback description.
    pub fallback: Node,
    /// Context provider value.
    pub value: Option<Value>,
}

impl Props {
    /// Looks up an attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("attrs", &self.attrs)
            .field("children", &self.children)
            .field("fallback", &self.fallback)
            .field("value", &self.value.as_ref().map(|_| ".."))
            .finish()
    }
}

/// The type of an element, which decides the fiber kind it reconciles into.
#[derive(Clone)]
pub enum ElementType {
    /// A host node with the given tag.
    Host(Rc<str>),
    /// A function component.
    Function(Component),
    /// A grouping wrapper without a host node.
    Fragment,
    /// A context provider.
    Provider(Context),
    /// A suspense boundary.
    Suspense,
}

impl ElementType {
    /// Returns `true` when fibers of the two types can be reused for each other.
    #[must_use]
    pub fn same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Host(a), Self::Host(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a.same(b),
            (Self::Fragment, Self::Fragment) | (Self::Suspense, Self::Suspense) => true,
            (Self::Provider(a), Self::Provider(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(tag) => write!(f, "Host({tag:?})"),
            Self::Function(c) => write!(f, "Function({:?})", c.name()),
            Self::Fragment => f.write_str("Fragment"),
            Self::Provider(c) => write!(f, "Provider({:?})", c.name()),
            Self::Suspense => f.write_str("Suspense"),
        }
    }
}

/// A single element descriptor.
#[derive(Clone, Debug)]
pub struct Element {
    /// The element type.
    pub ty: ElementType,
    /// Optional reconciliation key.
    pub key: Option<Key>,
    /// Optional ref attached to the host node.
    pub node_ref: Option<NodeRef>,
    /// Props, compared by identity during bailout.
    pub props: Rc<Props>,
}

impl Element {
    /// Creates an element with empty props.
    #[must_use]
    pub fn new(ty: ElementType) -> Self {
        Self {
            ty,
            key: None,
            node_ref: None,
            props: Rc::new(Props::default()),
        }
    }

    /// A host element.
    #[must_use]
    pub fn host(tag: &str) -> Self {
        Self::new(ElementType::Host(tag.into()))
    }

    /// A function component element.
    #[must_use]
    pub fn component(component: &Component) -> Self {
        Self::new(ElementType::Function(component.clone()))
    }

    /// A fragment element.
    #[must_use]
    pub fn fragment() -> Self {
        Self::new(ElementType::Fragment)
    }

    /// A context provider element carrying `value`.
    #[must_use]
    pub fn provider(context: &Context, value: Value) -> Self {
        let mut element = Self::new(ElementType::Provider(context.clone()));
        Rc::make_mut(&mut element.props).value = Some(value);
        element
    }

    /// A suspense boundary with the given fallback.
    #[must_use]
    pub fn suspense(fallback: impl Into<Node>) -> Self {
        let mut element = Self::new(ElementType::Suspense);
        Rc::make_mut(&mut element.props).fallback = fallback.into();
        element
    }

    /// Sets the key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        Rc::make_mut(&mut self.props)
            .attrs
            .insert(name.into(), value.into());
        self
    }

    /// Sets the children.
    #[must_use]
    pub fn with_children(mut self, children: impl Into<Node>) -> Self {
        Rc::make_mut(&mut self.props).children = children.into();
        self
    }

    /// Attaches a ref.
    #[must_use]
    pub fn with_ref(mut self, node_ref: &NodeRef) -> Self {
        self.node_ref = Some(node_ref.clone());
        self
    }

    /// Identity comparison; see [`Node::same`].
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.props, &other.props)
            && self.key == other.key
            && self.ty.same_type(&other.ty)
    }
}

type RenderFn = dyn Fn(&mut Scope<'_>, &Props) -> RenderResult;

/// A function component.
///
/// Two components are the same type only if they are clones of one
/// `Component` value.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    /// Wraps a render function.
    pub fn new(
        name: &str,
        render: impl Fn(&mut Scope<'_>, &Props) -> RenderResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Rc::new(render),
        }
    }

    /// The name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if both handles wrap the same render function.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }

    pub(crate) fn render(&self, scope: &mut Scope<'_>, props: &Props) -> RenderResult {
        (self.render)(scope, props)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({:?})", &*self.name)
    }
}

struct ContextInner {
    name: Rc<str>,
    default: Value,
}

/// A context: a value provided by an ancestor and read by descendants.
#[derive(Clone)]
pub struct Context(Rc<ContextInner>);

impl Context {
    /// Creates a context with a default value used when no provider is mounted.
    #[must_use]
    pub fn new(name: &str, default: Value) -> Self {
        Self(Rc::new(ContextInner {
            name: name.into(),
            default,
        }))
    }

    /// The name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The default value.
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.0.default.clone()
    }

    /// Identity comparison.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:?})", &*self.0.name)
    }
}

/// A slot the commit phase fills with the host instance of an element.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<RefCell<Option<Box<dyn Any>>>>);

impl NodeRef {
    /// Creates a detached ref.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the attached host instance, if any and if it has type `I`.
    #[must_use]
    pub fn get<I: Clone + 'static>(&self) -> Option<I> {
        self.0.borrow().as_ref()?.downcast_ref::<I>().cloned()
    }

    /// Returns `true` while a host instance is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Identity comparison.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn attach<I: 'static>(&self, instance: I) {
        *self.0.borrow_mut() = Some(Box::new(instance));
    }

    pub(crate) fn detach(&self) {
        *self.0.borrow_mut() = None;
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef")
            .field(&self.is_attached())
            .finish()
    }
}
