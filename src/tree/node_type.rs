//! Node types, node props, and node sets.
//!
//! The set of props is closed at grammar-compile time, so [`NodeProp`] is an
//! enum rather than an open registry. Per-type props live on [`NodeType`];
//! per-node props ([`NodeProp::ContextHash`], [`NodeProp::LookAhead`]) live on
//! individual [`Tree`](super::Tree) values.

use std::fmt;
use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::error::{ParseError, Result};

// ============================================================================
// PROPS
// ============================================================================

/// Attribute keys that can be attached to node types or nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeProp {
    /// Names of the node types that close this opening delimiter.
    ClosedBy,
    /// Names of the node types that open this closing delimiter.
    OpenedBy,
    /// Group names this node type belongs to, used by [`NodeType::is`].
    Group,
    /// Hash of the context tracker value a node was parsed in (per node).
    ContextHash,
    /// How far past its end the tokenizer looked while parsing a node (per node).
    LookAhead,
}

impl NodeProp {
    pub const ALL: [NodeProp; 5] = [
        NodeProp::ClosedBy,
        NodeProp::OpenedBy,
        NodeProp::Group,
        NodeProp::ContextHash,
        NodeProp::LookAhead,
    ];

    /// Whether this prop is stored on individual trees instead of types.
    pub fn per_node(self) -> bool {
        matches!(self, Self::ContextHash | Self::LookAhead)
    }

    /// Serialized name, as used in parser files.
    pub fn name(self) -> &'static str {
        match self {
            Self::ClosedBy => "closedBy",
            Self::OpenedBy => "openedBy",
            Self::Group => "group",
            Self::ContextHash => "contextHash",
            Self::LookAhead => "lookAhead",
        }
    }

    /// Look a prop up by its serialized name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|prop| prop.name() == name)
    }

    /// Parse the textual form of a value for this prop.
    pub fn deserialize(self, value: &str) -> Result<PropValue> {
        match self {
            Self::ClosedBy | Self::OpenedBy | Self::Group => Ok(PropValue::Names(
                value.split(' ').filter(|s| !s.is_empty()).map(SmolStr::new).collect(),
            )),
            Self::ContextHash | Self::LookAhead => value
                .trim()
                .parse::<u32>()
                .map(PropValue::Number)
                .map_err(|_| ParseError::invalid_prop(self.name(), value)),
        }
    }
}

/// The value of a [`NodeProp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Names(Vec<SmolStr>),
    Number(u32),
}

impl PropValue {
    pub fn as_names(&self) -> Option<&[SmolStr]> {
        match self {
            Self::Names(names) => Some(names),
            Self::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<u32> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Names(_) => None,
        }
    }
}

/// A function that may assign a prop to a node type when extending a set.
pub type PropSource = Arc<dyn Fn(&NodeType) -> Option<(NodeProp, PropValue)> + Send + Sync>;

/// Build a prop source that assigns values to types by name or group.
///
/// Selectors may list several names separated by spaces.
pub fn prop_source<I, S>(prop: NodeProp, entries: I) -> PropSource
where
    I: IntoIterator<Item = (S, PropValue)>,
    S: AsRef<str>,
{
    let mut table: FxHashMap<SmolStr, PropValue> = FxHashMap::default();
    for (selector, value) in entries {
        for name in selector.as_ref().split(' ').filter(|s| !s.is_empty()) {
            table.insert(SmolStr::new(name), value.clone());
        }
    }
    Arc::new(move |ty: &NodeType| {
        if let Some(value) = table.get(ty.name()) {
            return Some((prop, value.clone()));
        }
        let groups = ty.prop(NodeProp::Group).and_then(PropValue::as_names)?;
        groups
            .iter()
            .find_map(|group| table.get(group))
            .map(|value| (prop, value.clone()))
    })
}

// ============================================================================
// NODE TYPES
// ============================================================================

const FLAG_TOP: u8 = 1;
const FLAG_SKIPPED: u8 = 2;
const FLAG_ERROR: u8 = 4;
const FLAG_ANONYMOUS: u8 = 8;

/// Description used to define a [`NodeType`].
#[derive(Debug, Clone, Default)]
pub struct NodeTypeSpec {
    /// Name, or `None` for an anonymous type.
    pub name: Option<String>,
    pub id: u16,
    pub props: Vec<(NodeProp, PropValue)>,
    pub top: bool,
    pub error: bool,
    pub skipped: bool,
}

struct NodeTypeData {
    name: SmolStr,
    id: u16,
    props: FxHashMap<NodeProp, PropValue>,
    flags: u8,
}

/// A node type. Cheap to clone; identity is shared by all clones.
#[derive(Clone)]
pub struct NodeType(Arc<NodeTypeData>);

impl NodeType {
    /// Define a node type.
    pub fn define(spec: NodeTypeSpec) -> Self {
        let flags = if spec.top { FLAG_TOP } else { 0 }
            | if spec.skipped { FLAG_SKIPPED } else { 0 }
            | if spec.error { FLAG_ERROR } else { 0 }
            | match spec.name.as_deref() {
                Some(name) if !name.is_empty() => 0,
                _ => FLAG_ANONYMOUS,
            };
        Self(Arc::new(NodeTypeData {
            name: SmolStr::new(spec.name.unwrap_or_default()),
            id: spec.id,
            props: spec.props.into_iter().collect(),
            flags,
        }))
    }

    /// The anonymous type used for grouping nodes created by balancing.
    pub fn none() -> Self {
        static NONE: OnceLock<NodeType> = OnceLock::new();
        NONE.get_or_init(|| {
            NodeType::define(NodeTypeSpec {
                name: None,
                id: 0,
                ..Default::default()
            })
        })
        .clone()
    }

    /// Name of the type, empty for anonymous types.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn id(&self) -> u16 {
        self.0.id
    }

    /// Value of a per-type prop.
    pub fn prop(&self, prop: NodeProp) -> Option<&PropValue> {
        self.0.props.get(&prop)
    }

    pub fn is_top(&self) -> bool {
        self.0.flags & FLAG_TOP > 0
    }

    pub fn is_skipped(&self) -> bool {
        self.0.flags & FLAG_SKIPPED > 0
    }

    pub fn is_error(&self) -> bool {
        self.0.flags & FLAG_ERROR > 0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.flags & FLAG_ANONYMOUS > 0
    }

    /// Whether this type has the given name or belongs to a group of that name.
    pub fn is(&self, name: &str) -> bool {
        if self.name() == name {
            return true;
        }
        self.prop(NodeProp::Group)
            .and_then(PropValue::as_names)
            .is_some_and(|groups| groups.iter().any(|g| g == name))
    }

    /// Identity comparison; two types are the same only if they share storage.
    pub fn same(&self, other: &NodeType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn with_props(&self, extra: Vec<(NodeProp, PropValue)>) -> Self {
        let mut props = self.0.props.clone();
        for (prop, value) in extra {
            match (props.get_mut(&prop), value) {
                (Some(PropValue::Names(existing)), PropValue::Names(more)) => {
                    existing.extend(more);
                }
                (_, value) => {
                    props.insert(prop, value);
                }
            }
        }
        Self(Arc::new(NodeTypeData {
            name: self.0.name.clone(),
            id: self.0.id,
            props,
            flags: self.0.flags,
        }))
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for NodeType {}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name())
            .field("id", &self.id())
            .finish()
    }
}

// ============================================================================
// NODE SETS
// ============================================================================

/// The node types of a grammar, indexed by id. Cheap to clone.
#[derive(Clone, Debug)]
pub struct NodeSet {
    types: Arc<[NodeType]>,
}

impl NodeSet {
    /// Create a set. Every type's id must equal its index.
    pub fn new(types: Vec<NodeType>) -> Result<Self> {
        for (index, ty) in types.iter().enumerate() {
            if usize::from(ty.id()) != index {
                return Err(ParseError::NodeSetMismatch { index, id: ty.id() });
            }
        }
        Ok(Self {
            types: types.into(),
        })
    }

    pub fn types(&self) -> &[NodeType] {
        &self.types
    }

    pub fn get(&self, id: u16) -> Option<&NodeType> {
        self.types.get(usize::from(id))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Create a copy of this set with props from the given sources added.
    ///
    /// Types that receive no new props keep their identity.
    pub fn extend(&self, sources: &[PropSource]) -> Self {
        let types = self
            .types
            .iter()
            .map(|ty| {
                let added: Vec<_> = sources.iter().filter_map(|source| source(ty)).collect();
                if added.is_empty() {
                    ty.clone()
                } else {
                    ty.with_props(added)
                }
            })
            .collect::<Vec<_>>();
        Self {
            types: types.into(),
        }
    }
}
