//! Route tree storage and the recursive algorithms over it.
//!
//! A [`RouteTree`] is an arena of nodes. Slot 0 is the root; every other slot
//! records the index of the node that introduced it as `parent`. Parent links
//! are plain indices, they never own anything and are only followed to compute
//! full paths. Children are kept in declaration order, which is also the
//! traversal and registration order.
//!
//! Trees are built bottom-up: children are finished trees that get grafted
//! into their parent's arena, so a node's slots always form one contiguous,
//! pre-ordered block.
use std::fmt;

use axum::http::Method;

use crate::core::{
    alias::expand_aliases,
    path::join_paths,
    route::{Action, Guard, Hook, Route, RoutePath, Subroute},
};

/// Index of a node within its [`RouteTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Slot {
    route: Route,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An owned, acyclic route definition tree.
#[derive(Debug, Clone)]
pub struct RouteTree {
    slots: Vec<Slot>,
}

impl RouteTree {
    /// Create a node owning `subroutes`. Alias entries are expanded against
    /// their siblings before the children are attached.
    pub fn new<I>(route: Route, subroutes: I) -> Self
    where
        I: IntoIterator<Item = Subroute>,
    {
        let mut tree = Self {
            slots: vec![Slot {
                route,
                parent: None,
                children: Vec::new(),
            }],
        };
        for child in expand_aliases(subroutes.into_iter().collect()) {
            tree.graft(NodeId::ROOT, child);
        }
        tree
    }

    /// A node without children.
    pub fn leaf(route: Route) -> Self {
        Self::new(route, [])
    }

    /// Move `child` into this arena below `parent`.
    fn graft(&mut self, parent: NodeId, child: RouteTree) -> NodeId {
        let offset = self.slots.len();
        let shift = |id: NodeId| NodeId(id.0 + offset);

        for slot in child.slots {
            self.slots.push(Slot {
                route: slot.route,
                parent: Some(slot.parent.map_or(parent, shift)),
                children: slot.children.into_iter().map(shift).collect(),
            });
        }

        let id = NodeId(offset);
        self.slots[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: NodeId::ROOT,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.0 < self.slots.len()).then_some(NodeRef { tree: self, id })
    }

    /// Mutable access to a node's scalar fields. Structure cannot change
    /// through this handle.
    pub fn route_mut(&mut self, id: NodeId) -> Option<&mut Route> {
        self.slots.get_mut(id.0).map(|slot| &mut slot.route)
    }

    pub fn root_mut(&mut self) -> &mut Route {
        &mut self.slots[0].route
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn name(&self) -> &str {
        self.root().name()
    }

    /// Visit every node in pre-order: a node, then each child left to right.
    pub fn iter<'a, F>(&'a self, visit: F)
    where
        F: FnMut(NodeRef<'a>),
    {
        self.root().iter(visit)
    }

    /// Nodes in pre-order.
    pub fn nodes(&self) -> Vec<NodeRef<'_>> {
        self.root().nodes()
    }

    /// Produce an independent copy whose nodes are `transform(copy of node)`.
    pub fn map<F>(&self, transform: F) -> RouteTree
    where
        F: FnMut(Route) -> Route,
    {
        self.root().map(transform)
    }

    /// First node named `name`, searching in pre-order.
    pub fn search(&self, name: &str) -> Option<NodeRef<'_>> {
        self.root().search(name)
    }

    fn map_into<F>(
        &self,
        id: NodeId,
        transform: &mut F,
        out: &mut Vec<Slot>,
        parent: Option<NodeId>,
    ) -> NodeId
    where
        F: FnMut(Route) -> Route,
    {
        let new_id = NodeId(out.len());
        let slot = &self.slots[id.0];
        out.push(Slot {
            route: transform(slot.route.clone()),
            parent,
            children: Vec::with_capacity(slot.children.len()),
        });
        for &child in &slot.children {
            let mapped = self.map_into(child, transform, out, Some(new_id));
            out[new_id.0].children.push(mapped);
        }
        new_id
    }
}

/// Borrowed handle to one node of a [`RouteTree`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a RouteTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a RouteTree {
        self.tree
    }

    fn slot(&self) -> &'a Slot {
        &self.tree.slots[self.id.0]
    }

    pub fn route(&self) -> &'a Route {
        &self.slot().route
    }

    pub fn name(&self) -> &'a str {
        &self.route().name
    }

    /// Segment relative to the parent.
    pub fn path(&self) -> &'a str {
        &self.route().path
    }

    pub fn methods(&self) -> Option<&'a [Method]> {
        self.route().methods.as_deref()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.slot().parent.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    /// Root of the tree this node belongs to.
    pub fn root_of(&self) -> NodeRef<'a> {
        self.tree.root()
    }

    pub fn children(self) -> impl Iterator<Item = NodeRef<'a>> {
        let tree = self.tree;
        self.slot()
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    pub fn has_children(&self) -> bool {
        !self.slot().children.is_empty()
    }

    /// Segments from the root down to this node, joined and cleaned.
    pub fn full_path(&self) -> String {
        let mut segments = Vec::new();
        let mut current = Some(*self);
        while let Some(node) = current {
            segments.push(node.path());
            current = node.parent();
        }
        segments.reverse();
        join_paths(segments)
    }

    pub fn iter<F>(&self, mut visit: F)
    where
        F: FnMut(NodeRef<'a>),
    {
        let mut stack = vec![*self];
        while let Some(node) = stack.pop() {
            visit(node);
            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev());
        }
    }

    pub fn nodes(&self) -> Vec<NodeRef<'a>> {
        let mut nodes = Vec::new();
        self.iter(|node| nodes.push(node));
        nodes
    }

    /// First node of this subtree named `name`. Ancestors and siblings are
    /// never inspected.
    pub fn search(&self, name: &str) -> Option<NodeRef<'a>> {
        if self.name() == name {
            return Some(*self);
        }
        self.children().find_map(|child| child.search(name))
    }

    /// Map this subtree into a new standalone tree.
    pub fn map<F>(&self, mut transform: F) -> RouteTree
    where
        F: FnMut(Route) -> Route,
    {
        let mut slots = Vec::new();
        self.tree.map_into(self.id, &mut transform, &mut slots, None);
        RouteTree { slots }
    }

    /// Deep copy of this subtree as a standalone tree.
    pub fn subtree(&self) -> RouteTree {
        self.map(|route| route)
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("path", &self.path())
            .finish()
    }
}

/// Node with hooks, guards and children.
pub fn route<I>(
    path: impl Into<RoutePath>,
    action: impl Into<Action>,
    name: impl Into<String>,
    hooks: impl IntoIterator<Item = Hook>,
    guards: impl IntoIterator<Item = Guard>,
    subroutes: I,
) -> RouteTree
where
    I: IntoIterator<Item = Subroute>,
{
    let route = Route::new(path, name)
        .with_action(action)
        .with_hooks(hooks)
        .with_guards(guards);
    RouteTree::new(route, subroutes)
}

/// Node with children but no hooks or guards.
pub fn sroute<I>(
    path: impl Into<RoutePath>,
    action: impl Into<Action>,
    name: impl Into<String>,
    subroutes: I,
) -> RouteTree
where
    I: IntoIterator<Item = Subroute>,
{
    route(path, action, name, [], [], subroutes)
}
