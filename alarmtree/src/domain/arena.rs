use std::fmt;

use generational_arena::{Arena, Index};
use tracing::{debug, instrument};

use crate::domain::entities::{Attributes, ComponentData, StoreMeta};
use crate::domain::error::{DomainError, DomainResult};

/// Separator used for full paths and diff keys unless configured otherwise.
pub const DEFAULT_PATH_SEPARATOR: &str = "/";
/// Separator used for full names (PV name base).
pub const DEFAULT_NAME_SEPARATOR: &str = ":";

/// Tree node in the arena-based component hierarchy.
#[derive(Debug, Clone)]
pub struct ComponentNode {
    /// Name, attributes and store metadata
    pub data: ComponentData,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena, in insertion order
    pub children: Vec<Index>,
}

/// Arena-based alarm component tree.
///
/// The tree owns every node. Parent links are plain indices and are only
/// followed upwards for naming and ancestor searches; dropping a node always
/// flows from parent to children.
#[derive(Debug, Clone)]
pub struct AlarmTree {
    arena: Arena<ComponentNode>,
    root: Option<Index>,
}

impl Default for AlarmTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    /// Build a tree whose root is a copy of `subtree`.
    pub fn from_subtree(subtree: &Subtree) -> DomainResult<Self> {
        subtree.check_unique_names()?;
        let mut tree = Self::new();
        tree.attach(None, subtree);
        Ok(tree)
    }

    /// Add a single node. `None` as parent creates the root.
    ///
    /// Sibling names must be unique; a clash is reported as
    /// [`DomainError::DuplicateName`] and the tree is left unchanged.
    #[instrument(level = "trace", skip(self, data), fields(name = %data.name))]
    pub fn insert_node(&mut self, data: ComponentData, parent: Option<Index>) -> DomainResult<Index> {
        match parent {
            Some(parent_idx) => {
                let parent_ref = self.get(parent_idx).ok_or(DomainError::StaleHandle)?;
                if parent_ref.child_by_name(&data.name).is_some() {
                    return Err(DomainError::DuplicateName {
                        name: data.name,
                        parent_path: parent_ref.full_path(DEFAULT_PATH_SEPARATOR),
                    });
                }
            }
            None => {
                if self.root.is_some() {
                    return Err(DomainError::configuration(format!(
                        "tree already has a root, cannot add {} as a second one",
                        data.name
                    )));
                }
            }
        }

        let node_idx = self.arena.insert(ComponentNode {
            data,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent_idx) => self.arena[parent_idx].children.push(node_idx),
            None => self.root = Some(node_idx),
        }
        Ok(node_idx)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn root_component(&self) -> Option<ComponentRef<'_>> {
        self.root.and_then(|idx| self.get(idx))
    }

    pub fn get(&self, idx: Index) -> Option<ComponentRef<'_>> {
        self.arena.get(idx).map(|_| ComponentRef { tree: self, idx })
    }

    pub fn get_node(&self, idx: Index) -> Option<&ComponentNode> {
        self.arena.get(idx)
    }

    /// Mutable access to a node's payload.
    ///
    /// Callers renaming a node are responsible for keeping sibling names unique.
    pub fn data_mut(&mut self, idx: Index) -> Option<&mut ComponentData> {
        self.arena.get_mut(idx).map(|node| &mut node.data)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Pre-order traversal from the root.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self, self.root)
    }

    /// Pre-order traversal of the subtree rooted at `idx`.
    pub fn iter_from(&self, idx: Index) -> TreeIterator<'_> {
        TreeIterator::new(self, Some(idx))
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.root_component().map(|root| root.depth()).unwrap_or(0)
    }

    /// Full paths of every leaf, in traversal order.
    #[instrument(level = "debug", skip(self))]
    pub fn leaf_paths(&self, separator: &str) -> Vec<String> {
        self.iter()
            .filter(|component| component.is_leaf())
            .map(|component| component.full_path(separator))
            .collect()
    }

    /// Insert a deep copy of `donor` (taken from any other tree) under `parent`.
    ///
    /// Returns the index of the copy. To copy a subtree within the same tree,
    /// snapshot it first with [`ComponentRef::to_subtree`] and use
    /// [`AlarmTree::insert_subtree`].
    pub fn insert(&mut self, parent: Index, donor: ComponentRef<'_>) -> DomainResult<Index> {
        let snapshot = donor.to_subtree();
        self.insert_subtree(parent, &snapshot)
    }

    /// Insert a deep copy of a detached subtree under `parent`.
    #[instrument(level = "debug", skip(self, subtree), fields(name = %subtree.data.name))]
    pub fn insert_subtree(&mut self, parent: Index, subtree: &Subtree) -> DomainResult<Index> {
        let parent_ref = self.get(parent).ok_or(DomainError::StaleHandle)?;
        if parent_ref.child_by_name(&subtree.data.name).is_some() {
            return Err(DomainError::DuplicateName {
                name: subtree.data.name.clone(),
                parent_path: parent_ref.full_path(DEFAULT_PATH_SEPARATOR),
            });
        }
        subtree.check_unique_names()?;

        let idx = self.attach(Some(parent), subtree);
        debug!("inserted {} nodes", subtree.node_count());
        Ok(idx)
    }

    /// Detach `child` from `parent` and drop it together with its subtree.
    ///
    /// The lookup is keyed on the handle held in `parent`'s children, not on
    /// the child's name.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&mut self, parent: Index, child: Index) -> DomainResult<()> {
        let parent_node = self.arena.get(parent).ok_or(DomainError::StaleHandle)?;
        let Some(position) = parent_node.children.iter().position(|&c| c == child) else {
            let name = self
                .arena
                .get(child)
                .map(|node| node.data.name.clone())
                .unwrap_or_else(|| "<removed>".to_string());
            return Err(DomainError::NotFound {
                name,
                parent_path: self.path_of(parent, DEFAULT_PATH_SEPARATOR),
            });
        };

        self.arena[parent].children.remove(position);
        let doomed: Vec<Index> = self.iter_from(child).map(|c| c.index()).collect();
        for idx in &doomed {
            self.arena.remove(*idx);
        }
        debug!("removed {} nodes", doomed.len());
        Ok(())
    }

    fn path_of(&self, idx: Index, separator: &str) -> String {
        self.get(idx)
            .map(|c| c.full_path(separator))
            .unwrap_or_default()
    }

    fn attach(&mut self, parent: Option<Index>, subtree: &Subtree) -> Index {
        let idx = self.arena.insert(ComponentNode {
            data: subtree.data.clone(),
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent_idx) => self.arena[parent_idx].children.push(idx),
            None => self.root = Some(idx),
        }
        for child in &subtree.children {
            self.attach(Some(idx), child);
        }
        idx
    }
}

/// Borrowed view of one component inside an [`AlarmTree`].
///
/// While the view exists the tree cannot change, so the index is always valid.
#[derive(Clone, Copy)]
pub struct ComponentRef<'a> {
    tree: &'a AlarmTree,
    idx: Index,
}

impl<'a> ComponentRef<'a> {
    fn node(&self) -> &'a ComponentNode {
        &self.tree.arena[self.idx]
    }

    fn at(&self, idx: Index) -> ComponentRef<'a> {
        ComponentRef {
            tree: self.tree,
            idx,
        }
    }

    pub fn index(&self) -> Index {
        self.idx
    }

    pub fn tree(&self) -> &'a AlarmTree {
        self.tree
    }

    pub fn data(&self) -> &'a ComponentData {
        &self.node().data
    }

    pub fn name(&self) -> &'a str {
        &self.node().data.name
    }

    pub fn attributes(&self) -> &'a Attributes {
        &self.node().data.attributes
    }

    pub fn meta(&self) -> &'a StoreMeta {
        &self.node().data.meta
    }

    pub fn parent(&self) -> Option<ComponentRef<'a>> {
        self.node().parent.map(|idx| self.at(idx))
    }

    pub fn children(&self) -> impl Iterator<Item = ComponentRef<'a>> + 'a {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .map(move |&idx| ComponentRef { tree, idx })
    }

    pub fn child_count(&self) -> usize {
        self.node().children.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.node().children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    /// Names of the children, recomputed from the live child list.
    pub fn child_names(&self) -> Vec<&'a str> {
        self.children().map(|child| child.name()).collect()
    }

    pub fn child_by_name(&self, name: &str) -> Option<ComponentRef<'a>> {
        self.children().find(|child| child.name() == name)
    }

    /// Root-to-node names joined by `separator`.
    pub fn full_name(&self, separator: &str) -> String {
        let mut names = vec![self.name()];
        let mut current = self.parent();
        while let Some(ancestor) = current {
            names.push(ancestor.name());
            current = ancestor.parent();
        }
        names.reverse();
        names.join(separator)
    }

    /// Like [`full_name`](Self::full_name) with a leading separator.
    pub fn full_path(&self, separator: &str) -> String {
        format!("{}{}", separator, self.full_name(separator))
    }

    /// Walk down along the segments of `relative_path`.
    ///
    /// `""` resolves to `self`. A single trailing separator is ignored; any
    /// other empty segment (leading or doubled separator) resolves to nothing.
    pub fn resolve(&self, relative_path: &str, separator: &str) -> Option<ComponentRef<'a>> {
        if relative_path.is_empty() {
            return Some(*self);
        }
        if separator.is_empty() {
            return self.child_by_name(relative_path);
        }

        let trimmed = relative_path
            .strip_suffix(separator)
            .unwrap_or(relative_path);
        let mut current = *self;
        for segment in trimmed.split(separator) {
            if segment.is_empty() {
                return None;
            }
            current = current.child_by_name(segment)?;
        }
        Some(current)
    }

    pub fn root(&self) -> ComponentRef<'a> {
        let mut current = *self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// First of `self` and its ancestors, nearest first, matching `predicate`.
    pub fn find_ancestor_or_self<P>(&self, predicate: P) -> Option<ComponentRef<'a>>
    where
        P: Fn(&ComponentRef<'a>) -> bool,
    {
        let mut current = Some(*self);
        while let Some(component) = current {
            if predicate(&component) {
                return Some(component);
            }
            current = component.parent();
        }
        None
    }

    /// Number of levels in the subtree rooted here (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.children().map(|child| child.depth()).max().unwrap_or(0)
    }

    pub fn leaf_count(&self) -> usize {
        self.tree
            .iter_from(self.idx)
            .filter(|component| component.is_leaf())
            .count()
    }

    /// Base of the alarm PV name: the full name, behind `prefix` when one is
    /// given, all joined with `separator`.
    pub fn alarm_pv_name(&self, prefix: &str, separator: &str) -> String {
        let full_name = self.full_name(separator);
        if prefix.is_empty() {
            full_name
        } else {
            format!("{}{}{}", prefix, separator, full_name)
        }
    }

    /// Owned deep copy of the subtree rooted here, detached from any tree.
    pub fn to_subtree(&self) -> Subtree {
        Subtree {
            data: self.data().clone(),
            children: self.children().map(|child| child.to_subtree()).collect(),
        }
    }
}

impl fmt::Debug for ComponentRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("path", &self.full_path(DEFAULT_PATH_SEPARATOR))
            .field("children", &self.child_count())
            .finish()
    }
}

impl fmt::Display for ComponentRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path(DEFAULT_PATH_SEPARATOR))
    }
}

/// Detached, owned component subtree.
///
/// Used to carry a copy between trees and to describe trees in code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subtree {
    pub data: ComponentData,
    pub children: Vec<Subtree>,
}

impl Subtree {
    pub fn new(data: ComponentData) -> Self {
        Self {
            data,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Subtree) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes, including self.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Subtree::node_count).sum::<usize>()
    }

    fn check_unique_names(&self) -> DomainResult<()> {
        self.check_unique_names_below(&format!("{}{}", DEFAULT_PATH_SEPARATOR, self.data.name))
    }

    fn check_unique_names_below(&self, path: &str) -> DomainResult<()> {
        for (i, child) in self.children.iter().enumerate() {
            if self.children[..i]
                .iter()
                .any(|earlier| earlier.data.name == child.data.name)
            {
                return Err(DomainError::DuplicateName {
                    name: child.data.name.clone(),
                    parent_path: path.to_string(),
                });
            }
            child.check_unique_names_below(&format!(
                "{}{}{}",
                path, DEFAULT_PATH_SEPARATOR, child.data.name
            ))?;
        }
        Ok(())
    }
}

/// Pre-order iterator over a tree or one of its subtrees.
pub struct TreeIterator<'a> {
    tree: &'a AlarmTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a AlarmTree, start: Option<Index>) -> Self {
        let mut stack = Vec::new();
        if let Some(idx) = start {
            stack.push(idx);
        }
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = ComponentRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some(ComponentRef {
                    tree: self.tree,
                    idx: current_idx,
                });
            }
        }
        None
    }
}
