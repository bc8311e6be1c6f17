//! Tree builder: constructs component trees from any [`RowSource`].

use std::collections::HashSet;

use generational_arena::Index;
use tracing::{debug, instrument, warn};

use crate::domain::arena::{AlarmTree, ComponentRef};
use crate::domain::entities::{Attributes, ComponentData};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::source::RowSource;

/// Constructs component trees, one node lookup and one child-set lookup per node.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    visited_ids: HashSet<i64>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            visited_ids: HashSet::new(),
        }
    }

    /// Build one tree per root row of the source.
    ///
    /// Two roots with the same name are a [`DomainError::DuplicateName`].
    #[instrument(level = "debug", skip(self, source), fields(source = %source.describe()))]
    pub fn build_all<S: RowSource + ?Sized>(&mut self, source: &S) -> DomainResult<Vec<AlarmTree>> {
        let roots = source.roots()?;
        debug!("found {} root rows", roots.len());

        // Roots are siblings under the configuration, so their names must be unique
        let mut root_names: HashSet<String> = HashSet::new();
        let mut trees = Vec::with_capacity(roots.len());
        for row in roots {
            if !root_names.insert(row.name.clone()) {
                return Err(DomainError::DuplicateName {
                    name: row.name,
                    parent_path: source.describe(),
                });
            }
            trees.push(self.build(source, row.id)?);
        }
        Ok(trees)
    }

    /// Build the tree rooted at the component with id `root_id`.
    ///
    /// A missing or ambiguous row aborts the whole build with
    /// [`DomainError::Configuration`]; duplicate sibling names abort it with
    /// [`DomainError::DuplicateName`].
    #[instrument(level = "debug", skip(self, source), fields(source = %source.describe()))]
    pub fn build<S: RowSource + ?Sized>(&mut self, source: &S, root_id: i64) -> DomainResult<AlarmTree> {
        self.visited_ids.clear();
        let mut tree = AlarmTree::new();
        let mut stack: Vec<(i64, Option<Index>)> = vec![(root_id, None)];

        while let Some((id, parent_idx)) = stack.pop() {
            if !self.visited_ids.insert(id) {
                return Err(DomainError::configuration(format!(
                    "component id {} reached twice in alarm tree hierarchy",
                    id
                )));
            }

            let data = load_component(source, id)?;
            let current_idx = tree.insert_node(data, parent_idx)?;

            // Reverse so that children pop off the stack in store order
            let children = source.children(id)?;
            for child in children.iter().rev() {
                stack.push((child.id, Some(current_idx)));
            }
        }

        debug!("built tree with {} components", tree.len());
        Ok(tree)
    }
}

#[instrument(level = "trace", skip(source))]
fn load_component<S: RowSource + ?Sized>(source: &S, id: i64) -> DomainResult<ComponentData> {
    let mut rows = source.component(id)?;
    if rows.len() > 1 {
        return Err(DomainError::configuration(format!(
            "too many components with id {} in {}, to be exact there are {}",
            id,
            source.describe(),
            rows.len()
        )));
    }
    let row = rows.pop().ok_or_else(|| {
        DomainError::configuration(format!("no component with id {} in {}", id, source.describe()))
    })?;
    if row.id == 0 {
        return Err(DomainError::configuration(format!(
            "bad alarm tree hierarchy <{}>",
            id
        )));
    }

    let attributes = Attributes {
        guidance: source.guidance(row.id)?,
        commands: source.commands(row.id)?,
        automated_actions: source.automated_actions(row.id)?,
        displays: source.displays(row.id)?,
        pv: source.pv(row.id)?,
    };

    Ok(ComponentData {
        name: row.name.clone(),
        attributes,
        meta: row.meta(),
    })
}

/// Components breaking the rule "PV record present iff leaf".
///
/// Each violation is logged as a warning.
pub fn pv_invariant_violations(tree: &AlarmTree) -> Vec<ComponentRef<'_>> {
    let violations: Vec<ComponentRef<'_>> = tree
        .iter()
        .filter(|component| component.is_leaf() != component.attributes().pv.is_some())
        .collect();
    for component in &violations {
        if component.is_leaf() {
            warn!("leaf component {} has no PV record", component);
        } else {
            warn!("component {} has children and a PV record", component);
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{PvRecord, StructureRow};
    use std::collections::HashMap;

    /// In-memory row source: id -> rows, parent -> children
    #[derive(Default)]
    struct MemorySource {
        rows: Vec<StructureRow>,
        pvs: HashMap<i64, PvRecord>,
    }

    impl MemorySource {
        fn row(mut self, id: i64, parent_id: Option<i64>, name: &str) -> Self {
            self.rows.push(StructureRow {
                id,
                parent_id,
                name: name.to_string(),
                kind: None,
                config_time: None,
                channel_id: None,
            });
            self
        }

        fn pv(mut self, id: i64) -> Self {
            self.pvs.insert(id, PvRecord::default());
            self
        }
    }

    impl RowSource for MemorySource {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        fn roots(&self) -> DomainResult<Vec<StructureRow>> {
            Ok(self.rows.iter().filter(|r| r.parent_id.is_none()).cloned().collect())
        }

        fn component(&self, id: i64) -> DomainResult<Vec<StructureRow>> {
            Ok(self.rows.iter().filter(|r| r.id == id).cloned().collect())
        }

        fn children(&self, parent_id: i64) -> DomainResult<Vec<StructureRow>> {
            Ok(self
                .rows
                .iter()
                .filter(|r| r.parent_id == Some(parent_id))
                .cloned()
                .collect())
        }

        fn pv(&self, id: i64) -> DomainResult<Option<PvRecord>> {
            Ok(self.pvs.get(&id).cloned())
        }
    }

    #[test]
    fn test_build_keeps_store_order() {
        let source = MemorySource::default()
            .row(1, None, "FCAL")
            .row(2, Some(1), "hv")
            .row(3, Some(2), "ch1")
            .row(4, Some(2), "ch2")
            .row(5, Some(1), "lv")
            .pv(3)
            .pv(4)
            .pv(5);

        let tree = TreeBuilder::new().build(&source, 1).unwrap();
        let names: Vec<&str> = tree.iter().map(|c| c.name()).collect();

        assert_eq!(names, vec!["FCAL", "hv", "ch1", "ch2", "lv"]);
        assert!(pv_invariant_violations(&tree).is_empty());
        assert_eq!(
            tree.root_component().unwrap().meta().component_id,
            Some(1)
        );
    }

    #[test]
    fn test_missing_row_is_configuration_error() {
        let source = MemorySource::default().row(1, None, "FCAL");
        let err = TreeBuilder::new().build(&source, 42).unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
        assert!(err.to_string().contains("no component with id 42"));
    }

    #[test]
    fn test_ambiguous_row_is_configuration_error() {
        let source = MemorySource::default()
            .row(1, None, "FCAL")
            .row(1, None, "FCAL-copy");
        let err = TreeBuilder::new().build(&source, 1).unwrap_err();
        assert!(err.to_string().contains("to be exact there are 2"));
    }

    #[test]
    fn test_zero_id_is_rejected() {
        let source = MemorySource::default().row(0, None, "broken");
        let err = TreeBuilder::new().build(&source, 0).unwrap_err();
        assert!(err.to_string().contains("bad alarm tree hierarchy"));
    }

    #[test]
    fn test_duplicate_sibling_names_are_rejected() {
        let source = MemorySource::default()
            .row(1, None, "FCAL")
            .row(2, Some(1), "hv")
            .row(3, Some(1), "hv");
        let err = TreeBuilder::new().build(&source, 1).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateName { .. }));
    }

    #[test]
    fn test_cycle_is_detected() {
        let source = MemorySource::default()
            .row(1, Some(2), "a")
            .row(2, Some(1), "b");
        let err = TreeBuilder::new().build(&source, 1).unwrap_err();
        assert!(err
            .to_string()
            .contains("component id 1 reached twice in alarm tree hierarchy"));
    }

    #[test]
    fn test_build_all_returns_one_tree_per_root() {
        let source = MemorySource::default()
            .row(1, None, "FCAL")
            .row(2, None, "BCAL")
            .row(3, Some(2), "ch")
            .pv(1)
            .pv(3);
        let trees = TreeBuilder::new().build_all(&source).unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[1].len(), 2);
    }

    #[test]
    fn test_build_all_rejects_duplicate_root_names() {
        let source = MemorySource::default()
            .row(1, None, "BCAL")
            .row(2, None, "FCAL")
            .row(3, None, "BCAL");
        let err = TreeBuilder::new().build_all(&source).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateName { ref name, .. } if name == "BCAL"));
        assert_eq!(err.to_string(), "subcomponent named BCAL already exists in memory");
    }

    #[test]
    fn test_invariant_violations_are_reported() {
        let source = MemorySource::default()
            .row(1, None, "FCAL")
            .row(2, Some(1), "ch")
            .pv(1);
        let tree = TreeBuilder::new().build(&source, 1).unwrap();
        let names: Vec<&str> = pv_invariant_violations(&tree).iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["FCAL", "ch"]);
    }
}
