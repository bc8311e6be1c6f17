//! Alarm tree service
//!
//! Loads trees from row sources, compares forests and copies trees into an
//! alarm configuration store.

use std::sync::Arc;

use generational_arena::Index;
use tracing::{debug, info, instrument, warn};

use crate::application::derive::derive_legacy_attributes;
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{
    pv_invariant_violations, AlarmTree, ComponentRef, DiffMode, RowSource, TreeBuilder, TreeDiffer,
};
use crate::infrastructure::traits::AlarmEntrySink;

/// Direction of a reported difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Only in the candidate
    New,
    /// Only in the reference
    Missing,
}

/// One coarse-grained difference, detached from the compared trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub kind: ChangeKind,
    /// Full path of the reported component
    pub path: String,
    /// Leaves below (and including) the reported component
    pub leaves: usize,
}

/// Differences between two forests, grouped by tree.
#[derive(Debug, Clone, Default)]
pub struct DiffReport {
    pub entries: Vec<DiffEntry>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    fn push(&mut self, kind: ChangeKind, path: String, component: ComponentRef<'_>) {
        self.entries.push(DiffEntry {
            kind,
            path,
            leaves: component.leaf_count(),
        });
    }
}

/// Service orchestrating tree loading, comparison and population.
pub struct AlarmTreeService {
    settings: Arc<Settings>,
}

impl AlarmTreeService {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build every tree of the legacy detector hierarchy and derive its
    /// alarm attributes.
    #[instrument(level = "debug", skip_all, fields(source = %source.describe()))]
    pub fn load_hierarchy(&self, source: &dyn RowSource) -> ApplicationResult<Vec<AlarmTree>> {
        let mut trees = TreeBuilder::new().build_all(source)?;
        for tree in &mut trees {
            derive_legacy_attributes(tree, &self.settings)?;
        }
        info!(
            "loaded {} trees from {}, {} PV rule violations",
            trees.len(),
            source.describe(),
            violation_count(&trees)
        );
        Ok(trees)
    }

    /// Build every tree of an alarm configuration store as stored.
    #[instrument(level = "debug", skip_all, fields(source = %source.describe()))]
    pub fn load_alarm_config(&self, source: &dyn RowSource) -> ApplicationResult<Vec<AlarmTree>> {
        let trees = TreeBuilder::new().build_all(source)?;
        info!(
            "loaded {} trees from {}, {} PV rule violations",
            trees.len(),
            source.describe(),
            violation_count(&trees)
        );
        Ok(trees)
    }

    /// Keep only the tree whose root is called `name`, or all of them.
    pub fn select(
        &self,
        trees: Vec<AlarmTree>,
        name: Option<&str>,
        source_name: &str,
    ) -> ApplicationResult<Vec<AlarmTree>> {
        let Some(name) = name else {
            return Ok(trees);
        };
        let selected: Vec<AlarmTree> = trees
            .into_iter()
            .filter(|tree| tree.root_component().is_some_and(|root| root.name() == name))
            .collect();
        if selected.is_empty() {
            return Err(ApplicationError::UnknownTree {
                name: name.to_string(),
                source_name: source_name.to_string(),
            });
        }
        Ok(selected)
    }

    /// Compare two forests.
    ///
    /// Trees are paired one to one by root name, in order; a candidate tree
    /// left without a partner is reported as new.
    #[instrument(level = "debug", skip_all, fields(mode = ?mode))]
    pub fn compare(&self, reference: &[AlarmTree], candidate: &[AlarmTree], mode: DiffMode) -> DiffReport {
        let differ = TreeDiffer::new()
            .with_mode(mode)
            .with_separator(self.settings.path_separator.clone());
        let mut report = DiffReport::default();

        let candidate_roots: Vec<ComponentRef<'_>> =
            candidate.iter().filter_map(AlarmTree::root_component).collect();
        // Each candidate root pairs with at most one reference root
        let mut paired = vec![false; candidate_roots.len()];

        for a in reference.iter().filter_map(AlarmTree::root_component) {
            let position = (0..candidate_roots.len())
                .find(|&i| !paired[i] && candidate_roots[i].name() == a.name());
            if let Some(i) = position {
                paired[i] = true;
            }
            let diff = differ.diff(a, position.map(|i| candidate_roots[i]));
            for (path, component) in diff.missing {
                report.push(ChangeKind::Missing, path, component);
            }
            for (path, component) in diff.new {
                report.push(ChangeKind::New, path, component);
            }
        }

        for (b, _) in candidate_roots.iter().zip(&paired).filter(|(_, done)| !**done) {
            report.push(
                ChangeKind::New,
                b.full_path(&self.settings.path_separator),
                *b,
            );
        }

        debug!(
            "{} new, {} missing",
            report.count(ChangeKind::New),
            report.count(ChangeKind::Missing)
        );
        report
    }

    /// Copy `trees` into an alarm configuration store.
    ///
    /// Nodes are written parents first; every attribute record goes to the
    /// id the store handed out for its node. Returns the number of entries
    /// created.
    #[instrument(level = "debug", skip_all)]
    pub fn populate(&self, trees: &[AlarmTree], sink: &mut dyn AlarmEntrySink) -> ApplicationResult<usize> {
        let mut created = 0;
        for tree in trees {
            let Some(root) = tree.root() else {
                warn!("skipping empty tree");
                continue;
            };
            let mut stack: Vec<(Index, Option<i64>)> = vec![(root, None)];
            while let Some((idx, parent_id)) = stack.pop() {
                let Some(component) = tree.get(idx) else {
                    continue;
                };
                let id = sink.create_entry(
                    parent_id,
                    component.name(),
                    component.meta().config_time.as_deref(),
                )?;
                sink.write_attributes(id, component.attributes())?;
                created += 1;

                let children: Vec<Index> = component.children().map(|c| c.index()).collect();
                for child in children.into_iter().rev() {
                    stack.push((child, Some(id)));
                }
            }
        }
        info!("created {} entries", created);
        Ok(created)
    }
}

/// Components breaking the PV-iff-leaf rule across a forest; each one is
/// logged as a warning.
pub fn violation_count(trees: &[AlarmTree]) -> usize {
    trees
        .iter()
        .map(|tree| pv_invariant_violations(tree).len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attributes, ComponentData, PvRecord, Subtree};

    #[derive(Default)]
    struct RecordingSink {
        entries: Vec<(i64, Option<i64>, String)>,
        with_pv: Vec<i64>,
    }

    impl AlarmEntrySink for RecordingSink {
        fn create_entry(
            &mut self,
            parent_id: Option<i64>,
            name: &str,
            _config_time: Option<&str>,
        ) -> ApplicationResult<i64> {
            let id = 100 + self.entries.len() as i64;
            self.entries.push((id, parent_id, name.to_string()));
            Ok(id)
        }

        fn write_attributes(&mut self, id: i64, attributes: &Attributes) -> ApplicationResult<()> {
            if attributes.pv.is_some() {
                self.with_pv.push(id);
            }
            Ok(())
        }
    }

    fn service() -> AlarmTreeService {
        AlarmTreeService::new(Arc::new(Settings::default()))
    }

    fn bcal(channels: &[&str]) -> AlarmTree {
        let mut system = Subtree::new(ComponentData::new("hv"));
        for channel in channels {
            system = system.with_child(Subtree::new(
                ComponentData::new(*channel).with_pv(PvRecord::default()),
            ));
        }
        AlarmTree::from_subtree(&Subtree::new(ComponentData::new("BCAL")).with_child(system))
            .unwrap()
    }

    #[test]
    fn test_populate_uses_store_assigned_ids() {
        let mut sink = RecordingSink::default();
        let created = service().populate(&[bcal(&["a", "b"])], &mut sink).unwrap();

        assert_eq!(created, 4);
        assert_eq!(
            sink.entries,
            vec![
                (100, None, "BCAL".to_string()),
                (101, Some(100), "hv".to_string()),
                (102, Some(101), "a".to_string()),
                (103, Some(101), "b".to_string()),
            ]
        );
        assert_eq!(sink.with_pv, vec![102, 103]);
    }

    #[test]
    fn test_compare_pairs_trees_by_root_name() {
        let reference = vec![bcal(&["a", "b"])];
        let fcal = AlarmTree::from_subtree(&Subtree::new(ComponentData::new("FCAL"))).unwrap();
        let candidate = vec![bcal(&["a", "c"]), fcal];

        let report = service().compare(&reference, &candidate, DiffMode::Attributes);

        assert_eq!(
            report.entries,
            vec![
                DiffEntry {
                    kind: ChangeKind::Missing,
                    path: "/BCAL/hv/b".into(),
                    leaves: 1
                },
                DiffEntry {
                    kind: ChangeKind::New,
                    path: "/BCAL/hv/c".into(),
                    leaves: 1
                },
                DiffEntry {
                    kind: ChangeKind::New,
                    path: "/FCAL".into(),
                    leaves: 1
                },
            ]
        );
    }

    #[test]
    fn test_compare_reports_unpaired_duplicate_root_as_new() {
        let reference = vec![bcal(&["a"])];
        let candidate = vec![bcal(&["a"]), bcal(&["a"])];

        let report = service().compare(&reference, &candidate, DiffMode::Attributes);

        assert_eq!(
            report.entries,
            vec![DiffEntry {
                kind: ChangeKind::New,
                path: "/BCAL".into(),
                leaves: 1
            }]
        );
    }

    #[test]
    fn test_duplicate_roots_pair_one_to_one() {
        let reference = vec![bcal(&["a"]), bcal(&["b"])];
        let candidate = vec![bcal(&["a"]), bcal(&["b"])];

        let report = service().compare(&reference, &candidate, DiffMode::Attributes);

        assert!(report.is_empty());
    }

    #[test]
    fn test_violation_count_sums_over_trees() {
        let bare_leaf = AlarmTree::from_subtree(&Subtree::new(ComponentData::new("TOF"))).unwrap();
        assert_eq!(violation_count(&[bcal(&["a"]), bare_leaf]), 1);
        assert_eq!(violation_count(&[bcal(&["a", "b"])]), 0);
    }

    #[test]
    fn test_select_unknown_tree_fails() {
        let err = service()
            .select(vec![bcal(&["a"])], Some("TOF"), "test.db")
            .unwrap_err();
        assert_eq!(err.to_string(), "no tree named TOF in test.db");
    }
}
