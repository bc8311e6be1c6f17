//! Coarse-grained tree diff.
//!
//! A node whose identity differs from its counterpart is reported as a whole
//! unit, keyed by its full path; its descendants are not examined. Children
//! are paired by name only, never by position.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::domain::arena::{AlarmTree, ComponentRef, DEFAULT_PATH_SEPARATOR};

/// Components keyed by full path.
pub type ComponentMap<'a> = BTreeMap<String, ComponentRef<'a>>;

/// What makes two paired components "the same".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffMode {
    /// Name and the full attribute record must match
    #[default]
    Attributes,
    /// Only names are compared
    NameOnly,
}

/// Result of comparing a reference tree `a` with a candidate tree `b`.
#[derive(Debug, Clone)]
pub struct TreeDiff<'a, 'b> {
    /// Present in `b`, not matched in `a`
    pub new: ComponentMap<'b>,
    /// Present in `a`, not matched in `b`
    pub missing: ComponentMap<'a>,
}

impl TreeDiff<'_, '_> {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.missing.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TreeDiffer {
    mode: DiffMode,
    separator: String,
}

impl Default for TreeDiffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeDiffer {
    pub fn new() -> Self {
        Self {
            mode: DiffMode::default(),
            separator: DEFAULT_PATH_SEPARATOR.to_string(),
        }
    }

    pub fn with_mode(mut self, mode: DiffMode) -> Self {
        self.mode = mode;
        self
    }

    /// Separator used to build the full-path keys of the result maps.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn mode(&self) -> DiffMode {
        self.mode
    }

    fn same_identity(&self, a: ComponentRef<'_>, b: ComponentRef<'_>) -> bool {
        match self.mode {
            DiffMode::NameOnly => a.name() == b.name(),
            DiffMode::Attributes => a.name() == b.name() && a.attributes() == b.attributes(),
        }
    }

    /// Components of `b` that have no counterpart in `a`.
    ///
    /// An absent `b` has nothing new.
    #[instrument(level = "debug", skip_all, fields(a = %a))]
    pub fn find_new<'b>(&self, a: ComponentRef<'_>, b: Option<ComponentRef<'b>>) -> ComponentMap<'b> {
        let mut found = ComponentMap::new();
        if let Some(b) = b {
            self.collect_unmatched(a, b, &mut found);
        }
        debug!("{} new components", found.len());
        found
    }

    /// Components of `a` that have no counterpart in `b`.
    ///
    /// An absent `b` means all of `a` is missing.
    #[instrument(level = "debug", skip_all, fields(a = %a))]
    pub fn find_missing<'a>(&self, a: ComponentRef<'a>, b: Option<ComponentRef<'_>>) -> ComponentMap<'a> {
        let mut found = ComponentMap::new();
        match b {
            Some(b) => self.collect_unmatched(b, a, &mut found),
            None => {
                found.insert(a.full_path(&self.separator), a);
            }
        }
        debug!("{} missing components", found.len());
        found
    }

    /// Both directions at once.
    pub fn diff<'a, 'b>(&self, a: ComponentRef<'a>, b: Option<ComponentRef<'b>>) -> TreeDiff<'a, 'b> {
        TreeDiff {
            new: self.find_new(a, b),
            missing: self.find_missing(a, b),
        }
    }

    /// True iff neither side has anything the other lacks.
    pub fn is_equivalent(&self, a: ComponentRef<'_>, b: Option<ComponentRef<'_>>) -> bool {
        self.find_missing(a, b).is_empty() && self.find_new(a, b).is_empty()
    }

    /// Record every node of `theirs` not matched in `ours`.
    ///
    /// `find_new(a, b)` is `collect_unmatched(a, b)` and `find_missing(a, b)`
    /// is `collect_unmatched(b, a)`, so both report the same set of nodes for
    /// swapped arguments.
    fn collect_unmatched<'t>(
        &self,
        ours: ComponentRef<'_>,
        theirs: ComponentRef<'t>,
        found: &mut ComponentMap<'t>,
    ) {
        if !self.same_identity(ours, theirs) {
            found.insert(theirs.full_path(&self.separator), theirs);
            return;
        }

        for their_child in theirs.children() {
            match ours.child_by_name(their_child.name()) {
                Some(our_child) => self.collect_unmatched(our_child, their_child, found),
                None => {
                    found.insert(their_child.full_path(&self.separator), their_child);
                }
            }
        }
    }
}

/// [`TreeDiffer::find_new`] with default settings.
pub fn find_new<'b>(a: ComponentRef<'_>, b: Option<ComponentRef<'b>>) -> ComponentMap<'b> {
    TreeDiffer::new().find_new(a, b)
}

/// [`TreeDiffer::find_missing`] with default settings.
pub fn find_missing<'a>(a: ComponentRef<'a>, b: Option<ComponentRef<'_>>) -> ComponentMap<'a> {
    TreeDiffer::new().find_missing(a, b)
}

impl ComponentRef<'_> {
    /// Deep equivalence as defined by the differ: nothing new, nothing missing.
    pub fn is_equivalent_to(&self, other: ComponentRef<'_>) -> bool {
        TreeDiffer::new().is_equivalent(*self, Some(other))
    }
}

impl AlarmTree {
    /// Tree-level equivalence; two empty trees are equivalent.
    pub fn is_equivalent_to(&self, other: &AlarmTree) -> bool {
        match (self.root_component(), other.root_component()) {
            (Some(a), Some(b)) => a.is_equivalent_to(b),
            (None, None) => true,
            _ => false,
        }
    }
}
