//! Tree drawing for the terminal.

use termtree::Tree;
use tracing::instrument;

use crate::domain::{AlarmTree, ComponentRef};

pub trait ToTermTree {
    fn to_term_tree(&self) -> Tree<String>;
}

impl ToTermTree for ComponentRef<'_> {
    fn to_term_tree(&self) -> Tree<String> {
        let label = if self.attributes().pv.is_some() {
            format!("{} [pv]", self.name())
        } else {
            self.name().to_string()
        };
        Tree::new(label).with_leaves(self.children().map(|child| child.to_term_tree()))
    }
}

impl ToTermTree for AlarmTree {
    #[instrument(level = "trace", skip(self))]
    fn to_term_tree(&self) -> Tree<String> {
        match self.root_component() {
            Some(root) => root.to_term_tree(),
            None => Tree::new("Empty tree".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentData, PvRecord, Subtree};

    #[test]
    fn test_pv_leaves_are_marked() {
        let tree = AlarmTree::from_subtree(
            &Subtree::new(ComponentData::new("BCAL")).with_child(Subtree::new(
                ComponentData::new("ch1").with_pv(PvRecord::default()),
            )),
        )
        .unwrap();
        let drawing = tree.to_term_tree().to_string();
        assert!(drawing.starts_with("BCAL\n"));
        assert!(drawing.contains("└── ch1 [pv]"));
        assert_eq!(AlarmTree::new().to_term_tree().to_string(), "Empty tree\n");
    }
}
