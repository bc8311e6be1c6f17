//! Tests for the coarse-grained tree differ and tree equivalence.

use std::collections::BTreeSet;

use rstest::{fixture, rstest};

use alarmtree::domain::{
    find_missing, find_new, AlarmItem, AlarmTree, Attributes, ComponentData, DiffMode, PvRecord,
    Subtree, TreeDiffer,
};

fn pv(description: &str) -> PvRecord {
    PvRecord {
        description: description.to_string(),
        enabled: true,
        annunciating: true,
        latching: true,
        delay: 2,
        ..Default::default()
    }
}

fn channel(name: &str) -> Subtree {
    Subtree::new(ComponentData::new(name).with_pv(pv("Voltage alarm")))
}

fn detector_attributes() -> Attributes {
    Attributes {
        guidance: vec![AlarmItem::new("Guidance", 0, "call the detector expert")],
        ..Default::default()
    }
}

fn detector(channels: &[&str]) -> AlarmTree {
    let mut root = Subtree::new(ComponentData::new("Detector1").with_attributes(detector_attributes()));
    for name in channels {
        root = root.with_child(channel(name));
    }
    AlarmTree::from_subtree(&root).unwrap()
}

fn paths<T>(map: &std::collections::BTreeMap<String, T>) -> BTreeSet<String> {
    map.keys().cloned().collect()
}

/// BCAL
/// ├── hv
/// │   ├── ch1
/// │   └── ch2
/// └── lv
///     └── ch1
#[fixture]
fn bcal() -> AlarmTree {
    let root = Subtree::new(ComponentData::new("BCAL"))
        .with_child(
            Subtree::new(ComponentData::new("hv"))
                .with_child(channel("ch1"))
                .with_child(channel("ch2")),
        )
        .with_child(Subtree::new(ComponentData::new("lv")).with_child(channel("ch1")));
    AlarmTree::from_subtree(&root).unwrap()
}

#[rstest]
fn given_same_tree_when_diffing_then_nothing_is_new_or_missing(bcal: AlarmTree) {
    // Arrange
    let root = bcal.root_component().unwrap();

    // Act
    let new = find_new(root, Some(root));
    let missing = find_missing(root, Some(root));

    // Assert
    assert!(new.is_empty());
    assert!(missing.is_empty());
    assert!(root.is_equivalent_to(root));
    assert!(bcal.is_equivalent_to(&bcal));
}

#[rstest]
fn given_structural_copy_when_comparing_then_equivalent(bcal: AlarmTree) {
    // Arrange
    let copy = AlarmTree::from_subtree(&bcal.root_component().unwrap().to_subtree()).unwrap();

    // Act / Assert
    assert!(bcal.is_equivalent_to(&copy));
    assert!(copy.is_equivalent_to(&bcal));
}

#[test]
fn given_absent_candidate_when_diffing_then_new_is_empty_and_whole_reference_missing() {
    // Arrange
    let tree = detector(&["ChannelA"]);
    let root = tree.root_component().unwrap();

    // Act
    let new = find_new(root, None);
    let missing = find_missing(root, None);

    // Assert
    assert!(new.is_empty());
    assert_eq!(missing.len(), 1);
    assert_eq!(missing["/Detector1"].index(), root.index());
}

#[test]
fn given_concrete_scenario_when_diffing_then_only_swapped_channels_reported() {
    // Arrange
    let tree1 = detector(&["ChannelA"]);
    let tree2 = detector(&["ChannelB"]);
    let a = tree1.root_component().unwrap();
    let b = tree2.root_component().unwrap();

    // Act
    let new = find_new(a, Some(b));
    let missing = find_missing(a, Some(b));

    // Assert
    assert_eq!(paths(&new), BTreeSet::from(["/Detector1/ChannelB".to_string()]));
    assert_eq!(new["/Detector1/ChannelB"].name(), "ChannelB");
    assert_eq!(paths(&missing), BTreeSet::from(["/Detector1/ChannelA".to_string()]));
    assert_eq!(missing["/Detector1/ChannelA"].name(), "ChannelA");
    assert!(!tree1.is_equivalent_to(&tree2));
}

#[rstest]
fn given_changed_root_attributes_when_diffing_then_only_root_is_reported(bcal: AlarmTree) {
    // Arrange: same structure, root guidance differs
    let mut changed = bcal.root_component().unwrap().to_subtree();
    changed.data.attributes.guidance = vec![AlarmItem::new("Guidance", 0, "new text")];
    let other = AlarmTree::from_subtree(&changed).unwrap();

    // Act
    let new = find_new(bcal.root_component().unwrap(), other.root_component());
    let missing = find_missing(bcal.root_component().unwrap(), other.root_component());

    // Assert: no descendant paths leak in
    assert_eq!(paths(&new), BTreeSet::from(["/BCAL".to_string()]));
    assert_eq!(paths(&missing), BTreeSet::from(["/BCAL".to_string()]));
}

#[rstest]
fn given_changed_leaf_pv_when_diffing_then_leaf_is_reported_in_both_directions(bcal: AlarmTree) {
    // Arrange
    let mut changed = bcal.root_component().unwrap().to_subtree();
    changed.children[0].children[1].data.attributes.pv = Some(pv("other description"));
    let other = AlarmTree::from_subtree(&changed).unwrap();
    let a = bcal.root_component().unwrap();
    let b = other.root_component().unwrap();

    // Act
    let new = find_new(a, Some(b));
    let missing = find_missing(a, Some(b));

    // Assert
    assert_eq!(paths(&new), BTreeSet::from(["/BCAL/hv/ch2".to_string()]));
    assert_eq!(paths(&missing), BTreeSet::from(["/BCAL/hv/ch2".to_string()]));
    assert!(std::ptr::eq(new["/BCAL/hv/ch2"].tree(), &other));
    assert!(std::ptr::eq(missing["/BCAL/hv/ch2"].tree(), &bcal));
}

#[rstest]
#[case(&["ChannelA"], &["ChannelB"])]
#[case(&["ChannelA", "ChannelB"], &["ChannelB"])]
#[case(&["ChannelA"], &["ChannelA", "ChannelC"])]
#[case(&[], &["ChannelA"])]
fn given_any_pair_when_swapping_roles_then_same_paths_reported(
    #[case] left: &[&str],
    #[case] right: &[&str],
) {
    // Arrange
    let a_tree = detector(left);
    let b_tree = detector(right);
    let a = a_tree.root_component().unwrap();
    let b = b_tree.root_component().unwrap();

    // Act
    let new_ab = find_new(a, Some(b));
    let missing_ba = find_missing(b, Some(a));
    let missing_ab = find_missing(a, Some(b));
    let new_ba = find_new(b, Some(a));

    // Assert
    assert_eq!(paths(&new_ab), paths(&missing_ba));
    assert_eq!(paths(&missing_ab), paths(&new_ba));
}

#[test]
fn given_different_child_order_when_comparing_then_equivalent() {
    // Arrange
    let ab = detector(&["ChannelA", "ChannelB"]);
    let ba = detector(&["ChannelB", "ChannelA"]);

    // Act / Assert
    assert!(ab.is_equivalent_to(&ba));
}

#[rstest]
fn given_name_only_mode_when_attributes_differ_then_nothing_reported(bcal: AlarmTree) {
    // Arrange
    let mut changed = bcal.root_component().unwrap().to_subtree();
    changed.children[1].children[0].data.attributes.pv = None;
    let other = AlarmTree::from_subtree(&changed).unwrap();
    let differ = TreeDiffer::new().with_mode(DiffMode::NameOnly);

    // Act
    let diff = differ.diff(bcal.root_component().unwrap(), other.root_component());

    // Assert
    assert!(diff.is_empty());
    assert!(!bcal.is_equivalent_to(&other));
}

#[rstest]
fn given_custom_separator_when_diffing_then_keys_use_it(bcal: AlarmTree) {
    // Arrange
    let other = AlarmTree::from_subtree(
        &Subtree::new(ComponentData::new("BCAL")).with_child(
            Subtree::new(ComponentData::new("hv"))
                .with_child(channel("ch1"))
                .with_child(channel("ch2")),
        ),
    )
    .unwrap();
    let differ = TreeDiffer::new().with_separator(":");

    // Act
    let missing = differ.find_missing(bcal.root_component().unwrap(), other.root_component());

    // Assert
    assert_eq!(paths(&missing), BTreeSet::from([":BCAL:lv".to_string()]));
}
