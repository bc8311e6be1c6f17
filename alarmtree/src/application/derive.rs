//! Attribute derivation for trees read from the legacy detector hierarchy.
//!
//! The legacy store only knows structure. Alarm names, guidance, related
//! displays and PV records are computed from a leaf's position in the tree.

use generational_arena::Index;
use tracing::{debug, info, instrument};

use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::{AlarmItem, AlarmTree, ComponentRef, DomainError, PvRecord};

/// Hierarchy `type` of a detector node.
pub const DETECTOR_KIND: &str = "Detector";
/// Hierarchy `type` of a voltage system node (hv, lv, bias).
pub const SYSTEM_KIND: &str = "Voltage type";

const GUIDANCE_TITLE: &str = "Guidance";
const DISPLAY_TITLE: &str = "Show voltage channel";

#[derive(Debug)]
struct LeafUpdate {
    idx: Index,
    name: String,
    guidance: Option<AlarmItem>,
    display: Option<AlarmItem>,
    pv: Option<PvRecord>,
}

/// Nearest node of the given hierarchy kind, starting at `component` itself.
pub fn nearest_of_kind<'a>(component: ComponentRef<'a>, kind: &str) -> Option<ComponentRef<'a>> {
    component.find_ancestor_or_self(|c| c.meta().kind.as_deref() == Some(kind))
}

/// Rename every leaf to its alarm PV name and fill in its attributes.
///
/// Returns the number of leaves updated. Internal nodes keep their name and
/// get no attributes.
#[instrument(level = "debug", skip(tree, settings))]
pub fn derive_legacy_attributes(tree: &mut AlarmTree, settings: &Settings) -> ApplicationResult<usize> {
    let updates = tree
        .iter()
        .filter(|component| component.is_leaf())
        .map(|leaf| leaf_update(leaf, settings))
        .collect::<ApplicationResult<Vec<_>>>()?;

    let count = updates.len();
    for update in updates {
        if let Some(data) = tree.data_mut(update.idx) {
            debug!("{} -> {}", data.name, update.name);
            data.name = update.name;
            data.attributes.guidance = update.guidance.into_iter().collect();
            data.attributes.displays = update.display.into_iter().collect();
            data.attributes.pv = update.pv;
        }
    }
    info!("derived attributes for {} channels", count);
    Ok(count)
}

fn leaf_update(leaf: ComponentRef<'_>, settings: &Settings) -> ApplicationResult<LeafUpdate> {
    let sep = settings.name_separator.as_str();
    let channel = leaf.alarm_pv_name(&settings.pv_prefix, sep);
    let name = format!("{}{}", channel, settings.leaf_suffix);

    let detector = nearest_of_kind(leaf, DETECTOR_KIND);
    let system = nearest_of_kind(leaf, SYSTEM_KIND);

    let guidance = detector.map(|detector| {
        AlarmItem::new(
            GUIDANCE_TITLE,
            0,
            format!(
                "Try to reset the voltage channel for {} . \
                 You can use the associated screen to access voltage parameters for this channel. \
                 If the problem still persists contact expert for {} detector.",
                channel.replace(sep, "->"),
                detector.name()
            ),
        )
    });

    let display = match (detector, system) {
        (Some(detector), Some(system)) => {
            let opi = settings
                .displays
                .lookup(detector.name(), system.name())
                .ok_or_else(|| {
                    DomainError::configuration(format!(
                        "no display configured for system {} of detector {}",
                        system.name(),
                        detector.name()
                    ))
                })?;
            Some(AlarmItem::new(
                DISPLAY_TITLE,
                0,
                format!("{}   \"pvName={}\"", opi, name),
            ))
        }
        _ => None,
    };

    let pv = leaf.meta().channel_id.map(|_| {
        settings
            .pv_defaults
            .to_record(format!("Voltage alarm for {}", channel.replace(sep, " : ")))
    });

    Ok(LeafUpdate {
        idx: leaf.index(),
        name,
        guidance,
        display,
        pv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentData, StoreMeta, Subtree};

    fn node(name: &str, kind: Option<&str>, channel_id: Option<i64>) -> Subtree {
        Subtree::new(ComponentData::new(name).with_meta(StoreMeta {
            kind: kind.map(str::to_string),
            channel_id,
            ..Default::default()
        }))
    }

    //  FCAL (Detector)
    //  └── hv (Voltage type)
    //      └── ch7 (chanid 7)
    fn fcal() -> AlarmTree {
        let subtree = node("FCAL", Some(DETECTOR_KIND), None).with_child(
            node("hv", Some(SYSTEM_KIND), None).with_child(node("ch7", None, Some(7))),
        );
        AlarmTree::from_subtree(&subtree).unwrap()
    }

    #[test]
    fn test_leaf_gets_alarm_name_and_attributes() {
        let mut tree = fcal();
        let count = derive_legacy_attributes(&mut tree, &Settings::default()).unwrap();
        assert_eq!(count, 1);

        let root = tree.root_component().unwrap();
        let leaf = root.resolve("hv/FCAL:hv:ch7:alarm", "/").unwrap();
        let attributes = leaf.attributes();

        assert_eq!(attributes.guidance.len(), 1);
        assert!(attributes.guidance[0]
            .detail
            .starts_with("Try to reset the voltage channel for FCAL->hv->ch7 . "));
        assert!(attributes.guidance[0]
            .detail
            .ends_with("contact expert for FCAL detector."));
        assert_eq!(
            attributes.displays[0].detail,
            "/Hall-D/Default/ALARMS/Voltages/ShowBaseChannel.opi   \"pvName=FCAL:hv:ch7:alarm\""
        );
        let pv = attributes.pv.as_ref().unwrap();
        assert_eq!(pv.description, "Voltage alarm for FCAL : hv : ch7");
        assert_eq!(pv.delay, 2);
        assert!(pv.latching);

        // internal nodes untouched
        assert!(root.attributes().is_empty());
        assert_eq!(root.child_names(), vec!["hv"]);
    }

    #[test]
    fn test_prefix_is_part_of_the_name() {
        let mut tree = fcal();
        let settings = Settings {
            pv_prefix: "cj".into(),
            ..Default::default()
        };
        derive_legacy_attributes(&mut tree, &settings).unwrap();
        let names: Vec<String> = tree.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["FCAL", "hv", "cj:FCAL:hv:ch7:alarm"]);
    }

    #[test]
    fn test_unknown_system_is_configuration_error() {
        let subtree = node("BCAL", Some(DETECTOR_KIND), None).with_child(
            node("gas", Some(SYSTEM_KIND), None).with_child(node("ch1", None, Some(1))),
        );
        let mut tree = AlarmTree::from_subtree(&subtree).unwrap();
        let err = derive_legacy_attributes(&mut tree, &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("no display configured for system gas"));
    }

    #[test]
    fn test_leaf_outside_detector_gets_no_guidance() {
        let subtree = node("misc", None, None).with_child(node("ch1", None, None));
        let mut tree = AlarmTree::from_subtree(&subtree).unwrap();
        derive_legacy_attributes(&mut tree, &Settings::default()).unwrap();

        let leaf = tree.root_component().unwrap().resolve("misc:ch1:alarm", "/").unwrap();
        assert!(leaf.attributes().is_empty());
    }
}
