//! Domain entities: component payload and store rows

use std::fmt;

/// Titled entry shared by guidance, command and display lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlarmItem {
    pub title: String,
    pub order: i64,
    pub detail: String,
}

impl AlarmItem {
    pub fn new(title: impl Into<String>, order: i64, detail: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            order,
            detail: detail.into(),
        }
    }
}

/// Automated action attached to a component.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutomatedAction {
    pub title: String,
    pub order: i64,
    pub detail: String,
    /// Seconds before the action fires
    pub delay: i64,
}

/// Leaf-only record describing an alarm-monitored channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PvRecord {
    pub description: String,
    pub enabled: bool,
    pub annunciating: bool,
    pub latching: bool,
    pub delay: i64,
    pub delay_count: i64,
    pub filter: String,
    pub global_alarm: bool,
}

/// Comparable payload of a component.
///
/// Two components with equal names and equal `Attributes` are the same
/// component as far as the differ is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes {
    pub guidance: Vec<AlarmItem>,
    pub commands: Vec<AlarmItem>,
    pub automated_actions: Vec<AutomatedAction>,
    pub displays: Vec<AlarmItem>,
    /// Present only on leaf components
    pub pv: Option<PvRecord>,
}

impl Attributes {
    pub fn is_empty(&self) -> bool {
        self.guidance.is_empty()
            && self.commands.is_empty()
            && self.automated_actions.is_empty()
            && self.displays.is_empty()
            && self.pv.is_none()
    }
}

/// Where a component came from. Never compared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreMeta {
    /// Row id in the backing store
    pub component_id: Option<i64>,
    /// Hierarchy `type` column, e.g. "Detector" or "Voltage type"
    pub kind: Option<String>,
    pub config_time: Option<String>,
    /// Legacy hierarchy channel id; leaves with a channel become PVs
    pub channel_id: Option<i64>,
}

/// Data payload for tree nodes representing alarm components.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComponentData {
    pub name: String,
    pub attributes: Attributes,
    pub meta: StoreMeta,
}

impl ComponentData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_pv(mut self, pv: PvRecord) -> Self {
        self.attributes.pv = Some(pv);
        self
    }

    pub fn with_meta(mut self, meta: StoreMeta) -> Self {
        self.meta = meta;
        self
    }
}

impl fmt::Display for ComponentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One tree-structure row as returned by a row source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub kind: Option<String>,
    pub config_time: Option<String>,
    pub channel_id: Option<i64>,
}

impl StructureRow {
    pub fn meta(&self) -> StoreMeta {
        StoreMeta {
            component_id: Some(self.id),
            kind: self.kind.clone(),
            config_time: self.config_time.clone(),
            channel_id: self.channel_id,
        }
    }
}
