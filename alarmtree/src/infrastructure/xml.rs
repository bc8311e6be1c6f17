//! BEAST alarm configuration XML output.
//!
//! ```text
//! <config name="HallD">
//!   <component name="BCAL">
//!     <component name="hv">
//!       <pv name="BCAL:hv:ch1:alarm">
//!         <guidance><title/><details/></guidance>
//!         <display>...</display>
//!         <description/><enabled/>...
//! ```

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, instrument};

use crate::domain::{AlarmItem, AlarmTree, Attributes, ComponentRef};
use crate::infrastructure::{InfraError, InfraResult};

const INDENT: usize = 2;

fn xml_err(e: quick_xml::Error) -> InfraError {
    InfraError::Xml {
        message: e.to_string(),
    }
}

/// Streams alarm trees as one `<config>` document.
pub struct XmlExporter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlExporter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', INDENT),
        }
    }

    /// Write the whole document and hand back the underlying writer.
    #[instrument(level = "debug", skip(self, trees))]
    pub fn write_config(mut self, config_name: &str, trees: &[AlarmTree]) -> InfraResult<W> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.event(Event::Start(
            BytesStart::new("config").with_attributes([("name", config_name)]),
        ))?;
        for root in trees.iter().filter_map(AlarmTree::root_component) {
            self.component(root)?;
        }
        self.event(Event::End(BytesEnd::new("config")))?;
        debug!("wrote {} trees", trees.len());
        Ok(self.writer.into_inner())
    }

    fn component(&mut self, component: ComponentRef<'_>) -> InfraResult<()> {
        let attributes = component.attributes();
        let tag = if attributes.pv.is_some() { "pv" } else { "component" };

        self.event(Event::Start(
            BytesStart::new(tag).with_attributes([("name", component.name())]),
        ))?;
        self.items(attributes)?;
        if let Some(pv) = &attributes.pv {
            self.text_element("description", &pv.description)?;
            self.text_element("enabled", bool_text(pv.enabled))?;
            self.text_element("annunciating", bool_text(pv.annunciating))?;
            self.text_element("latching", bool_text(pv.latching))?;
            self.text_element("delay", &pv.delay.to_string())?;
            self.text_element("count", &pv.delay_count.to_string())?;
            self.text_element("filter", &pv.filter)?;
        } else {
            for child in component.children() {
                self.component(child)?;
            }
        }
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn items(&mut self, attributes: &Attributes) -> InfraResult<()> {
        for (tag, items) in [
            ("guidance", &attributes.guidance),
            ("display", &attributes.displays),
            ("command", &attributes.commands),
        ] {
            for item in items {
                self.titled(tag, item, None)?;
            }
        }
        for action in &attributes.automated_actions {
            let item = AlarmItem::new(action.title.as_str(), action.order, action.detail.as_str());
            self.titled("automated_action", &item, Some(action.delay))?;
        }
        Ok(())
    }

    fn titled(&mut self, tag: &str, item: &AlarmItem, delay: Option<i64>) -> InfraResult<()> {
        self.event(Event::Start(BytesStart::new(tag)))?;
        self.text_element("title", &item.title)?;
        self.text_element("details", &item.detail)?;
        if let Some(delay) = delay {
            self.text_element("delay", &delay.to_string())?;
        }
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn text_element(&mut self, tag: &str, text: &str) -> InfraResult<()> {
        self.event(Event::Start(BytesStart::new(tag)))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn event(&mut self, event: Event<'_>) -> InfraResult<()> {
        self.writer.write_event(event).map_err(xml_err)
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Render trees as an XML document string.
pub fn to_xml_string(config_name: &str, trees: &[AlarmTree]) -> InfraResult<String> {
    let bytes = XmlExporter::new(Vec::new()).write_config(config_name, trees)?;
    String::from_utf8(bytes).map_err(|e| InfraError::Xml {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentData, PvRecord, Subtree};

    #[test]
    fn test_leaf_with_pv_becomes_pv_element() {
        let leaf = ComponentData::new("BCAL:hv:ch1:alarm")
            .with_attributes(Attributes {
                guidance: vec![AlarmItem::new("Guidance", 0, "reset <ch1> & retry")],
                ..Default::default()
            })
            .with_pv(PvRecord {
                description: "Voltage alarm for BCAL : hv : ch1".into(),
                enabled: true,
                delay: 2,
                ..Default::default()
            });
        let tree = AlarmTree::from_subtree(
            &Subtree::new(ComponentData::new("BCAL")).with_child(Subtree::new(leaf)),
        )
        .unwrap();

        let xml = to_xml_string("HallD", &[tree]).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<config name=\"HallD\">"));
        assert!(xml.contains("<component name=\"BCAL\">"));
        assert!(xml.contains("<pv name=\"BCAL:hv:ch1:alarm\">"));
        assert!(xml.contains("<details>reset &lt;ch1&gt; &amp; retry</details>"));
        assert!(xml.contains("<enabled>true</enabled>"));
        assert!(xml.contains("<latching>false</latching>"));
        assert!(xml.contains("<count>0</count>"));
        assert!(xml.trim_end().ends_with("</config>"));
    }
}
