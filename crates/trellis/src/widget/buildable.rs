//! Custom builder tags understood by every widget.
//!
//! ```xml
//! <accelerator key="q" modifiers="CONTROL_MASK" signal="activate"/>
//! <accessibility>
//!   <relation type="labelled-by" target="label1"/>
//!   <action action_name="click" description="Press the button"/>
//! </accessibility>
//! <style>
//!   <class name="suggested-action"/>
//! </style>
//! ```
//!
//! A [`CustomTagParser`] is fed the elements of one tag as they stream by.
//! When the tag closes, style classes are applied right away; accelerators
//! and accessibility data wait in [`BuildableData`] until the whole
//! document is built, because they need the toplevel and other objects'
//! ids.

use std::collections::HashMap;

use trellis_core::logging::targets;

use super::accel::{AccelKey, parse_accelerator};
use super::accessibility::AccessibleRelation;
use super::flags::ModifierType;
use super::{WidgetId, WidgetTree};
use crate::error::BuilderError;

/// The custom tags a widget accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomTag {
    /// `<accelerator>`
    Accelerator,
    /// `<accessibility>`
    Accessibility,
    /// `<style>`
    Style,
}

impl CustomTag {
    /// The tag opened by an element name, if any.
    pub fn from_element(name: &str) -> Option<Self> {
        Some(match name {
            "accelerator" => Self::Accelerator,
            "accessibility" => Self::Accessibility,
            "style" => Self::Style,
            _ => return None,
        })
    }

    fn element(self) -> &'static str {
        match self {
            Self::Accelerator => "accelerator",
            Self::Accessibility => "accessibility",
            Self::Style => "style",
        }
    }
}

/// An accelerator read from a builder file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratorSpec {
    /// Key and modifiers.
    pub key: AccelKey,
    /// Name passed to `accel_activated`.
    pub signal: String,
}

/// Builder data waiting for the document to finish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildableData {
    /// Accelerators to install on the toplevel.
    pub accelerators: Vec<AcceleratorSpec>,
    /// Accessible relations with their target's builder id.
    pub relations: Vec<(AccessibleRelation, String)>,
    /// Accessible actions with their descriptions.
    pub actions: Vec<(String, Option<String>)>,
}

impl BuildableData {
    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.accelerators.is_empty() && self.relations.is_empty() && self.actions.is_empty()
    }

    fn merge(&mut self, other: BuildableData) {
        self.accelerators.extend(other.accelerators);
        self.relations.extend(other.relations);
        self.actions.extend(other.actions);
    }
}

#[derive(Debug)]
struct PendingAction {
    name: String,
    description: Option<String>,
    text: String,
}

/// Streaming parser for one custom tag.
#[derive(Debug)]
pub struct CustomTagParser {
    tag: CustomTag,
    data: BuildableData,
    classes: Vec<String>,
    action: Option<PendingAction>,
    depth: usize,
}

fn required<'a>(
    element: &str,
    attrs: &'a HashMap<String, String>,
    attribute: &'static str,
) -> Result<&'a str, BuilderError> {
    attrs
        .get(attribute)
        .map(String::as_str)
        .ok_or_else(|| BuilderError::MissingAttribute {
            element: element.to_owned(),
            attribute,
        })
}

/// Parse `CONTROL_MASK | SHIFT`; the `_MASK` suffix is optional.
fn parse_modifiers(text: &str) -> Option<ModifierType> {
    let mut mods = ModifierType::empty();
    for token in text.split('|').map(str::trim).filter(|t| !t.is_empty()) {
        let upper = token.to_ascii_uppercase();
        let upper = upper.strip_suffix("_MASK").unwrap_or(&upper);
        mods |= match upper {
            "SHIFT" => ModifierType::SHIFT,
            "LOCK" => ModifierType::LOCK,
            "CONTROL" | "PRIMARY" => ModifierType::CONTROL,
            "MOD1" | "ALT" => ModifierType::ALT,
            "SUPER" => ModifierType::SUPER,
            "HYPER" => ModifierType::HYPER,
            "META" => ModifierType::META,
            _ => return None,
        };
    }
    Some(mods)
}

impl CustomTagParser {
    /// A parser for a tag. The tag's own element is passed to
    /// [`start_element`](Self::start_element) first.
    pub fn new(tag: CustomTag) -> Self {
        Self {
            tag,
            data: BuildableData::default(),
            classes: Vec::new(),
            action: None,
            depth: 0,
        }
    }

    /// The tag being parsed.
    pub fn tag(&self) -> CustomTag {
        self.tag
    }

    /// Whether the tag's own element has closed.
    pub fn is_done(&self) -> bool {
        self.depth == 0
    }

    /// An element opened inside the tag, the tag's own element included.
    pub fn start_element(
        &mut self,
        element: &str,
        attrs: &HashMap<String, String>,
    ) -> Result<(), BuilderError> {
        let depth = self.depth;
        self.depth += 1;
        if depth == 0 {
            if element != self.tag.element() {
                return Err(BuilderError::UnexpectedElement(element.to_owned()));
            }
            if self.tag == CustomTag::Accelerator {
                self.start_accelerator(attrs)?;
            }
            return Ok(());
        }
        match (self.tag, depth, element) {
            (CustomTag::Accessibility, 1, "relation") => {
                let kind = required(element, attrs, "type")?;
                let target = required(element, attrs, "target")?;
                let relation = AccessibleRelation::from_name(kind)
                    .ok_or_else(|| BuilderError::UnexpectedElement(format!("relation type '{kind}'")))?;
                self.data.relations.push((relation, target.to_owned()));
            }
            (CustomTag::Accessibility, 1, "action") => {
                let name = required(element, attrs, "action_name")?;
                self.action = Some(PendingAction {
                    name: name.to_owned(),
                    description: attrs.get("description").cloned(),
                    text: String::new(),
                });
            }
            (CustomTag::Style, 1, "class") => {
                let name = required(element, attrs, "name")?;
                self.classes.push(name.to_owned());
            }
            _ => return Err(BuilderError::UnexpectedElement(element.to_owned())),
        }
        Ok(())
    }

    fn start_accelerator(&mut self, attrs: &HashMap<String, String>) -> Result<(), BuilderError> {
        let key = required("accelerator", attrs, "key")?;
        let signal = required("accelerator", attrs, "signal")?;
        let invalid = || BuilderError::InvalidAccelerator(key.to_owned());
        let parsed = parse_accelerator(key).ok_or_else(invalid)?;
        let mods = match attrs.get("modifiers") {
            Some(text) => parse_modifiers(text).ok_or_else(|| BuilderError::InvalidAccelerator(text.clone()))?,
            None => ModifierType::empty(),
        };
        self.data.accelerators.push(AcceleratorSpec {
            key: AccelKey::new(parsed.keyval, parsed.mods | mods),
            signal: signal.to_owned(),
        });
        Ok(())
    }

    /// Character data inside the tag.
    pub fn text(&mut self, text: &str) {
        if let Some(action) = self.action.as_mut() {
            action.text.push_str(text);
        }
    }

    /// An element closed.
    pub fn end_element(&mut self, element: &str) -> Result<(), BuilderError> {
        self.depth = self
            .depth
            .checked_sub(1)
            .ok_or_else(|| BuilderError::UnexpectedElement(format!("/{element}")))?;
        if element == "action" {
            if let Some(action) = self.action.take() {
                let text = action.text.trim();
                // element text wins over the attribute
                let description = if text.is_empty() {
                    action.description
                } else {
                    Some(text.to_owned())
                };
                self.data.actions.push((action.name, description));
            }
        }
        Ok(())
    }
}

impl WidgetTree {
    /// Apply a finished custom tag to a widget.
    pub fn buildable_custom_finished(&mut self, id: WidgetId, parser: CustomTagParser) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let CustomTagParser { data, classes, .. } = parser;
        if !data.is_empty() {
            node.buildable.get_or_insert_with(Default::default).merge(data);
        }
        for class in classes {
            self.add_style_class(id, &class);
        }
    }

    /// Builder data still waiting on a widget.
    pub fn buildable_data(&self, id: WidgetId) -> Option<&BuildableData> {
        self.nodes.get(id)?.buildable.as_ref()
    }

    /// Resolve pending builder data once the document is complete.
    ///
    /// `objects` maps builder ids to widgets. Accelerators on a widget
    /// without a toplevel are dropped with a warning.
    pub fn buildable_parser_finished(
        &mut self,
        id: WidgetId,
        objects: &HashMap<String, WidgetId>,
    ) -> Result<(), BuilderError> {
        let Some(data) = self.nodes.get_mut(id).and_then(|n| n.buildable.take()) else {
            return Ok(());
        };
        if !data.accelerators.is_empty() {
            match self.toplevel(id) {
                Some(toplevel) => {
                    for accel in &data.accelerators {
                        self.add_accelerator(id, &accel.signal, toplevel, accel.key);
                    }
                }
                None => tracing::warn!(
                    target: targets::BUILDER,
                    widget = self.type_name(id).unwrap_or("?"),
                    "accelerators need the widget to be inside a toplevel"
                ),
            }
        }
        for (relation, target) in &data.relations {
            let target = *objects
                .get(target)
                .ok_or_else(|| BuilderError::UnknownObject(target.clone()))?;
            if let Some(peer) = self.accessible_mut(id) {
                peer.add_relation(*relation, target);
            }
        }
        for (name, description) in data.actions {
            if let Some(peer) = self.accessible_mut(id) {
                peer.add_action(name, description);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    #[test]
    fn accelerator_combines_key_and_modifiers() {
        let mut parser = CustomTagParser::new(CustomTag::Accelerator);
        parser
            .start_element(
                "accelerator",
                &attrs(&[("key", "q"), ("modifiers", "CONTROL_MASK | shift"), ("signal", "activate")]),
            )
            .unwrap();
        parser.end_element("accelerator").unwrap();
        assert!(parser.is_done());
        assert_eq!(
            parser.data.accelerators,
            vec![AcceleratorSpec {
                key: AccelKey::new(u32::from('q'), ModifierType::CONTROL | ModifierType::SHIFT),
                signal: "activate".into(),
            }]
        );
    }

    #[test]
    fn accessibility_collects_relations_and_actions() {
        let mut parser = CustomTagParser::new(CustomTag::Accessibility);
        parser.start_element("accessibility", &HashMap::new()).unwrap();
        parser
            .start_element("relation", &attrs(&[("type", "label-for"), ("target", "button1")]))
            .unwrap();
        parser.end_element("relation").unwrap();
        parser
            .start_element("action", &attrs(&[("action_name", "click"), ("description", "Sliff")]))
            .unwrap();
        parser.end_element("action").unwrap();
        parser.start_element("action", &attrs(&[("action_name", "clack")])).unwrap();
        parser.text("Sniff");
        parser.end_element("action").unwrap();
        parser.end_element("accessibility").unwrap();

        assert_eq!(parser.data.relations, vec![(AccessibleRelation::LabelFor, "button1".into())]);
        assert_eq!(
            parser.data.actions,
            vec![("click".into(), Some("Sliff".into())), ("clack".into(), Some("Sniff".into()))]
        );
    }

    #[test]
    fn malformed_tags_are_rejected() {
        let mut parser = CustomTagParser::new(CustomTag::Style);
        parser.start_element("style", &HashMap::new()).unwrap();
        assert!(matches!(
            parser.start_element("class", &HashMap::new()),
            Err(BuilderError::MissingAttribute { attribute: "name", .. })
        ));

        let mut parser = CustomTagParser::new(CustomTag::Accelerator);
        assert!(matches!(
            parser.start_element("accelerator", &attrs(&[("key", "NoSuchKey"), ("signal", "x")])),
            Err(BuilderError::InvalidAccelerator(_))
        ));

        let mut parser = CustomTagParser::new(CustomTag::Accessibility);
        parser.start_element("accessibility", &HashMap::new()).unwrap();
        assert!(matches!(
            parser.start_element("widget", &HashMap::new()),
            Err(BuilderError::UnexpectedElement(_))
        ));
    }
}
