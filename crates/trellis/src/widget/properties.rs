//! Dynamic access to the widget properties builder files may set.
//!
//! Only the generic properties every widget has are handled here; anything
//! else is offered to the class through
//! [`Widget::set_class_property`](super::Widget::set_class_property).

use std::fmt;

use trellis_core::logging::targets;

use super::flags::{EventMask, WidgetFlags};
use super::geometry::{Align, Margin};
use super::tree::precondition;
use super::{WidgetId, WidgetTree};
use crate::error::WidgetError;

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i32),
    /// Floating point.
    Float(f64),
    /// String, possibly absent.
    Str(Option<String>),
    /// Alignment.
    Align(Align),
    /// Event mask.
    Events(EventMask),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(Some(v)) => f.write_str(v),
            Self::Str(None) => Ok(()),
            Self::Align(v) => write!(f, "{}", align_name(*v)),
            Self::Events(v) => bitflags::parser::to_writer(v, f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
    Float,
    Str,
    Align,
    Events,
}

/// Generic properties and their value kinds.
const PROPERTIES: &[(&str, Kind)] = &[
    ("name", Kind::Str),
    ("visible", Kind::Bool),
    ("sensitive", Kind::Bool),
    ("margin", Kind::Int),
    ("margin-start", Kind::Int),
    ("margin-end", Kind::Int),
    ("margin-top", Kind::Int),
    ("margin-bottom", Kind::Int),
    ("halign", Kind::Align),
    ("valign", Kind::Align),
    ("hexpand", Kind::Bool),
    ("vexpand", Kind::Bool),
    ("hexpand-set", Kind::Bool),
    ("vexpand-set", Kind::Bool),
    ("opacity", Kind::Float),
    ("has-tooltip", Kind::Bool),
    ("tooltip-text", Kind::Str),
    ("tooltip-markup", Kind::Str),
    ("can-focus", Kind::Bool),
    ("events", Kind::Events),
    ("width-request", Kind::Int),
    ("height-request", Kind::Int),
];

fn canonical(name: &str) -> String {
    name.replace('_', "-")
}

fn kind_of(name: &str) -> Option<Kind> {
    PROPERTIES.iter().find(|(n, _)| *n == name).map(|(_, k)| *k)
}

fn align_name(align: Align) -> &'static str {
    match align {
        Align::Fill => "fill",
        Align::Start => "start",
        Align::End => "end",
        Align::Center => "center",
        Align::Baseline => "baseline",
    }
}

/// Parse a boolean in any of the spellings builder files use.
pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "t" | "y" | "1" => Some(true),
        "false" | "no" | "f" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_align(text: &str) -> Option<Align> {
    let text = text.trim().to_ascii_lowercase();
    Some(match text.as_str() {
        "fill" => Align::Fill,
        "start" => Align::Start,
        "end" => Align::End,
        "center" => Align::Center,
        "baseline" => Align::Baseline,
        _ => return None,
    })
}

/// Parse `KEY_PRESS | BUTTON_PRESS_MASK` or a plain integer.
fn parse_events(text: &str) -> Option<EventMask> {
    if let Ok(bits) = text.trim().parse::<u32>() {
        return Some(EventMask::from_bits_truncate(bits));
    }
    let mut mask = EventMask::empty();
    for token in text.split('|').map(str::trim).filter(|t| !t.is_empty()) {
        let upper = token.to_ascii_uppercase();
        let upper = upper.strip_suffix("_MASK").unwrap_or(&upper);
        mask |= match upper {
            "ALL_EVENTS" => EventMask::all(),
            name => EventMask::from_name(name)?,
        };
    }
    Some(mask)
}

fn parse_value(kind: Kind, property: &str, text: &str) -> Result<PropertyValue, WidgetError> {
    let invalid = || WidgetError::InvalidPropertyValue {
        property: property.to_owned(),
        value: text.to_owned(),
    };
    Ok(match kind {
        Kind::Bool => PropertyValue::Bool(parse_bool(text).ok_or_else(invalid)?),
        Kind::Int => PropertyValue::Int(text.trim().parse().map_err(|_| invalid())?),
        Kind::Float => PropertyValue::Float(text.trim().parse().map_err(|_| invalid())?),
        Kind::Str => PropertyValue::Str(Some(text.to_owned())),
        Kind::Align => PropertyValue::Align(parse_align(text).ok_or_else(invalid)?),
        Kind::Events => PropertyValue::Events(parse_events(text).ok_or_else(invalid)?),
    })
}

impl WidgetTree {
    /// Read a generic property.
    pub fn property(&self, id: WidgetId, name: &str) -> Option<PropertyValue> {
        let node = self.nodes.get(id)?;
        let name = canonical(name);
        let margin = node.margin;
        Some(match name.as_str() {
            "name" => PropertyValue::Str(node.name.clone()),
            "visible" => PropertyValue::Bool(node.has(WidgetFlags::VISIBLE)),
            "sensitive" => PropertyValue::Bool(node.has(WidgetFlags::SENSITIVE)),
            "margin" => PropertyValue::Int(margin.start.max(margin.end).max(margin.top).max(margin.bottom)),
            "margin-start" => PropertyValue::Int(margin.start),
            "margin-end" => PropertyValue::Int(margin.end),
            "margin-top" => PropertyValue::Int(margin.top),
            "margin-bottom" => PropertyValue::Int(margin.bottom),
            "halign" => PropertyValue::Align(node.halign),
            "valign" => PropertyValue::Align(node.valign),
            "hexpand" => PropertyValue::Bool(node.has(WidgetFlags::HEXPAND)),
            "vexpand" => PropertyValue::Bool(node.has(WidgetFlags::VEXPAND)),
            "hexpand-set" => PropertyValue::Bool(node.has(WidgetFlags::HEXPAND_SET)),
            "vexpand-set" => PropertyValue::Bool(node.has(WidgetFlags::VEXPAND_SET)),
            "opacity" => PropertyValue::Float(self.opacity(id)),
            "has-tooltip" => PropertyValue::Bool(node.has(WidgetFlags::HAS_TOOLTIP)),
            "tooltip-text" => PropertyValue::Str(node.tooltip_text.clone()),
            "tooltip-markup" => PropertyValue::Str(node.tooltip_markup.clone()),
            "can-focus" => PropertyValue::Bool(node.has(WidgetFlags::CAN_FOCUS)),
            "events" => PropertyValue::Events(node.events),
            "width-request" => PropertyValue::Int(node.width_request),
            "height-request" => PropertyValue::Int(node.height_request),
            _ => return None,
        })
    }

    /// Set a generic property, warning on unknown names and mistyped values.
    pub fn set_property(&mut self, id: WidgetId, name: &str, value: PropertyValue) {
        precondition!(targets::LIFECYCLE, "set_property", self.try_set_property(id, name, value));
    }

    /// Set a generic property.
    pub fn try_set_property(
        &mut self,
        id: WidgetId,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), WidgetError> {
        if !self.nodes.contains_key(id) {
            return Err(WidgetError::InvalidWidget(id));
        }
        let name = canonical(name);
        let mismatch = |value: &PropertyValue| WidgetError::InvalidPropertyValue {
            property: name.clone(),
            value: value.to_string(),
        };
        match (name.as_str(), value) {
            ("name", PropertyValue::Str(v)) => self.set_name(id, v),
            ("visible", PropertyValue::Bool(v)) => self.set_visible(id, v),
            ("sensitive", PropertyValue::Bool(v)) => self.set_sensitive(id, v),
            ("margin", PropertyValue::Int(v)) => self.set_margin(id, Margin::uniform(v)),
            ("margin-start", PropertyValue::Int(v)) => self.set_margin_start(id, v),
            ("margin-end", PropertyValue::Int(v)) => self.set_margin_end(id, v),
            ("margin-top", PropertyValue::Int(v)) => self.set_margin_top(id, v),
            ("margin-bottom", PropertyValue::Int(v)) => self.set_margin_bottom(id, v),
            ("halign", PropertyValue::Align(v)) => self.set_halign(id, v),
            ("valign", PropertyValue::Align(v)) => self.set_valign(id, v),
            ("hexpand", PropertyValue::Bool(v)) => self.set_hexpand(id, v),
            ("vexpand", PropertyValue::Bool(v)) => self.set_vexpand(id, v),
            ("hexpand-set", PropertyValue::Bool(v)) => self.set_hexpand_set(id, v),
            ("vexpand-set", PropertyValue::Bool(v)) => self.set_vexpand_set(id, v),
            ("opacity", PropertyValue::Float(v)) => self.set_opacity(id, v),
            ("has-tooltip", PropertyValue::Bool(v)) => self.set_has_tooltip(id, v),
            ("tooltip-text", PropertyValue::Str(v)) => self.set_tooltip_text(id, v),
            ("tooltip-markup", PropertyValue::Str(v)) => self.set_tooltip_markup(id, v),
            ("can-focus", PropertyValue::Bool(v)) => self.set_can_focus(id, v),
            ("events", PropertyValue::Events(v)) => self.set_events(id, v),
            ("width-request", PropertyValue::Int(v)) => {
                let (_, height) = self.size_request(id);
                self.set_size_request(id, v, height);
            }
            ("height-request", PropertyValue::Int(v)) => {
                let (width, _) = self.size_request(id);
                self.set_size_request(id, width, v);
            }
            (other, value) => {
                return Err(match kind_of(other) {
                    Some(_) => mismatch(&value),
                    None => WidgetError::UnknownProperty(other.to_owned()),
                });
            }
        }
        Ok(())
    }

    /// Set a property from its builder string form.
    ///
    /// Generic properties are parsed here; other names go to the class.
    pub fn set_property_from_str(
        &mut self,
        id: WidgetId,
        name: &str,
        text: &str,
    ) -> Result<(), WidgetError> {
        if !self.nodes.contains_key(id) {
            return Err(WidgetError::InvalidWidget(id));
        }
        let canonical_name = canonical(name);
        if let Some(kind) = kind_of(&canonical_name) {
            let value = parse_value(kind, &canonical_name, text)?;
            return self.try_set_property(id, &canonical_name, value);
        }
        let handled = self
            .with_class(id, |class, tree| {
                class.set_class_property(tree, id, &canonical_name, text)
            })
            .unwrap_or(Ok(false))?;
        if handled {
            Ok(())
        } else {
            Err(WidgetError::UnknownProperty(canonical_name))
        }
    }

    /// Names of the generic properties.
    pub fn property_names() -> impl Iterator<Item = &'static str> {
        PROPERTIES.iter().map(|(n, _)| *n)
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::Widget;

    #[derive(Default)]
    struct Labelled {
        label: String,
    }

    impl Widget for Labelled {
        fn set_class_property(
            &mut self,
            _tree: &mut WidgetTree,
            _id: WidgetId,
            name: &str,
            value: &str,
        ) -> Result<bool, WidgetError> {
            if name != "label" {
                return Ok(false);
            }
            self.label = value.to_owned();
            Ok(true)
        }
    }

    fn tree() -> WidgetTree {
        WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default())
    }

    #[test]
    fn builder_strings_set_generic_properties() {
        let mut tree = tree();
        let id = tree.create(Labelled::default());
        tree.set_property_from_str(id, "margin_start", "4").unwrap();
        tree.set_property_from_str(id, "halign", "Center").unwrap();
        tree.set_property_from_str(id, "hexpand", "yes").unwrap();
        tree.set_property_from_str(id, "tooltip-text", "Save").unwrap();
        tree.set_property_from_str(id, "events", "KEY_PRESS_MASK | button_press").unwrap();
        tree.set_property_from_str(id, "width-request", "30").unwrap();

        assert_eq!(tree.property(id, "margin-start"), Some(PropertyValue::Int(4)));
        assert_eq!(tree.property(id, "halign"), Some(PropertyValue::Align(Align::Center)));
        assert_eq!(tree.property(id, "hexpand"), Some(PropertyValue::Bool(true)));
        assert_eq!(tree.property(id, "has-tooltip"), Some(PropertyValue::Bool(true)));
        assert_eq!(
            tree.property(id, "events"),
            Some(PropertyValue::Events(EventMask::KEY_PRESS | EventMask::BUTTON_PRESS))
        );
        assert_eq!(tree.size_request(id), (30, -1));
    }

    #[test]
    fn class_properties_fall_through_to_the_class() {
        let mut tree = tree();
        let id = tree.create(Labelled::default());
        tree.set_property_from_str(id, "label", "Open").unwrap();
        assert_eq!(tree.class::<Labelled>(id).unwrap().label, "Open");

        assert_eq!(
            tree.set_property_from_str(id, "colour", "red"),
            Err(WidgetError::UnknownProperty("colour".into()))
        );
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let mut tree = tree();
        let id = tree.create(Labelled::default());
        assert!(matches!(
            tree.set_property_from_str(id, "visible", "maybe"),
            Err(WidgetError::InvalidPropertyValue { .. })
        ));
        assert!(matches!(
            tree.try_set_property(id, "opacity", PropertyValue::Bool(true)),
            Err(WidgetError::InvalidPropertyValue { .. })
        ));
        tree.set_property(id, "opacity", PropertyValue::Float(0.25));
        assert_eq!(tree.property(id, "opacity"), Some(PropertyValue::Float(64.0 / 255.0)));
    }
}
