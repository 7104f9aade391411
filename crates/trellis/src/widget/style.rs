//! Style handles.
//!
//! Every widget has a [`StyleContext`] holding its style classes, state and
//! scale, and caching the [`WidgetPath`] and the values looked up through
//! it. Values come from the tree's [`StyleProvider`]; when the provider has
//! nothing, the class defaults installed in the [`StylePropertyPool`]
//! apply.
//!
//! Rules of the bundled [`StaticStyleProvider`] use a small selector
//! syntax: `Type#name.class:state`, any part optional, `*` for any type.
//! The most specific matching rule wins, later rules winning ties.

use std::collections::HashMap;
use std::fmt;

use trellis_core::logging::targets;

use super::flags::{StateFlags, WidgetFlags};
use super::widget_path::WidgetPath;
use super::{WidgetId, WidgetTree};

/// A style value.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    /// Integer, in pixels where it is a length.
    Int(i32),
    /// Floating point.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Packed `0xRRGGBBAA` color.
    Color(u32),
    /// String.
    Str(String),
}

impl StyleValue {
    /// The value as an integer, converting floats.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(v.round() as i32),
            _ => None,
        }
    }

    /// The value as a float, converting integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// The value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Color(v) => write!(f, "#{v:08x}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// Source of style values.
pub trait StyleProvider {
    /// The value of `property` for the widget at the end of `path`, or
    /// `None` if the provider does not set it.
    fn lookup(&self, path: &WidgetPath, property: &str) -> Option<StyleValue>;
}

// =============================================================================
// Static provider
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Selector {
    type_name: Option<String>,
    name: Option<String>,
    classes: Vec<String>,
    states: StateFlags,
}

impl Selector {
    fn parse(text: &str) -> Option<Self> {
        let mut selector = Self::default();
        let text = text.trim();
        let (head, states) = match text.split_once(':') {
            Some((head, states)) => (head, Some(states)),
            None => (text, None),
        };
        if let Some(states) = states {
            for state in states.split(':') {
                selector.states |= state_from_pseudo(state)?;
            }
        }

        let mut rest = head;
        let type_end = rest.find(['#', '.']).unwrap_or(rest.len());
        match &rest[..type_end] {
            "" | "*" => {}
            ty => selector.type_name = Some(ty.to_owned()),
        }
        rest = &rest[type_end..];
        while !rest.is_empty() {
            let marker = rest.as_bytes()[0];
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let part = &body[..end];
            if part.is_empty() {
                return None;
            }
            match marker {
                b'#' => selector.name = Some(part.to_owned()),
                _ => selector.classes.push(part.to_owned()),
            }
            rest = &body[end..];
        }
        Some(selector)
    }

    fn matches(&self, path: &WidgetPath) -> bool {
        let Some(node) = path.last() else {
            return false;
        };
        self.type_name.as_deref().is_none_or(|t| t == node.type_name)
            && self
                .name
                .as_deref()
                .is_none_or(|n| node.name.as_deref() == Some(n))
            && self.classes.iter().all(|c| node.classes.contains(c))
            && node.state.contains(self.states)
    }

    /// `(names, classes and states, types)`, compared in order.
    fn specificity(&self) -> (u32, u32, u32) {
        (
            u32::from(self.name.is_some()),
            self.classes.len() as u32 + self.states.bits().count_ones(),
            u32::from(self.type_name.is_some()),
        )
    }
}

fn state_from_pseudo(name: &str) -> Option<StateFlags> {
    Some(match name {
        "active" => StateFlags::ACTIVE,
        "hover" | "prelight" => StateFlags::PRELIGHT,
        "selected" => StateFlags::SELECTED,
        "disabled" | "insensitive" => StateFlags::INSENSITIVE,
        "indeterminate" => StateFlags::INCONSISTENT,
        "focus" => StateFlags::FOCUSED,
        "backdrop" => StateFlags::BACKDROP,
        "dir(ltr)" => StateFlags::DIR_LTR,
        "dir(rtl)" => StateFlags::DIR_RTL,
        "link" => StateFlags::LINK,
        "visited" => StateFlags::VISITED,
        "checked" => StateFlags::CHECKED,
        "drop(active)" => StateFlags::DROP_ACTIVE,
        _ => return None,
    })
}

#[derive(Debug, Clone)]
struct StyleRule {
    selector: Selector,
    property: String,
    value: StyleValue,
}

/// A provider holding a fixed list of rules.
#[derive(Debug, Clone, Default)]
pub struct StaticStyleProvider {
    rules: Vec<StyleRule>,
}

impl StaticStyleProvider {
    /// An empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. Returns `false`, adding nothing, if the selector does not
    /// parse.
    pub fn add_rule(&mut self, selector: &str, property: &str, value: StyleValue) -> bool {
        let Some(selector) = Selector::parse(selector) else {
            tracing::warn!(target: targets::STYLE, selector, "invalid selector");
            return false;
        };
        self.rules.push(StyleRule {
            selector,
            property: property.to_owned(),
            value,
        });
        true
    }

    /// Builder form of [`add_rule`](Self::add_rule).
    pub fn with_rule(mut self, selector: &str, property: &str, value: StyleValue) -> Self {
        self.add_rule(selector, property, value);
        self
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl StyleProvider for StaticStyleProvider {
    fn lookup(&self, path: &WidgetPath, property: &str) -> Option<StyleValue> {
        self.rules
            .iter()
            .filter(|r| r.property == property && r.selector.matches(path))
            .fold(None::<&StyleRule>, |best, rule| match best {
                Some(b) if b.selector.specificity() > rule.selector.specificity() => Some(b),
                _ => Some(rule),
            })
            .map(|r| r.value.clone())
    }
}

// =============================================================================
// Style property pool
// =============================================================================

/// Per-class defaults of theme-settable style properties.
#[derive(Debug, Default)]
pub struct StylePropertyPool {
    defaults: HashMap<(&'static str, String), StyleValue>,
}

impl StylePropertyPool {
    /// Install a style property for a class type name.
    ///
    /// Returns `false` if the class already has a property of that name.
    pub fn install(&mut self, type_name: &'static str, property: &str, default: StyleValue) -> bool {
        let key = (type_name, property.to_owned());
        if self.defaults.contains_key(&key) {
            tracing::warn!(target: targets::STYLE, class = type_name, property, "style property already installed");
            return false;
        }
        self.defaults.insert(key, default);
        true
    }

    /// Default of a class style property.
    pub fn find(&self, type_name: &str, property: &str) -> Option<&StyleValue> {
        self.defaults
            .iter()
            .find(|((t, p), _)| *t == type_name && p == property)
            .map(|(_, v)| v)
    }

    /// Properties installed for a class.
    pub fn list(&self, type_name: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .defaults
            .keys()
            .filter(|(t, _)| *t == type_name)
            .map(|(_, p)| p.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

// =============================================================================
// Style context
// =============================================================================

/// Style handle of one widget.
#[derive(Debug, Clone)]
pub struct StyleContext {
    classes: Vec<String>,
    state: StateFlags,
    scale: i32,
    path: Option<WidgetPath>,
    values: HashMap<String, Option<StyleValue>>,
}

impl Default for StyleContext {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleContext {
    /// A context with no classes, normal state and scale 1.
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            state: StateFlags::empty(),
            scale: 1,
            path: None,
            values: HashMap::new(),
        }
    }

    /// Style classes, in the order added.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Whether the class is set.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub(crate) fn add_class(&mut self, class: &str) -> bool {
        if self.has_class(class) {
            return false;
        }
        self.classes.push(class.to_owned());
        self.invalidate();
        true
    }

    pub(crate) fn remove_class(&mut self, class: &str) -> bool {
        let before = self.classes.len();
        self.classes.retain(|c| c != class);
        let removed = self.classes.len() != before;
        if removed {
            self.invalidate();
        }
        removed
    }

    /// State flags the context resolves values for.
    pub fn state(&self) -> StateFlags {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: StateFlags) {
        if self.state != state {
            self.state = state;
            self.invalidate();
        }
    }

    /// Scale factor of the window showing the widget.
    pub fn scale(&self) -> i32 {
        self.scale
    }

    pub(crate) fn set_scale(&mut self, scale: i32) {
        self.scale = scale;
    }

    /// The cached widget path, if still valid.
    pub fn path(&self) -> Option<&WidgetPath> {
        self.path.as_ref()
    }

    /// Drop the cached path and values.
    pub(crate) fn invalidate(&mut self) {
        self.path = None;
        self.values.clear();
    }
}

// =============================================================================
// Tree integration
// =============================================================================

impl WidgetTree {
    /// The widget's style handle.
    pub fn style_context(&self, id: WidgetId) -> Option<&StyleContext> {
        self.nodes.get(id)?.style.as_ref()
    }

    /// Add a style class, restyling the widget.
    pub fn add_style_class(&mut self, id: WidgetId, class: &str) {
        let added = self
            .nodes
            .get_mut(id)
            .and_then(|n| n.style.as_mut())
            .is_some_and(|s| s.add_class(class));
        if added {
            self.reset_style(id);
        }
    }

    /// Remove a style class, restyling the widget.
    pub fn remove_style_class(&mut self, id: WidgetId, class: &str) {
        let removed = self
            .nodes
            .get_mut(id)
            .and_then(|n| n.style.as_mut())
            .is_some_and(|s| s.remove_class(class));
        if removed {
            self.reset_style(id);
        }
    }

    /// Whether the widget has a style class.
    pub fn has_style_class(&self, id: WidgetId, class: &str) -> bool {
        self.style_context(id).is_some_and(|s| s.has_class(class))
    }

    /// Replace the style provider and restyle every root.
    pub fn set_style_provider(&mut self, provider: Box<dyn StyleProvider>) {
        self.style_provider = provider;
        let roots: Vec<WidgetId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(id, _)| id)
            .collect();
        for root in roots {
            self.reset_style(root);
        }
    }

    /// The pool of class style-property defaults.
    pub fn style_properties(&self) -> &StylePropertyPool {
        &self.style_properties
    }

    /// Mutable access to the pool, to install class style properties.
    pub fn style_properties_mut(&mut self) -> &mut StylePropertyPool {
        &mut self.style_properties
    }

    /// Resolve a style property for the widget in its current state.
    ///
    /// Values from the provider take precedence over the class defaults.
    /// Results are cached on the widget's style context until it is
    /// invalidated.
    pub fn style_property(&mut self, id: WidgetId, property: &str) -> Option<StyleValue> {
        let node = self.nodes.get(id)?;
        let type_name = node.type_name;
        if let Some(cached) = node.style.as_ref()?.values.get(property) {
            return cached.clone();
        }
        let path = match node.style.as_ref()?.path.clone() {
            Some(path) => path,
            None => self.widget_path(id),
        };
        let value = self
            .style_provider
            .lookup(&path, property)
            .or_else(|| self.style_properties.find(type_name, property).cloned());
        let style = self.nodes.get_mut(id)?.style.as_mut()?;
        style.path = Some(path);
        style.values.insert(property.to_owned(), value.clone());
        value
    }

    /// Invalidate the style of a subtree: cached paths and values are
    /// dropped, `style_updated` is emitted on each widget and the root is
    /// queued for resize.
    pub fn reset_style(&mut self, id: WidgetId) {
        if !self.nodes.contains_key(id) {
            return;
        }
        tracing::trace!(target: targets::STYLE, widget = self.type_name(id).unwrap_or("?"), "reset style");
        for widget in self.descendants(id) {
            self.restyle(widget);
        }
        self.queue_resize(id);
    }

    /// Drop cached paths below a widget whose name, classes or state
    /// changed, without a resize.
    pub(crate) fn invalidate_style_path(&mut self, id: WidgetId) {
        for widget in self.descendants(id) {
            self.restyle(widget);
        }
        if self.has_flags(id, WidgetFlags::REALIZED) {
            self.queue_draw(id);
        }
    }

    fn restyle(&mut self, widget: WidgetId) {
        let Some(style) = self.nodes.get_mut(widget).and_then(|n| n.style.as_mut()) else {
            return;
        };
        style.invalidate();
        self.update_alpha(widget);
        self.emit(widget, |s| &s.style_updated, ());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::{BoxContainer, Window};
    use crate::widget::{Orientation, Widget};

    struct Leaf;
    impl Widget for Leaf {}

    fn provider() -> StaticStyleProvider {
        StaticStyleProvider::new()
            .with_rule("*", "padding", StyleValue::Int(1))
            .with_rule("Leaf", "padding", StyleValue::Int(2))
            .with_rule("Leaf.wide", "padding", StyleValue::Int(3))
            .with_rule("Leaf:hover", "color", StyleValue::Color(0xff0000ff))
    }

    #[test]
    fn selectors_parse_every_part() {
        let selector = Selector::parse("Leaf#main.a.b:hover:focus").unwrap();
        assert_eq!(selector.type_name.as_deref(), Some("Leaf"));
        assert_eq!(selector.name.as_deref(), Some("main"));
        assert_eq!(selector.classes, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(selector.states, StateFlags::PRELIGHT | StateFlags::FOCUSED);
        assert!(Selector::parse("Leaf:bogus").is_none());
        assert!(Selector::parse("Leaf..x").is_none());
    }

    #[test]
    fn the_most_specific_rule_wins() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        tree.set_style_provider(Box::new(provider()));
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let leaf = tree.create(Leaf);
        tree.container_add(column, leaf);

        assert_eq!(tree.style_property(column, "padding"), Some(StyleValue::Int(1)));
        assert_eq!(tree.style_property(leaf, "padding"), Some(StyleValue::Int(2)));
        tree.add_style_class(leaf, "wide");
        assert_eq!(tree.style_property(leaf, "padding"), Some(StyleValue::Int(3)));
    }

    #[test]
    fn state_changes_invalidate_cached_values() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        tree.set_style_provider(Box::new(provider()));
        let leaf = tree.create(Leaf);
        assert_eq!(tree.style_property(leaf, "color"), None);
        tree.set_state_flags(leaf, StateFlags::PRELIGHT, false);
        assert_eq!(tree.style_property(leaf, "color"), Some(StyleValue::Color(0xff0000ff)));
    }

    #[test]
    fn class_defaults_fill_in_for_the_provider() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        assert!(tree.style_properties_mut().install("Leaf", "focus-padding", StyleValue::Int(4)));
        assert!(!tree.style_properties_mut().install("Leaf", "focus-padding", StyleValue::Int(5)));
        let leaf = tree.create(Leaf);
        assert_eq!(tree.style_property(leaf, "focus-padding"), Some(StyleValue::Int(4)));
        assert_eq!(tree.style_properties().list("Leaf"), vec!["focus-padding"]);
    }

    #[test]
    fn reset_style_reaches_the_whole_subtree() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let leaf = tree.create(Leaf);
        tree.container_add(window, leaf);
        let updates = Rc::new(Cell::new(0));
        let counter = updates.clone();
        tree.signals_mut(leaf)
            .unwrap()
            .style_updated
            .connect(move |_, _| counter.set(counter.get() + 1));

        tree.reset_style(window);
        assert_eq!(updates.get(), 1);
        assert!(tree.has_flags(window, WidgetFlags::RESIZE_NEEDED));
    }
}
