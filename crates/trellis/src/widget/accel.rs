//! Keyboard accelerators.
//!
//! Each toplevel owns an [`AccelGroup`] mapping key combinations to widgets
//! and signal names. Key presses reaching a toplevel are matched against
//! its group before they go to the focus widget; the first sensitive,
//! viewable widget bound to the key gets `accel_activated`.
//!
//! Accelerators are written either in the bracket form used by builder
//! files, `<Control><Shift>s`, or in the plus form, `Ctrl+Shift+S`.

use std::fmt;

use trellis_core::logging::targets;

use super::events::{Event, EventKind};
use super::flags::{ModifierType, WidgetFlags};
use super::tree::lookup;
use super::{WidgetId, WidgetTree};

/// A key value with the modifiers that must be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccelKey {
    /// Key value, lowercased for letters.
    pub keyval: u32,
    /// Required modifiers, within [`ModifierType::ACCELERATOR`].
    pub mods: ModifierType,
}

impl AccelKey {
    /// An accelerator for a key and modifiers.
    pub fn new(keyval: u32, mods: ModifierType) -> Self {
        Self {
            keyval: normalize_keyval(keyval),
            mods: mods & ModifierType::ACCELERATOR,
        }
    }

    /// Whether a key press with this key value and state triggers it.
    pub fn matches(&self, keyval: u32, state: ModifierType) -> bool {
        self.keyval == normalize_keyval(keyval) && self.mods == state & ModifierType::ACCELERATOR
    }
}

impl fmt::Display for AccelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in MODIFIER_NAMES {
            if self.mods.contains(*flag) {
                write!(f, "<{name}>")?;
            }
        }
        match key_name(self.keyval) {
            Some(name) => f.write_str(name),
            None => match char::from_u32(self.keyval) {
                Some(c) if !c.is_control() => write!(f, "{c}"),
                _ => write!(f, "0x{:x}", self.keyval),
            },
        }
    }
}

const MODIFIER_NAMES: &[(ModifierType, &str)] = &[
    (ModifierType::SHIFT, "Shift"),
    (ModifierType::CONTROL, "Control"),
    (ModifierType::ALT, "Alt"),
    (ModifierType::SUPER, "Super"),
    (ModifierType::HYPER, "Hyper"),
    (ModifierType::META, "Meta"),
];

const KEY_NAMES: &[(&str, u32)] = &[
    ("space", 0x20),
    ("BackSpace", 0xff08),
    ("Tab", 0xff09),
    ("Return", 0xff0d),
    ("Escape", 0xff1b),
    ("Home", 0xff50),
    ("Left", 0xff51),
    ("Up", 0xff52),
    ("Right", 0xff53),
    ("Down", 0xff54),
    ("Page_Up", 0xff55),
    ("Page_Down", 0xff56),
    ("End", 0xff57),
    ("Insert", 0xff63),
    ("Menu", 0xff67),
    ("Delete", 0xffff),
];

/// Keyval of F1; F2 to F12 follow.
const KEY_F1: u32 = 0xffbe;

pub(crate) fn normalize_keyval(keyval: u32) -> u32 {
    match char::from_u32(keyval) {
        Some(c) if c.is_ascii_uppercase() => u32::from(c.to_ascii_lowercase()),
        _ => keyval,
    }
}

fn key_name(keyval: u32) -> Option<&'static str> {
    const F_NAMES: [&str; 12] = [
        "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
    ];
    if let Some(index) = keyval.checked_sub(KEY_F1) {
        if let Some(name) = F_NAMES.get(index as usize) {
            return Some(name);
        }
    }
    KEY_NAMES.iter().find(|(_, v)| *v == keyval).map(|(n, _)| *n)
}

fn parse_modifier(name: &str) -> Option<ModifierType> {
    Some(match name.to_ascii_lowercase().as_str() {
        "shift" => ModifierType::SHIFT,
        "control" | "ctrl" | "ctl" | "primary" => ModifierType::CONTROL,
        "alt" | "mod1" | "option" => ModifierType::ALT,
        "super" | "win" => ModifierType::SUPER,
        "hyper" => ModifierType::HYPER,
        "meta" | "cmd" => ModifierType::META,
        _ => return None,
    })
}

fn parse_key(name: &str) -> Option<u32> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(normalize_keyval(u32::from(c)));
    }
    if let Some(n) = name.strip_prefix(['F', 'f']).and_then(|n| n.parse::<u32>().ok()) {
        if (1..=12).contains(&n) {
            return Some(KEY_F1 + n - 1);
        }
    }
    KEY_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| *v)
}

/// Parse `<Control>s`, `Ctrl+S` and similar.
pub fn parse_accelerator(text: &str) -> Option<AccelKey> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut mods = ModifierType::empty();
    let key = if text.starts_with('<') {
        let mut rest = text;
        while let Some(inner) = rest.strip_prefix('<') {
            let (name, tail) = inner.split_once('>')?;
            mods |= parse_modifier(name)?;
            rest = tail;
        }
        rest
    } else {
        let mut parts: Vec<&str> = text.split('+').map(str::trim).collect();
        // "Ctrl++" binds the plus key
        if text.ends_with("++") {
            parts.truncate(parts.len().saturating_sub(2));
            parts.push("+");
        }
        let key = parts.pop()?;
        for part in parts {
            mods |= parse_modifier(part)?;
        }
        key
    };
    Some(AccelKey::new(parse_key(key)?, mods))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AccelEntry {
    key: AccelKey,
    widget: WidgetId,
    signal: String,
}

/// Accelerators of one toplevel, in installation order.
#[derive(Debug, Clone, Default)]
pub struct AccelGroup {
    entries: Vec<AccelEntry>,
}

impl AccelGroup {
    /// Number of accelerators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the group is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Widgets and signal names bound to a key, in installation order.
    pub fn find(&self, key: AccelKey) -> Vec<(WidgetId, &str)> {
        self.entries
            .iter()
            .filter(|e| e.key == key)
            .map(|e| (e.widget, e.signal.as_str()))
            .collect()
    }

    fn connect(&mut self, key: AccelKey, widget: WidgetId, signal: &str) -> bool {
        let entry = AccelEntry {
            key,
            widget,
            signal: signal.to_owned(),
        };
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    fn disconnect(&mut self, key: AccelKey, widget: WidgetId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !(e.key == key && e.widget == widget));
        self.entries.len() != before
    }

    fn disconnect_widget(&mut self, widget: WidgetId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.widget != widget);
        before - self.entries.len()
    }
}

impl WidgetTree {
    /// Bind a key on `toplevel` to emit `accel_activated` on `widget` with
    /// `signal` as payload.
    pub fn add_accelerator(&mut self, widget: WidgetId, signal: &str, toplevel: WidgetId, key: AccelKey) {
        if lookup(&self.nodes, widget).is_none() {
            return;
        }
        let Some(group) = self.accel_group_mut(toplevel) else {
            tracing::warn!(target: targets::EVENTS, "accelerators need a toplevel");
            return;
        };
        if group.connect(key, widget, signal) {
            tracing::trace!(target: targets::EVENTS, accel = %key, signal, "accelerator added");
            self.notify(widget, "accelerators");
        }
    }

    /// Remove a key binding of `widget` from `toplevel`.
    pub fn remove_accelerator(&mut self, widget: WidgetId, toplevel: WidgetId, key: AccelKey) -> bool {
        let removed = self
            .accel_group_mut(toplevel)
            .is_some_and(|g| g.disconnect(key, widget));
        if removed {
            self.notify(widget, "accelerators");
        }
        removed
    }

    /// Keys bound to a widget on any toplevel.
    pub fn list_accelerators(&self, widget: WidgetId) -> Vec<AccelKey> {
        self.nodes
            .values()
            .filter_map(|n| n.toplevel.as_ref())
            .flat_map(|t| t.accel_group.entries.iter())
            .filter(|e| e.widget == widget)
            .map(|e| e.key)
            .collect()
    }

    /// The accelerator group of a toplevel.
    pub fn accel_group(&self, toplevel: WidgetId) -> Option<&AccelGroup> {
        Some(&self.nodes.get(toplevel)?.toplevel.as_ref()?.accel_group)
    }

    fn accel_group_mut(&mut self, toplevel: WidgetId) -> Option<&mut AccelGroup> {
        Some(&mut self.nodes.get_mut(toplevel)?.toplevel.as_mut()?.accel_group)
    }

    /// Drop every binding of a widget being destroyed.
    pub(crate) fn remove_accelerators_for(&mut self, widget: WidgetId) {
        let removed: usize = self
            .nodes
            .values_mut()
            .filter_map(|n| n.toplevel.as_mut())
            .map(|t| t.accel_group.disconnect_widget(widget))
            .sum();
        if removed > 0 {
            tracing::trace!(target: targets::EVENTS, removed, "accelerators dropped");
        }
    }

    /// Whether a widget may be activated by an accelerator: sensitive and
    /// on screen.
    pub fn can_activate_accel(&self, widget: WidgetId) -> bool {
        self.is_sensitive(widget)
            && self
                .path_from_root(widget)
                .iter()
                .all(|w| self.has_flags(*w, WidgetFlags::VISIBLE | WidgetFlags::MAPPED))
    }

    /// Activate the first accelerator of `toplevel` matching a key press.
    ///
    /// Returns whether one fired.
    pub(crate) fn activate_accelerator(&mut self, toplevel: WidgetId, event: &Event) -> bool {
        let EventKind::KeyPress(key) = &event.kind else {
            return false;
        };
        let Some(group) = self.accel_group(toplevel) else {
            return false;
        };
        let candidates: Vec<(WidgetId, String)> = group
            .entries
            .iter()
            .filter(|e| e.key.matches(key.keyval, event.state))
            .map(|e| (e.widget, e.signal.clone()))
            .collect();
        for (widget, signal) in candidates {
            if !self.can_activate_accel(widget) {
                continue;
            }
            tracing::trace!(
                target: targets::EVENTS,
                widget = self.type_name(widget).unwrap_or("?"),
                signal = signal.as_str(),
                "accelerator activated"
            );
            self.emit(widget, |s| &s.accel_activated, signal);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::Window;
    use crate::widget::Widget;

    struct Leaf;
    impl Widget for Leaf {}

    #[test]
    fn both_notations_parse_to_the_same_key() {
        let bracket = parse_accelerator("<Control><Shift>s").unwrap();
        let plus = parse_accelerator("Ctrl+Shift+S").unwrap();
        assert_eq!(bracket, plus);
        assert_eq!(bracket.keyval, u32::from('s'));
        assert_eq!(bracket.mods, ModifierType::CONTROL | ModifierType::SHIFT);
        assert_eq!(bracket.to_string(), "<Shift><Control>s");

        assert_eq!(parse_accelerator("F5").unwrap().keyval, KEY_F1 + 4);
        assert_eq!(parse_accelerator("<Alt>Return").unwrap().to_string(), "<Alt>Return");
        assert_eq!(parse_accelerator("Ctrl++").unwrap().keyval, u32::from('+'));
        assert!(parse_accelerator("<Bogus>a").is_none());
        assert!(parse_accelerator("").is_none());
    }

    #[test]
    fn matching_ignores_buttons_and_lock() {
        let key = parse_accelerator("<Control>q").unwrap();
        let state = ModifierType::CONTROL | ModifierType::LOCK | ModifierType::BUTTON1;
        assert!(key.matches(u32::from('Q'), state));
        assert!(!key.matches(u32::from('q'), ModifierType::CONTROL | ModifierType::ALT));
    }

    #[test]
    fn key_presses_fire_accelerators_before_focus() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let leaf = tree.create(Leaf);
        tree.container_add(window, leaf);
        tree.show_all(window);
        let native = tree.window(window).unwrap();

        let fired = Rc::new(RefCell::new(Vec::new()));
        let log = fired.clone();
        tree.signals_mut(leaf)
            .unwrap()
            .accel_activated
            .connect(move |_, (_, signal): &(WidgetId, String)| log.borrow_mut().push(signal.clone()));
        tree.add_accelerator(leaf, "activate", window, parse_accelerator("<Control>q").unwrap());
        assert_eq!(tree.list_accelerators(leaf).len(), 1);

        let press = Event::key_press(u32::from('q'), ModifierType::CONTROL).with_window(native);
        assert!(tree.dispatch_event(&press).is_stop());
        assert_eq!(*fired.borrow(), vec!["activate".to_owned()]);

        tree.set_sensitive(leaf, false);
        assert!(!tree.dispatch_event(&press).is_stop());
        assert_eq!(fired.borrow().len(), 1);
    }

    #[test]
    fn destroyed_widgets_lose_their_accelerators() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let leaf = tree.create(Leaf);
        tree.container_add(window, leaf);
        tree.add_accelerator(leaf, "activate", window, parse_accelerator("a").unwrap());
        tree.destroy(leaf);
        assert!(tree.accel_group(window).unwrap().is_empty());
    }
}
