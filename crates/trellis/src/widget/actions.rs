//! Named actions reachable from a widget.
//!
//! Widgets carry action groups under a prefix. An action named
//! `prefix.name` is resolved from a widget by walking up its ancestors and
//! taking the first group inserted under `prefix`; a group nearer the
//! widget shadows one further up. Resolution always follows the current
//! parent chain, so moving a widget changes which actions it sees.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use trellis_core::logging::targets;

use super::properties::PropertyValue;
use super::tree::{lookup, precondition};
use super::{WidgetId, WidgetTree};
use crate::error::WidgetError;

/// Handler run when an action is activated.
///
/// Receives the widget the group is inserted on and the optional parameter.
pub type ActionCallback = Rc<dyn Fn(&mut WidgetTree, WidgetId, Option<&PropertyValue>)>;

#[derive(Clone)]
struct Action {
    enabled: bool,
    callback: ActionCallback,
}

/// A set of named actions.
#[derive(Clone, Default)]
pub struct ActionGroup {
    actions: BTreeMap<String, Action>,
}

impl fmt::Debug for ActionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actions.keys()).finish()
    }
}

impl ActionGroup {
    /// An empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an enabled action, replacing one of the same name.
    pub fn add_action<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&mut WidgetTree, WidgetId, Option<&PropertyValue>) + 'static,
    {
        self.actions.insert(
            name.into(),
            Action {
                enabled: true,
                callback: Rc::new(callback),
            },
        );
    }

    /// Builder form of [`add_action`](Self::add_action).
    pub fn with_action<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut WidgetTree, WidgetId, Option<&PropertyValue>) + 'static,
    {
        self.add_action(name, callback);
        self
    }

    /// Remove an action.
    pub fn remove_action(&mut self, name: &str) -> bool {
        self.actions.remove(name).is_some()
    }

    /// Whether the group has an action.
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Action names in sorted order.
    pub fn list_actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Whether an action exists and is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.actions.get(name).is_some_and(|a| a.enabled)
    }

    /// Enable or disable an action.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.actions.get_mut(name) {
            Some(action) => {
                action.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the group is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn split_action_name(name: &str) -> Result<(&str, &str), WidgetError> {
    match name.split_once('.') {
        Some((prefix, action)) if !prefix.is_empty() && !action.is_empty() => Ok((prefix, action)),
        _ => Err(WidgetError::UnknownAction(name.to_owned())),
    }
}

impl WidgetTree {
    /// Insert `group` on a widget under `prefix`, or remove the group under
    /// `prefix` when `group` is `None`.
    pub fn insert_action_group(&mut self, id: WidgetId, prefix: &str, group: Option<ActionGroup>) {
        let Some(node) = self.nodes.get_mut(id) else {
            tracing::warn!(target: targets::EVENTS, ?id, "invalid widget id");
            return;
        };
        match group {
            Some(group) => {
                tracing::trace!(target: targets::EVENTS, widget = node.type_name, prefix, actions = group.len(), "action group inserted");
                node.action_groups.insert(prefix.to_owned(), group);
            }
            None => {
                node.action_groups.remove(prefix);
            }
        }
    }

    /// The group inserted on this widget under `prefix`.
    pub fn action_group(&self, id: WidgetId, prefix: &str) -> Option<&ActionGroup> {
        lookup(&self.nodes, id)?.action_groups.get(prefix)
    }

    /// Mutable access to the group inserted on this widget under `prefix`.
    pub fn action_group_mut(&mut self, id: WidgetId, prefix: &str) -> Option<&mut ActionGroup> {
        self.nodes.get_mut(id)?.action_groups.get_mut(prefix)
    }

    /// Find the widget holding the group that answers `prefix` for `id`.
    fn resolve_action_group(&self, id: WidgetId, prefix: &str) -> Option<WidgetId> {
        let mut current = Some(id);
        while let Some(widget) = current {
            let node = self.nodes.get(widget)?;
            if node.action_groups.contains_key(prefix) {
                return Some(widget);
            }
            current = node.parent;
        }
        None
    }

    /// Every `prefix.name` visible from a widget, sorted.
    pub fn list_action_names(&self, id: WidgetId) -> Vec<String> {
        let mut seen_prefixes = Vec::new();
        let mut names = Vec::new();
        for widget in self.path_from_root(id).into_iter().rev() {
            let Some(node) = self.nodes.get(widget) else {
                continue;
            };
            for (prefix, group) in &node.action_groups {
                if seen_prefixes.contains(prefix) {
                    continue;
                }
                seen_prefixes.push(prefix.clone());
                names.extend(group.list_actions().map(|a| format!("{prefix}.{a}")));
            }
        }
        names.sort();
        names
    }

    /// Activate `prefix.name` as seen from a widget.
    ///
    /// Returns whether an enabled action ran. Names that resolve to nothing
    /// are reported as a failed precondition.
    pub fn activate_action(&mut self, id: WidgetId, name: &str, parameter: Option<&PropertyValue>) -> bool {
        let resolved = self.resolve_action(id, name);
        let (holder, callback) = match resolved {
            Ok(Some(found)) => found,
            Ok(None) => {
                tracing::debug!(target: targets::EVENTS, action = name, "action disabled");
                return false;
            }
            Err(err) => {
                precondition!(targets::EVENTS, "activate_action", Err::<(), _>(err));
                return false;
            }
        };
        tracing::trace!(target: targets::EVENTS, action = name, "activating action");
        callback(self, holder, parameter);
        true
    }

    fn resolve_action(
        &self,
        id: WidgetId,
        name: &str,
    ) -> Result<Option<(WidgetId, ActionCallback)>, WidgetError> {
        if !self.nodes.contains_key(id) {
            return Err(WidgetError::InvalidWidget(id));
        }
        let (prefix, action) = split_action_name(name)?;
        let unknown = || WidgetError::UnknownAction(name.to_owned());
        let holder = self.resolve_action_group(id, prefix).ok_or_else(unknown)?;
        let entry = self
            .nodes
            .get(holder)
            .and_then(|n| n.action_groups.get(prefix))
            .and_then(|g| g.actions.get(action))
            .ok_or_else(unknown)?;
        Ok(entry.enabled.then(|| (holder, entry.callback.clone())))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::{BoxContainer, Window};
    use crate::widget::{Orientation, Widget};

    struct Leaf;
    impl Widget for Leaf {}

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> ActionGroup {
        let log = log.clone();
        ActionGroup::new().with_action("close", move |_, _, param| {
            let param = param.map(|p| p.to_string()).unwrap_or_default();
            log.borrow_mut().push(format!("{tag}:{param}"));
        })
    }

    #[test]
    fn actions_resolve_through_ancestors() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let leaf = tree.create(Leaf);
        tree.container_add(window, column);
        tree.container_add(column, leaf);

        let log = Rc::new(RefCell::new(Vec::new()));
        tree.insert_action_group(window, "win", Some(recorder(&log, "window")));
        assert!(tree.activate_action(leaf, "win.close", Some(&PropertyValue::Int(3))));

        tree.insert_action_group(column, "win", Some(recorder(&log, "column")));
        assert!(tree.activate_action(leaf, "win.close", None));
        assert!(tree.activate_action(window, "win.close", None));
        assert_eq!(*log.borrow(), vec!["window:3", "column:", "window:"]);
        assert_eq!(tree.list_action_names(leaf), vec!["win.close".to_owned()]);
    }

    #[test]
    fn moving_a_widget_changes_what_it_sees() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let left = tree.create(BoxContainer::new(Orientation::Vertical));
        let right = tree.create(BoxContainer::new(Orientation::Vertical));
        let outer = tree.create(BoxContainer::new(Orientation::Horizontal));
        let leaf = tree.create(Leaf);
        tree.container_add(window, outer);
        tree.container_add(outer, left);
        tree.container_add(outer, right);
        tree.container_add(left, leaf);

        let log = Rc::new(RefCell::new(Vec::new()));
        tree.insert_action_group(left, "pane", Some(recorder(&log, "left")));
        assert!(tree.activate_action(leaf, "pane.close", None));
        tree.reparent(leaf, right);
        assert!(!tree.activate_action(leaf, "pane.close", None));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn disabled_and_malformed_actions_do_nothing() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        tree.insert_action_group(window, "win", Some(recorder(&log, "window")));
        assert!(tree.action_group_mut(window, "win").unwrap().set_enabled("close", false));

        assert!(!tree.activate_action(window, "win.close", None));
        assert!(!tree.activate_action(window, "close", None));
        assert!(!tree.activate_action(window, "win.open", None));
        assert!(log.borrow().is_empty());

        tree.insert_action_group(window, "win", None);
        assert!(tree.action_group(window, "win").is_none());
    }
}
