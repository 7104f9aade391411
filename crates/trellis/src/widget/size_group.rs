//! Size groups couple the requests of unrelated widgets.
//!
//! Every member of a group reports the maximum request of the group along
//! the coupled axes. Groups chain: a widget in two groups couples both
//! groups' members.

use std::collections::HashSet;

use trellis_core::logging::targets;

use super::geometry::Orientation;
use super::tree::{lookup, precondition};
use super::{SizeGroupId, WidgetId, WidgetTree};
use crate::error::WidgetError;

/// Axes a size group couples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SizeGroupMode {
    /// No coupling.
    None,
    /// Widths are coupled.
    #[default]
    Horizontal,
    /// Heights are coupled.
    Vertical,
    /// Both axes are coupled.
    Both,
}

impl SizeGroupMode {
    /// Whether the mode couples an axis.
    pub fn couples(self, orientation: Orientation) -> bool {
        matches!(
            (self, orientation),
            (Self::Both, _)
                | (Self::Horizontal, Orientation::Horizontal)
                | (Self::Vertical, Orientation::Vertical)
        )
    }
}

/// A set of widgets sharing their requests.
#[derive(Debug, Clone, Default)]
pub struct SizeGroup {
    pub(crate) mode: SizeGroupMode,
    /// Leave widgets that are not visible out of the maximum.
    pub(crate) ignore_hidden: bool,
    pub(crate) widgets: Vec<WidgetId>,
}

impl SizeGroup {
    /// The coupled axes.
    pub fn mode(&self) -> SizeGroupMode {
        self.mode
    }

    /// Whether hidden members are left out.
    pub fn ignore_hidden(&self) -> bool {
        self.ignore_hidden
    }

    /// Current members.
    pub fn widgets(&self) -> &[WidgetId] {
        &self.widgets
    }
}

impl WidgetTree {
    /// Create an empty size group.
    ///
    /// `ignore_hidden` starts at the settings default.
    pub fn create_size_group(&mut self, mode: SizeGroupMode) -> SizeGroupId {
        self.size_groups.insert(SizeGroup {
            mode,
            ignore_hidden: self.settings.size_group_ignore_hidden_default,
            widgets: Vec::new(),
        })
    }

    /// Look up a size group.
    pub fn size_group(&self, group: SizeGroupId) -> Option<&SizeGroup> {
        self.size_groups.get(group)
    }

    /// Change the coupled axes, re-measuring the members.
    pub fn size_group_set_mode(&mut self, group: SizeGroupId, mode: SizeGroupMode) {
        let Some(entry) = self.size_groups.get_mut(group) else {
            tracing::warn!(target: targets::LAYOUT, ?group, "invalid size group");
            return;
        };
        if entry.mode == mode {
            return;
        }
        entry.mode = mode;
        self.queue_resize_group_members(group);
    }

    /// Choose whether hidden members count towards the maximum.
    pub fn size_group_set_ignore_hidden(&mut self, group: SizeGroupId, ignore_hidden: bool) {
        let Some(entry) = self.size_groups.get_mut(group) else {
            tracing::warn!(target: targets::LAYOUT, ?group, "invalid size group");
            return;
        };
        if entry.ignore_hidden != ignore_hidden {
            entry.ignore_hidden = ignore_hidden;
            self.queue_resize_group_members(group);
        }
    }

    /// Add a widget to a group.
    pub fn size_group_add_widget(&mut self, group: SizeGroupId, widget: WidgetId) {
        precondition!(
            targets::LAYOUT,
            "size_group_add_widget",
            self.try_size_group_add_widget(group, widget)
        );
    }

    fn try_size_group_add_widget(
        &mut self,
        group: SizeGroupId,
        widget: WidgetId,
    ) -> Result<(), WidgetError> {
        let node = self
            .nodes
            .get_mut(widget)
            .ok_or(WidgetError::InvalidWidget(widget))?;
        let entry = self
            .size_groups
            .get_mut(group)
            .ok_or(WidgetError::InvalidSizeGroup)?;
        if entry.widgets.contains(&widget) {
            return Ok(());
        }
        entry.widgets.push(widget);
        node.size_groups.push(group);
        self.queue_resize(widget);
        Ok(())
    }

    /// Remove a widget from a group.
    pub fn size_group_remove_widget(&mut self, group: SizeGroupId, widget: WidgetId) {
        let Some(entry) = self.size_groups.get_mut(group) else {
            return;
        };
        let before = entry.widgets.len();
        entry.widgets.retain(|w| *w != widget);
        if entry.widgets.len() == before {
            return;
        }
        if let Some(node) = self.nodes.get_mut(widget) {
            node.size_groups.retain(|g| *g != group);
        }
        self.queue_resize_group_members(group);
        self.queue_resize(widget);
    }

    /// Dissolve a group.
    pub fn destroy_size_group(&mut self, group: SizeGroupId) {
        let Some(entry) = self.size_groups.remove(group) else {
            return;
        };
        for widget in entry.widgets {
            if let Some(node) = self.nodes.get_mut(widget) {
                node.size_groups.retain(|g| *g != group);
            }
            if self.nodes.contains_key(widget) {
                self.queue_resize(widget);
            }
        }
    }

    fn queue_resize_group_members(&mut self, group: SizeGroupId) {
        let members = self
            .size_groups
            .get(group)
            .map(|g| g.widgets.clone())
            .unwrap_or_default();
        for widget in members {
            self.queue_resize(widget);
        }
    }

    /// Every widget coupled to `id` along an axis, `id` included.
    ///
    /// Members of `ignore_hidden` groups count only while visible.
    pub(crate) fn size_group_peers(&self, id: WidgetId, orientation: Orientation) -> Vec<WidgetId> {
        let mut peers = vec![id];
        let mut seen_widgets: HashSet<WidgetId> = HashSet::from([id]);
        let mut seen_groups = HashSet::new();
        let mut index = 0;
        while index < peers.len() {
            let widget = peers[index];
            index += 1;
            let Some(node) = self.nodes.get(widget) else {
                continue;
            };
            for group_id in &node.size_groups {
                if !seen_groups.insert(*group_id) {
                    continue;
                }
                let Some(group) = self.size_groups.get(*group_id) else {
                    continue;
                };
                if !group.mode.couples(orientation) {
                    continue;
                }
                for member in &group.widgets {
                    if group.ignore_hidden && !self.is_visible_effective(*member) {
                        continue;
                    }
                    if seen_widgets.insert(*member) {
                        peers.push(*member);
                    }
                }
            }
        }
        peers
    }

    /// Members of the widget's groups on any axis, excluding the widget.
    pub(crate) fn size_group_neighbours(&self, id: WidgetId) -> Vec<WidgetId> {
        let Some(node) = lookup(&self.nodes, id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for group_id in &node.size_groups {
            let Some(group) = self.size_groups.get(*group_id) else {
                continue;
            };
            if group.mode == SizeGroupMode::None {
                continue;
            }
            out.extend(group.widgets.iter().copied().filter(|w| *w != id));
        }
        out
    }
}
