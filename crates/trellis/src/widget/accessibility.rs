//! Accessible peers.
//!
//! Each widget lazily owns one [`AccessiblePeer`]. The core creates it on
//! first request, keeps its state, name and bounds current, and drops it on
//! destroy. Bridging peers to a platform accessibility API is outside the
//! core.

use thiserror::Error;
use trellis_core::Rect;

use super::WidgetId;
use super::flags::StateFlags;
use super::{WidgetTree, tree::lookup};
use trellis_core::logging::targets;

/// Role exposed to assistive technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessibleRole {
    /// No specific role.
    #[default]
    Generic,
    /// A toplevel window.
    Window,
    /// A grouping container.
    Panel,
    /// A push button.
    PushButton,
    /// Static text.
    Label,
    /// Editable text.
    Text,
}

/// Relation between two accessible objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessibleRelation {
    /// This object is labelled by the target.
    LabelledBy,
    /// This object labels the target.
    LabelFor,
    /// This object is described by the target.
    DescribedBy,
    /// This object describes the target.
    DescriptionFor,
    /// This object controls the target.
    ControllerFor,
    /// This object is controlled by the target.
    ControlledBy,
    /// This object is a member of the target's group.
    MemberOf,
}

impl AccessibleRelation {
    /// Parse a builder relation type such as `labelled-by`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "labelled-by" => Self::LabelledBy,
            "label-for" => Self::LabelFor,
            "described-by" => Self::DescribedBy,
            "description-for" => Self::DescriptionFor,
            "controller-for" => Self::ControllerFor,
            "controlled-by" => Self::ControlledBy,
            "member-of" => Self::MemberOf,
            _ => return None,
        })
    }
}

/// A named action exposed to assistive technology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessibleAction {
    /// Action name.
    pub name: String,
    /// Human readable description.
    pub description: Option<String>,
}

/// Why a class could not build its peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("accessible construction failed: {0}")]
pub struct AccessibleError(pub String);

/// The accessibility-side mirror of a widget.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessiblePeer {
    role: AccessibleRole,
    name: Option<String>,
    description: Option<String>,
    state: StateFlags,
    bounds: Rect,
    relations: Vec<(AccessibleRelation, WidgetId)>,
    actions: Vec<AccessibleAction>,
    fallback: bool,
}

impl AccessiblePeer {
    /// Create a peer with a role.
    pub fn new(role: AccessibleRole) -> Self {
        Self {
            role,
            name: None,
            description: None,
            state: StateFlags::empty(),
            bounds: Rect::ZERO,
            relations: Vec::new(),
            actions: Vec::new(),
            fallback: false,
        }
    }

    fn generic_fallback() -> Self {
        Self {
            fallback: true,
            ..Self::new(AccessibleRole::Generic)
        }
    }

    /// Role.
    pub fn role(&self) -> AccessibleRole {
        self.role
    }

    /// Accessible name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the accessible name.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Accessible description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Set the accessible description.
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Last known widget state.
    pub fn state(&self) -> StateFlags {
        self.state
    }

    /// Last known widget allocation.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Relations to other widgets.
    pub fn relations(&self) -> &[(AccessibleRelation, WidgetId)] {
        &self.relations
    }

    /// Add a relation. Duplicates are ignored.
    pub fn add_relation(&mut self, relation: AccessibleRelation, target: WidgetId) {
        if !self.relations.contains(&(relation, target)) {
            self.relations.push((relation, target));
        }
    }

    /// Exposed actions.
    pub fn actions(&self) -> &[AccessibleAction] {
        &self.actions
    }

    /// Expose an action, replacing the description of an existing one.
    pub fn add_action(&mut self, name: impl Into<String>, description: Option<String>) {
        let name = name.into();
        match self.actions.iter_mut().find(|a| a.name == name) {
            Some(action) => action.description = description,
            None => self.actions.push(AccessibleAction { name, description }),
        }
    }

    /// Whether the peer is the generic fallback built after the class
    /// failed to build its own.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

impl WidgetTree {
    /// The widget's accessible peer, created on first use.
    pub fn accessible(&mut self, id: WidgetId) -> Option<&AccessiblePeer> {
        self.ensure_accessible(id)?;
        self.nodes.get(id)?.accessible.as_ref()
    }

    /// Mutable access to the widget's accessible peer, created on first use.
    pub fn accessible_mut(&mut self, id: WidgetId) -> Option<&mut AccessiblePeer> {
        self.ensure_accessible(id)?;
        self.nodes.get_mut(id)?.accessible.as_mut()
    }

    /// Whether the peer has been created.
    pub fn has_accessible(&self, id: WidgetId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.accessible.is_some())
    }

    fn ensure_accessible(&mut self, id: WidgetId) -> Option<()> {
        let node = lookup(&self.nodes, id)?;
        if node.accessible.is_some() {
            return Some(());
        }
        let type_name = node.type_name;
        let created = node
            .class
            .as_ref()
            .map(|class| class.create_accessible(class.accessible_role()));
        let mut peer = match created {
            Some(Ok(peer)) => peer,
            Some(Err(err)) => {
                tracing::warn!(
                    target: targets::LIFECYCLE,
                    widget = type_name,
                    %err,
                    "using generic accessible"
                );
                AccessiblePeer::generic_fallback()
            }
            None => AccessiblePeer::generic_fallback(),
        };
        let node = self.nodes.get_mut(id)?;
        peer.state = node.state;
        peer.bounds = node.allocation;
        if peer.name.is_none() {
            peer.name = node.name.clone();
        }
        node.accessible = Some(peer);
        Some(())
    }

    pub(crate) fn update_accessible_state(&mut self, id: WidgetId) {
        if let Some(node) = self.nodes.get_mut(id) {
            let state = node.state;
            if let Some(peer) = node.accessible.as_mut() {
                peer.state = state;
            }
        }
    }

    pub(crate) fn update_accessible_bounds(&mut self, id: WidgetId) {
        if let Some(node) = self.nodes.get_mut(id) {
            let bounds = node.allocation;
            if let Some(peer) = node.accessible.as_mut() {
                peer.bounds = bounds;
            }
        }
    }
}
