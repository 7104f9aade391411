//! Widget paths used to match style rules.

use std::fmt;

use super::flags::StateFlags;
use super::{WidgetId, WidgetTree};

/// One widget of a [`WidgetPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
    /// Class type name.
    pub type_name: &'static str,
    /// Widget name, if set.
    pub name: Option<String>,
    /// Style classes.
    pub classes: Vec<String>,
    /// Effective state flags.
    pub state: StateFlags,
}

/// The chain of widgets from a root down to one widget, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetPath {
    nodes: Vec<PathNode>,
}

impl WidgetPath {
    /// Number of widgets in the path.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the path is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The widgets, root first.
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    /// The widget the path leads to.
    pub fn last(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    /// Whether any widget of the path, the last one included, has the type.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.nodes.iter().any(|n| n.type_name == type_name)
    }
}

impl fmt::Display for WidgetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            f.write_str(node.type_name)?;
            if let Some(name) = &node.name {
                write!(f, "#{name}")?;
            }
            for class in &node.classes {
                write!(f, ".{class}")?;
            }
        }
        Ok(())
    }
}

impl WidgetTree {
    /// Build the path from the root to the widget.
    pub fn widget_path(&self, id: WidgetId) -> WidgetPath {
        let nodes = self
            .path_from_root(id)
            .into_iter()
            .filter_map(|w| {
                let node = self.nodes.get(w)?;
                Some(PathNode {
                    type_name: node.type_name,
                    name: node.name.clone(),
                    classes: node
                        .style
                        .as_ref()
                        .map(|s| s.classes().to_vec())
                        .unwrap_or_default(),
                    state: node.state,
                })
            })
            .collect();
        WidgetPath { nodes }
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::{BoxContainer, Window};
    use crate::widget::Orientation;

    #[test]
    fn path_lists_ancestors_root_first() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        tree.container_add(window, column);
        tree.set_name(column, Some("sidebar".into()));
        tree.add_style_class(column, "view");

        let path = tree.widget_path(column);
        assert_eq!(path.len(), 2);
        assert_eq!(path.to_string(), "Window > BoxContainer#sidebar.view");
        assert!(path.has_type("Window"));
    }
}
