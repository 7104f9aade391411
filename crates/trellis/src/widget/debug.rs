//! Debug utilities: tree dumps and whole-tree invariant checks.

use std::fmt::{self, Write};

use trellis_core::{Point, Rect, TreeFormatOptions};

use super::flags::WidgetFlags;
use super::{WidgetId, WidgetTree};

/// A broken structural invariant found by
/// [`WidgetTree::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// The offending widget.
    pub widget: WidgetId,
    /// Its class name.
    pub type_name: &'static str,
    /// What is wrong.
    pub message: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}: {}", self.type_name, self.widget, self.message)
    }
}

impl WidgetTree {
    /// Check structural invariants over every widget.
    ///
    /// Covers lifecycle flags, parent and child links, allocation
    /// containment and focus and default uniqueness per toplevel.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let mut report = |widget: WidgetId, type_name: &'static str, message: String| {
            violations.push(InvariantViolation {
                widget,
                type_name,
                message,
            });
        };

        for (id, node) in &self.nodes {
            if let Err(message) = self.check_node_invariants(id) {
                report(id, node.type_name, message.to_owned());
            }
            if let Some(parent) = node.parent {
                match self.nodes.get(parent) {
                    Some(parent_node) if parent_node.children.contains(&id) => {
                        if node.has(WidgetFlags::MAPPED) && !node.allocation.is_empty() {
                            let space = if parent_node.has_window() {
                                Rect::from_origin_size(Point::ZERO, parent_node.allocation.size())
                            } else {
                                parent_node.allocation
                            };
                            if !space.contains_rect(&node.allocation) {
                                report(
                                    id,
                                    node.type_name,
                                    format!(
                                        "allocation {:?} outside parent {} {:?}",
                                        node.allocation, parent_node.type_name, space
                                    ),
                                );
                            }
                        }
                    }
                    Some(_) => report(id, node.type_name, "missing from its parent's children".into()),
                    None => report(id, node.type_name, "parent no longer exists".into()),
                }
            }
            for child in &node.children {
                if self.nodes.get(*child).is_none_or(|c| c.parent != Some(id)) {
                    report(id, node.type_name, format!("child {child:?} does not point back"));
                }
            }
            if node.is_toplevel() {
                let descendants = self.descendants(id);
                let focused = descendants
                    .iter()
                    .filter(|w| self.has_flags(**w, WidgetFlags::HAS_FOCUS))
                    .count();
                if focused > 1 {
                    report(id, node.type_name, format!("{focused} widgets have focus"));
                }
                let defaults = descendants
                    .iter()
                    .filter(|w| self.has_flags(**w, WidgetFlags::HAS_DEFAULT))
                    .count();
                if defaults > 1 {
                    report(id, node.type_name, format!("{defaults} widgets are default"));
                }
            }
        }
        violations
    }
}

/// Renders widget trees as indented text.
#[derive(Debug, Clone, Default)]
pub struct WidgetTreeDebug {
    options: TreeFormatOptions,
}

impl WidgetTreeDebug {
    /// A formatter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// A formatter with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format every root widget and its subtree.
    pub fn format_all(&self, tree: &WidgetTree) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Widget Tree ({} widgets):", tree.len());
        let roots: Vec<WidgetId> = tree
            .widget_ids()
            .filter(|id| tree.parent(*id).is_none())
            .collect();
        if roots.is_empty() {
            output.push_str("  (empty)\n");
        }
        for root in roots {
            self.format_into(tree, root, 0, "", true, &mut output);
        }
        output
    }

    /// Format one subtree.
    pub fn format_subtree(&self, tree: &WidgetTree, root: WidgetId) -> String {
        let mut output = String::new();
        self.format_into(tree, root, 0, "", true, &mut output);
        output
    }

    fn format_into(
        &self,
        tree: &WidgetTree,
        id: WidgetId,
        depth: usize,
        prefix: &str,
        is_last: bool,
        output: &mut String,
    ) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }
        let Some(type_name) = tree.type_name(id) else {
            return;
        };
        let style = self.options.style;
        output.push_str(prefix);
        if depth > 0 {
            output.push_str(style.branch(is_last));
        }
        output.push_str(type_name);
        if let Some(name) = tree.name(id) {
            let _ = write!(output, " #{name}");
        }
        if self.options.show_ids {
            let _ = write!(output, " [{id:?}]");
        }
        if self.options.show_flags {
            let flags: Vec<&str> = [
                (WidgetFlags::VISIBLE, "visible"),
                (WidgetFlags::REALIZED, "realized"),
                (WidgetFlags::MAPPED, "mapped"),
            ]
            .into_iter()
            .filter(|(flag, _)| tree.has_flags(id, *flag))
            .map(|(_, label)| label)
            .collect();
            if !flags.is_empty() {
                let _ = write!(output, " ({})", flags.join(", "));
            }
        }
        if self.options.show_allocation {
            let a = tree.allocation(id);
            let _ = write!(output, " {}x{}+{}+{}", a.width, a.height, a.x, a.y);
        }
        output.push('\n');

        let child_prefix = if depth > 0 {
            format!("{prefix}{}", style.continuation(is_last))
        } else {
            prefix.to_owned()
        };
        let children = tree.children(id);
        for (i, child) in children.iter().enumerate() {
            self.format_into(tree, *child, depth + 1, &child_prefix, i + 1 == children.len(), output);
        }
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::{Settings, TreeStyle};

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::{BoxContainer, Window};
    use crate::widget::{Orientation, Widget};

    struct Leaf;
    impl Widget for Leaf {}

    #[test]
    fn dumps_show_structure_and_flags() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let a = tree.create(Leaf);
        let b = tree.create(Leaf);
        tree.container_add(window, column);
        tree.container_add(column, a);
        tree.container_add(column, b);
        tree.set_name(b, Some("last".into()));
        tree.show_all(window);

        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            ..TreeFormatOptions::minimal()
        };
        let dump = WidgetTreeDebug::with_options(options).format_subtree(&tree, window);
        assert_eq!(dump, "Window\n`-- BoxContainer\n    |-- Leaf\n    `-- Leaf #last\n");

        let detailed = WidgetTreeDebug::new().format_all(&tree);
        assert!(detailed.starts_with("Widget Tree (4 widgets):"));
        assert!(detailed.contains("(visible, realized, mapped)"));
    }

    #[test]
    fn a_laid_out_tree_has_no_violations() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let leaf = tree.create(Leaf);
        tree.set_size_request(leaf, 30, 20);
        tree.container_add(window, column);
        tree.container_add(column, leaf);
        tree.show_all(window);
        assert_eq!(tree.check_invariants(), Vec::new());
    }
}
