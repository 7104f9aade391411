//! Widget classes by name, and composite widget templates.
//!
//! A class may publish a template: builder XML whose `<template>` element
//! names the class and lists the children every instance starts with.
//! The class calls [`WidgetTree::init_template`] from [`Widget::init`];
//! children that carry an `id` are then reachable through
//! [`WidgetTree::template_child`].
//!
//! ```xml
//! <interface>
//!   <template class="Toolbar" parent="BoxContainer">
//!     <child>
//!       <object class="Button" id="save">
//!         <signal name="show" handler="save_shown"/>
//!       </object>
//!     </child>
//!   </template>
//! </interface>
//! ```

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use trellis_core::logging::targets;

use super::geometry::Orientation;
use super::traits::Widget;
use super::widgets::{BoxContainer, Window};
use super::{WidgetId, WidgetTree};
use crate::error::BuilderError;

/// Builds a fresh class instance.
pub type WidgetFactory = Rc<dyn Fn() -> Box<dyn Widget>>;

/// Handler bound to a callback symbol.
///
/// Receives the widget that emitted the signal and the user data widget:
/// the template instance, the `object` named on the `<signal>` element, or
/// the emitter itself.
pub type TemplateCallback = Rc<dyn Fn(&mut WidgetTree, WidgetId, WidgetId)>;

/// Class factories, templates and callback symbols.
#[derive(Clone)]
pub struct ClassRegistry {
    factories: HashMap<String, WidgetFactory>,
    templates: HashMap<String, Rc<str>>,
    class_callbacks: HashMap<String, HashMap<String, TemplateCallback>>,
    callbacks: HashMap<String, TemplateCallback>,
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<_> = self.factories.keys().collect();
        classes.sort();
        let mut templates: Vec<_> = self.templates.keys().collect();
        templates.sort();
        f.debug_struct("ClassRegistry")
            .field("classes", &classes)
            .field("templates", &templates)
            .finish_non_exhaustive()
    }
}

impl Default for ClassRegistry {
    /// A registry knowing the bundled classes.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_class("Window", || Box::new(Window::new()));
        registry.register_class("BoxContainer", || {
            Box::new(BoxContainer::new(Orientation::Horizontal))
        });
        registry
    }
}

impl ClassRegistry {
    /// A registry with no classes at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            templates: HashMap::new(),
            class_callbacks: HashMap::new(),
            callbacks: HashMap::new(),
        }
    }

    /// Register a factory under a class name, replacing any previous one.
    pub fn register_class<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Widget> + 'static,
    {
        self.factories.insert(name.into(), Rc::new(factory));
    }

    /// Register a `Default` class under its type name.
    pub fn register<W: Widget + Default>(&mut self) {
        let name = W::default().type_name();
        self.register_class(name, || Box::new(W::default()));
    }

    /// Whether a class name is known.
    pub fn has_class(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate a class by name.
    pub fn create(&self, name: &str) -> Option<Box<dyn Widget>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Publish a template for a class.
    pub fn set_template(&mut self, class: impl Into<String>, xml: impl Into<Rc<str>>) {
        self.templates.insert(class.into(), xml.into());
    }

    /// The template of a class.
    pub fn template(&self, class: &str) -> Option<Rc<str>> {
        self.templates.get(class).cloned()
    }

    /// Bind a callback symbol used by a class template.
    pub fn bind_template_callback<F>(&mut self, class: &str, symbol: &str, callback: F)
    where
        F: Fn(&mut WidgetTree, WidgetId, WidgetId) + 'static,
    {
        self.class_callbacks
            .entry(class.to_owned())
            .or_default()
            .insert(symbol.to_owned(), Rc::new(callback));
    }

    /// Bind a callback symbol visible to every builder document.
    pub fn add_callback_symbol<F>(&mut self, symbol: &str, callback: F)
    where
        F: Fn(&mut WidgetTree, WidgetId, WidgetId) + 'static,
    {
        self.callbacks.insert(symbol.to_owned(), Rc::new(callback));
    }

    /// Resolve a callback symbol, preferring the template class's own.
    pub fn lookup_callback(&self, class: Option<&str>, symbol: &str) -> Option<TemplateCallback> {
        class
            .and_then(|c| self.class_callbacks.get(c))
            .and_then(|symbols| symbols.get(symbol))
            .or_else(|| self.callbacks.get(symbol))
            .cloned()
    }
}

impl WidgetTree {
    /// Instantiate the class template on a widget.
    ///
    /// On failure every child the template created is destroyed, no
    /// template child is reachable and the error is logged.
    pub fn init_template(&mut self, id: WidgetId) -> Result<(), BuilderError> {
        let Some(type_name) = self.type_name(id) else {
            return Ok(());
        };
        let Some(xml) = self.registry.template(type_name) else {
            let err = BuilderError::NoTemplate(type_name.to_owned());
            tracing::error!(target: targets::BUILDER, widget = type_name, %err, "template initialization failed");
            return Err(err);
        };
        match self.build_template(id, &xml) {
            Ok(children) => {
                tracing::debug!(target: targets::BUILDER, widget = type_name, children, "template initialized");
                Ok(())
            }
            Err(err) => {
                tracing::error!(target: targets::BUILDER, widget = type_name, %err, "template initialization failed");
                if let Some(node) = self.nodes.get_mut(id) {
                    node.template_children.clear();
                }
                Err(err)
            }
        }
    }

    /// A child created by the widget's template, by builder id.
    pub fn template_child(&self, id: WidgetId, name: &str) -> Option<WidgetId> {
        let child = *self.nodes.get(id)?.template_children.get(name)?;
        self.nodes.contains_key(child).then_some(child)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;

    const TOOLBAR: &str = r#"
        <interface>
          <template class="Toolbar" parent="BoxContainer">
            <property name="margin">2</property>
            <child>
              <object class="BoxContainer" id="start">
                <property name="name">start-box</property>
                <signal name="show" handler="start_shown"/>
              </object>
            </child>
            <child>
              <object class="BoxContainer" id="end"/>
            </child>
          </template>
        </interface>
    "#;

    #[derive(Default)]
    struct Toolbar {
        start: Option<WidgetId>,
    }

    impl Widget for Toolbar {
        fn is_container(&self) -> bool {
            true
        }

        fn init(&mut self, tree: &mut WidgetTree, id: WidgetId) {
            if tree.init_template(id).is_ok() {
                self.start = tree.template_child(id, "start");
            }
        }
    }

    fn registry_tree(template: &str) -> (WidgetTree, Rc<RefCell<Vec<(WidgetId, WidgetId)>>>) {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let shown = Rc::new(RefCell::new(Vec::new()));
        let log = shown.clone();
        let registry = tree.registry_mut();
        registry.register::<Toolbar>();
        registry.set_template("Toolbar", template);
        registry.bind_template_callback("Toolbar", "start_shown", move |_, emitter, data| {
            log.borrow_mut().push((emitter, data));
        });
        (tree, shown)
    }

    #[test]
    fn templates_build_children_and_bind_ids() {
        let (mut tree, shown) = registry_tree(TOOLBAR);
        let toolbar = tree.create(Toolbar::default());

        let start = tree.template_child(toolbar, "start").unwrap();
        let end = tree.template_child(toolbar, "end").unwrap();
        assert_eq!(tree.children(toolbar), &[start, end]);
        assert_eq!(tree.class::<Toolbar>(toolbar).unwrap().start, Some(start));
        assert_eq!(tree.name(start), Some("start-box"));
        assert_eq!(tree.margin(toolbar).top, 2);

        tree.show(start);
        assert_eq!(*shown.borrow(), vec![(start, toolbar)]);
    }

    #[test]
    fn failed_templates_leave_no_children() {
        let broken = TOOLBAR.replace("start_shown", "missing_symbol");
        let (mut tree, _) = registry_tree(&broken);
        let toolbar = tree.create(Toolbar::default());

        assert!(tree.template_child(toolbar, "start").is_none());
        assert!(tree.children(toolbar).is_empty());
        assert!(tree.class::<Toolbar>(toolbar).unwrap().start.is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn templates_must_name_their_class() {
        let (mut tree, _) = registry_tree(&TOOLBAR.replace("class=\"Toolbar\"", "class=\"Other\""));
        let toolbar = tree.create(Toolbar::default());
        assert!(matches!(
            tree.init_template(toolbar),
            Err(BuilderError::TemplateMismatch { .. })
        ));

        let window = tree.create(Window::new());
        assert!(matches!(tree.init_template(window), Err(BuilderError::NoTemplate(_))));
    }
}
