//! Building widget trees from XML.
//!
//! The reader streams start, text and end events; objects are created as
//! their `<object>` element opens and added to their container when it
//! closes. Custom tags are handed to a [`CustomTagParser`], and data that
//! needs the complete tree is resolved after the last element.

use std::collections::HashMap;
use std::rc::Rc;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use trellis_core::ConnectionId;
use trellis_core::logging::targets;

use super::buildable::{CustomTag, CustomTagParser};
use super::{WidgetId, WidgetTree};
use crate::error::BuilderError;

/// Objects created from an interface document.
#[derive(Debug, Clone, Default)]
pub struct BuilderObjects {
    objects: HashMap<String, WidgetId>,
    roots: Vec<WidgetId>,
}

impl BuilderObjects {
    /// The object declared with a builder id.
    pub fn get(&self, id: &str) -> Option<WidgetId> {
        self.objects.get(id).copied()
    }

    /// Top-level objects in document order.
    pub fn roots(&self) -> &[WidgetId] {
        &self.roots
    }

    /// Number of objects with an id.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no object has an id.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

enum Frame {
    Interface,
    Object(WidgetId),
    Child { parent: WidgetId, internal: Option<String> },
    Property { object: WidgetId, name: String, text: String },
    Custom { object: WidgetId, parser: CustomTagParser },
    Ignored,
}

/// Where the next element opens.
enum Context {
    Document,
    Interface,
    Object(WidgetId),
    Child(WidgetId, Option<String>),
}

struct BuildState {
    /// Template instance and its class name.
    instance: Option<(WidgetId, &'static str)>,
    stack: Vec<Frame>,
    objects: HashMap<String, WidgetId>,
    roots: Vec<WidgetId>,
    created: Vec<WidgetId>,
}

fn attributes(start: &BytesStart<'_>) -> Result<HashMap<String, String>, BuilderError> {
    let mut attrs = HashMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn required(element: &str, attrs: &HashMap<String, String>, attribute: &'static str) -> Result<String, BuilderError> {
    attrs
        .get(attribute)
        .cloned()
        .ok_or_else(|| BuilderError::MissingAttribute {
            element: element.to_owned(),
            attribute,
        })
}

/// Connect a handler that only needs the emitter to a signal by name.
macro_rules! connect_named {
    ($signals:expr, $name:expr, $handler:expr, [$($signal:literal => $field:ident),* $(,)?]) => {
        match $name {
            $($signal => {
                let handler = $handler.clone();
                Some($signals.$field.connect(move |tree, args| handler(tree, args.0)))
            })*
            _ => None,
        }
    };
}

impl WidgetTree {
    /// Create the objects of an `<interface>` document.
    ///
    /// On failure every object created so far is destroyed.
    pub fn build_from_str(&mut self, xml: &str) -> Result<BuilderObjects, BuilderError> {
        let mut state = BuildState {
            instance: None,
            stack: Vec::new(),
            objects: HashMap::new(),
            roots: Vec::new(),
            created: Vec::new(),
        };
        match self.run_builder(xml, &mut state) {
            Ok(()) => Ok(BuilderObjects {
                objects: state.objects,
                roots: state.roots,
            }),
            Err(err) => {
                tracing::error!(target: targets::BUILDER, %err, "building interface failed");
                self.destroy_created(&state.created);
                Err(err)
            }
        }
    }

    /// Build a template onto `instance`, returning how many objects it
    /// created.
    pub(crate) fn build_template(&mut self, instance: WidgetId, xml: &str) -> Result<usize, BuilderError> {
        let type_name = self.type_name(instance).ok_or(BuilderError::UnknownObject(String::from("template instance")))?;
        let mut state = BuildState {
            instance: Some((instance, type_name)),
            stack: Vec::new(),
            objects: HashMap::new(),
            roots: Vec::new(),
            created: Vec::new(),
        };
        match self.run_builder(xml, &mut state) {
            Ok(()) => Ok(state.created.len()),
            Err(err) => {
                self.destroy_created(&state.created);
                Err(err)
            }
        }
    }

    fn destroy_created(&mut self, created: &[WidgetId]) {
        for id in created.iter().rev() {
            if self.contains(*id) {
                self.destroy(*id);
            }
        }
    }

    fn run_builder(&mut self, xml: &str, state: &mut BuildState) -> Result<(), BuilderError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    let attrs = attributes(&start)?;
                    self.builder_start(state, &name, &attrs)?;
                }
                Event::Empty(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    let attrs = attributes(&start)?;
                    self.builder_start(state, &name, &attrs)?;
                    self.builder_end(state, &name)?;
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    self.builder_end(state, &name)?;
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    builder_text(state, &text);
                }
                Event::CData(data) => {
                    builder_text(state, &String::from_utf8_lossy(&data));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let mut finished = state.created.clone();
        if let Some((instance, _)) = state.instance {
            finished.push(instance);
        }
        for id in finished {
            self.buildable_parser_finished(id, &state.objects)?;
        }
        Ok(())
    }

    fn builder_start(
        &mut self,
        state: &mut BuildState,
        element: &str,
        attrs: &HashMap<String, String>,
    ) -> Result<(), BuilderError> {
        if let Some(Frame::Custom { parser, .. }) = state.stack.last_mut() {
            return parser.start_element(element, attrs);
        }
        let unexpected = || BuilderError::UnexpectedElement(element.to_owned());
        let context = match state.stack.last() {
            None => Context::Document,
            Some(Frame::Interface) => Context::Interface,
            Some(Frame::Object(object)) => Context::Object(*object),
            Some(Frame::Child { parent, internal }) => Context::Child(*parent, internal.clone()),
            Some(_) => return Err(unexpected()),
        };
        let frame = match (context, element) {
            (Context::Document, "interface") => Frame::Interface,
            (Context::Interface, "object") => Frame::Object(self.builder_object(state, element, attrs)?),
            (Context::Interface, "template") => {
                let (instance, type_name) = state.instance.ok_or_else(unexpected)?;
                let class = required(element, attrs, "class")?;
                if class != type_name {
                    return Err(BuilderError::TemplateMismatch {
                        expected: type_name.to_owned(),
                        found: class,
                    });
                }
                Frame::Object(instance)
            }
            (Context::Interface, "requires") => Frame::Ignored,
            (Context::Object(object), "property") => Frame::Property {
                object,
                name: required(element, attrs, "name")?,
                text: String::new(),
            },
            (Context::Object(object), "signal") => {
                self.builder_signal(state, object, attrs)?;
                Frame::Ignored
            }
            (Context::Object(object), "child") => Frame::Child {
                parent: object,
                internal: attrs.get("internal-child").cloned(),
            },
            (Context::Object(object), _) => {
                let tag = CustomTag::from_element(element).ok_or_else(unexpected)?;
                let mut parser = CustomTagParser::new(tag);
                parser.start_element(element, attrs)?;
                Frame::Custom { object, parser }
            }
            (Context::Child(parent, Some(name)), "object") => {
                let child = self
                    .template_child(parent, &name)
                    .ok_or(BuilderError::UnknownObject(name))?;
                if let Some(id) = attrs.get("id") {
                    state.objects.insert(id.clone(), child);
                }
                Frame::Object(child)
            }
            (Context::Child(_, None), "object") => Frame::Object(self.builder_object(state, element, attrs)?),
            (Context::Child(..), "placeholder") => Frame::Ignored,
            _ => return Err(unexpected()),
        };
        state.stack.push(frame);
        Ok(())
    }

    fn builder_object(
        &mut self,
        state: &mut BuildState,
        element: &str,
        attrs: &HashMap<String, String>,
    ) -> Result<WidgetId, BuilderError> {
        let class_name = required(element, attrs, "class")?;
        let class = self
            .registry
            .create(&class_name)
            .ok_or_else(|| BuilderError::UnknownClass(class_name.clone()))?;
        let id = self.create_boxed(class);
        state.created.push(id);
        tracing::trace!(target: targets::BUILDER, class = class_name.as_str(), ?id, "object created");
        if let Some(builder_id) = attrs.get("id") {
            state.objects.insert(builder_id.clone(), id);
            if let Some((instance, _)) = state.instance {
                if let Some(node) = self.nodes.get_mut(instance) {
                    node.template_children.insert(builder_id.clone(), id);
                }
            }
        }
        Ok(id)
    }

    fn builder_signal(
        &mut self,
        state: &BuildState,
        object: WidgetId,
        attrs: &HashMap<String, String>,
    ) -> Result<(), BuilderError> {
        let signal = required("signal", attrs, "name")?;
        let symbol = required("signal", attrs, "handler")?;
        let class = state.instance.map(|(_, type_name)| type_name);
        let callback = self
            .registry
            .lookup_callback(class, &symbol)
            .ok_or_else(|| BuilderError::UnknownCallback(symbol.clone()))?;
        let data = match attrs.get("object") {
            Some(name) => state
                .objects
                .get(name)
                .copied()
                .ok_or_else(|| BuilderError::UnknownObject(name.clone()))?,
            None => state.instance.map_or(object, |(instance, _)| instance),
        };
        let handler: Rc<dyn Fn(&mut WidgetTree, WidgetId)> =
            Rc::new(move |tree, emitter| callback(tree, emitter, data));
        self.connect_signal_by_name(object, &signal, handler)
            .map(|_| ())
            .ok_or(BuilderError::UnknownSignal(signal))
    }

    /// Connect a handler receiving only the emitter to a widget signal by
    /// its builder name, such as `show` or `size-allocate`.
    pub fn connect_signal_by_name(
        &mut self,
        id: WidgetId,
        signal: &str,
        handler: Rc<dyn Fn(&mut WidgetTree, WidgetId)>,
    ) -> Option<ConnectionId> {
        let signals = self.signals_mut(id)?;
        connect_named!(signals, signal, handler, [
            "show" => show,
            "hide" => hide,
            "map" => map,
            "unmap" => unmap,
            "realize" => realize,
            "unrealize" => unrealize,
            "destroy" => destroy,
            "finalize" => finalize,
            "parent-set" => parent_set,
            "hierarchy-changed" => hierarchy_changed,
            "size-allocate" => size_allocate,
            "state-flags-changed" => state_flags_changed,
            "direction-changed" => direction_changed,
            "notify" => notify,
            "style-updated" => style_updated,
            "event-after" => event_after,
            "accel-activated" => accel_activated,
            "grab-notify" => grab_notify,
        ])
    }

    fn builder_end(&mut self, state: &mut BuildState, element: &str) -> Result<(), BuilderError> {
        if let Some(Frame::Custom { parser, .. }) = state.stack.last_mut() {
            parser.end_element(element)?;
            if !parser.is_done() {
                return Ok(());
            }
        }
        let Some(frame) = state.stack.pop() else {
            return Err(BuilderError::UnexpectedElement(format!("/{element}")));
        };
        match frame {
            Frame::Property { object, name, text } => {
                self.set_property_from_str(object, &name, &text)?;
            }
            Frame::Object(object) => match state.stack.last() {
                Some(Frame::Child { parent, internal: None }) => {
                    self.try_container_add(*parent, object)?;
                }
                Some(Frame::Interface) if state.instance.is_none() => state.roots.push(object),
                _ => {}
            },
            Frame::Custom { object, parser } => self.buildable_custom_finished(object, parser),
            Frame::Interface | Frame::Child { .. } | Frame::Ignored => {}
        }
        Ok(())
    }
}

fn builder_text(state: &mut BuildState, text: &str) {
    match state.stack.last_mut() {
        Some(Frame::Property { text: buffer, .. }) => buffer.push_str(text),
        Some(Frame::Custom { parser, .. }) => parser.text(text),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::accel::parse_accelerator;
    use crate::widget::accessibility::AccessibleRelation;
    use crate::widget::events::Event;
    use crate::widget::flags::ModifierType;

    const DIALOG: &str = r#"
        <interface>
          <object class="Window" id="window1">
            <child>
              <object class="BoxContainer" id="vbox1">
                <property name="orientation">vertical</property>
                <property name="spacing">6</property>
                <child>
                  <object class="BoxContainer" id="label1">
                    <accessibility>
                      <relation target="button1" type="label-for"/>
                    </accessibility>
                  </object>
                </child>
                <child>
                  <object class="BoxContainer" id="button1">
                    <property name="tooltip-text">Close &amp; quit</property>
                    <accelerator key="q" modifiers="CONTROL_MASK" signal="activate"/>
                    <style>
                      <class name="destructive"/>
                    </style>
                    <accessibility>
                      <action action_name="click" description="Sliff"/>
                    </accessibility>
                  </object>
                </child>
              </object>
            </child>
          </object>
        </interface>
    "#;

    fn tree() -> WidgetTree {
        WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default())
    }

    #[test]
    fn interfaces_build_the_whole_tree() {
        let mut tree = tree();
        let objects = tree.build_from_str(DIALOG).unwrap();
        let window = objects.get("window1").unwrap();
        let vbox = objects.get("vbox1").unwrap();
        let label = objects.get("label1").unwrap();
        let button = objects.get("button1").unwrap();

        assert_eq!(objects.roots(), &[window]);
        assert_eq!(tree.children(window), &[vbox]);
        assert_eq!(tree.children(vbox), &[label, button]);
        assert_eq!(tree.tooltip_text(button), Some("Close & quit"));
        assert!(tree.has_style_class(button, "destructive"));

        let key = parse_accelerator("<Control>q").unwrap();
        assert_eq!(tree.list_accelerators(button), vec![key]);
        assert!(tree.buildable_data(button).is_none());

        let relations = tree.accessible(label).unwrap().relations().to_vec();
        assert_eq!(relations, vec![(AccessibleRelation::LabelFor, button)]);
        let actions = tree.accessible(button).unwrap().actions().to_vec();
        assert_eq!(actions[0].name, "click");
        assert_eq!(actions[0].description.as_deref(), Some("Sliff"));
    }

    #[test]
    fn built_accelerators_fire() {
        let mut tree = tree();
        let objects = tree.build_from_str(DIALOG).unwrap();
        let window = objects.get("window1").unwrap();
        let button = objects.get("button1").unwrap();
        tree.show_all(window);

        let fired = Rc::new(Cell::new(0));
        let count = fired.clone();
        let handler: Rc<dyn Fn(&mut WidgetTree, WidgetId)> = Rc::new(move |_, _| count.set(count.get() + 1));
        tree.connect_signal_by_name(button, "accel-activated", handler).unwrap();

        let native = tree.window(window).unwrap();
        tree.dispatch_event(&Event::key_press(u32::from('q'), ModifierType::CONTROL).with_window(native));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn failures_destroy_what_was_built() {
        let mut tree = tree();
        let broken = DIALOG.replace("target=\"button1\"", "target=\"nobody\"");
        assert!(matches!(tree.build_from_str(&broken), Err(BuilderError::UnknownObject(_))));
        assert!(tree.is_empty());

        assert!(matches!(
            tree.build_from_str(r#"<interface><object class="Gizmo"/></interface>"#),
            Err(BuilderError::UnknownClass(_))
        ));
        assert!(matches!(
            tree.build_from_str(r#"<interface><object class="Window"><widget/></object></interface>"#),
            Err(BuilderError::UnexpectedElement(_))
        ));
        assert!(matches!(
            tree.build_from_str(r#"<interface><object class="Window"><property name="visible">perhaps</property></object></interface>"#),
            Err(BuilderError::Widget(_))
        ));
        assert!(tree.is_empty());
    }
}
