//! Building an interface from XML and driving it through frames and input
//! the way an application would.

use std::cell::Cell;
use std::rc::Rc;

use trellis::display::DrawOp;
use trellis::prelude::*;
use trellis::widget::{GestureNotify, PaintContext, WidgetFlags};

const SWATCH_COLOR: u32 = 0x3366_ccff;

/// Fills its allocation with one color.
#[derive(Default)]
struct Swatch;

impl Widget for Swatch {
    fn type_name(&self) -> &'static str {
        "Swatch"
    }

    fn measure(&mut self, _: &mut WidgetTree, _: WidgetId, _: Orientation, _: i32) -> Measurement {
        Measurement::new(20, 40)
    }

    fn draw(&mut self, _: &WidgetTree, _: WidgetId, cx: &mut PaintContext<'_>) -> Propagation {
        let rect = cx.rect();
        cx.cr().fill_rect(rect, SWATCH_COLOR);
        Propagation::Proceed
    }
}

const PREFERENCES: &str = r#"
    <interface>
      <object class="Window" id="preferences">
        <property name="title">Preferences</property>
        <property name="default-width">300</property>
        <child>
          <object class="BoxContainer" id="rows">
            <property name="orientation">vertical</property>
            <property name="spacing">4</property>
            <child>
              <object class="Swatch" id="top"/>
            </child>
            <child>
              <object class="BoxContainer" id="buttons">
                <property name="halign">end</property>
                <child>
                  <object class="Swatch" id="cancel"/>
                </child>
                <child>
                  <object class="Swatch" id="ok">
                    <property name="margin-start">6</property>
                  </object>
                </child>
              </object>
            </child>
          </object>
        </child>
      </object>
    </interface>
"#;

struct App {
    tree: WidgetTree,
    display: HeadlessDisplay,
    window: WidgetId,
}

impl App {
    fn build() -> (Self, trellis::widget::BuilderObjects) {
        let display = HeadlessDisplay::new();
        let mut tree = WidgetTree::new(Box::new(display.clone()), Settings::default());
        tree.registry_mut().register::<Swatch>();
        let objects = tree.build_from_str(PREFERENCES).unwrap();
        let window = objects.get("preferences").unwrap();
        tree.show_all(window);
        (
            Self {
                tree,
                display,
                window,
            },
            objects,
        )
    }

    fn frame(&mut self, time_us: i64) {
        let clock = self.tree.frame_clock(self.window).unwrap();
        self.tree.run_frame(clock, time_us);
    }
}

#[test]
fn built_interfaces_lay_out_and_paint() {
    let (mut app, objects) = App::build();
    let tree = &app.tree;
    let rows = objects.get("rows").unwrap();
    let buttons = objects.get("buttons").unwrap();
    let top = objects.get("top").unwrap();
    let cancel = objects.get("cancel").unwrap();
    let ok = objects.get("ok").unwrap();

    // 300 wide by default, natural height: 40 + 4 + 40
    assert_eq!(tree.allocation(app.window), Rect::new(0, 0, 300, 84));
    assert_eq!(tree.allocation(rows), Rect::new(0, 0, 300, 84));
    assert_eq!(tree.allocation(top), Rect::new(0, 0, 300, 40));
    // right aligned at natural width: 40 + 6 + 40
    assert_eq!(tree.allocation(buttons), Rect::new(214, 44, 86, 40));
    assert_eq!(tree.allocation(cancel), Rect::new(214, 44, 40, 40));
    assert_eq!(tree.allocation(ok), Rect::new(260, 44, 40, 40));
    assert_eq!(tree.check_invariants(), Vec::new());

    let native = tree.window(app.window).unwrap();
    let recorded = app.display.window(native).unwrap();
    assert_eq!(recorded.title.as_deref(), Some("Preferences"));
    assert!(recorded.visible);

    app.display.clear_log();
    app.tree.queue_draw(app.window);
    app.frame(16_000);
    let fills = app
        .display
        .paints()
        .iter()
        .flat_map(|p| p.ops.clone())
        .filter(|op| matches!(op, DrawOp::Fill(_, SWATCH_COLOR)))
        .count();
    assert_eq!(fills, 3);
}

#[test]
fn right_to_left_mirrors_the_button_row() {
    let (mut app, objects) = App::build();
    let cancel = objects.get("cancel").unwrap();
    let buttons = objects.get("buttons").unwrap();

    app.tree.set_default_direction(LayoutDirection::Rtl);
    app.frame(16_000);

    assert_eq!(app.tree.resolved_direction(cancel), TextDirection::Rtl);
    // end alignment flips to the left edge, and the first child to the right
    assert_eq!(app.tree.allocation(buttons), Rect::new(0, 44, 86, 40));
    assert_eq!(app.tree.allocation(cancel), Rect::new(46, 44, 40, 40));
}

#[test]
fn mouse_drags_are_reported_with_offsets() {
    let (mut app, objects) = App::build();
    let top = objects.get("top").unwrap();
    let drag = app
        .tree
        .add_controller(top, GestureDrag::new(), PropagationPhase::Bubble)
        .unwrap();
    let last_offset = Rc::new(Cell::new((0.0, 0.0)));
    let offset = last_offset.clone();
    app.tree
        .controller_signals_mut(drag)
        .unwrap()
        .notify
        .connect(move |_, (_, notify)| {
            if let GestureNotify::DragUpdate { dx, dy } = notify {
                offset.set((*dx, *dy));
            }
        });

    let native = app.tree.window(app.window).unwrap();
    app.tree
        .dispatch_event(&Event::button_press(10.0, 10.0, 1).with_window(native));
    app.tree.dispatch_event(&Event::motion(30.0, 15.0).with_window(native));
    assert_eq!(last_offset.get(), (20.0, 5.0));
    assert_eq!(
        app.tree.sequence_state(drag, EventSequence::Pointer),
        SequenceState::Claimed
    );

    app.tree
        .dispatch_event(&Event::button_release(30.0, 15.0, 1).with_window(native));
    assert!(!app.tree.handles_sequence(drag, EventSequence::Pointer));
}

#[test]
fn closing_the_window_destroys_everything() {
    let (mut app, objects) = App::build();
    let ok = objects.get("ok").unwrap();
    let native = app.tree.window(app.window).unwrap();

    app.tree.destroy(app.window);
    assert!(app.tree.is_empty());
    assert!(!app.tree.contains(ok));
    assert!(!app.display.contains(native));
    assert_eq!(app.display.window_count(), 0);
}

#[test]
fn hidden_rows_give_their_space_back() {
    let (mut app, objects) = App::build();
    let top = objects.get("top").unwrap();
    let buttons = objects.get("buttons").unwrap();

    app.tree.hide(top);
    app.frame(16_000);
    assert!(!app.tree.is_mapped(top));
    assert_eq!(app.tree.allocation(app.window), Rect::new(0, 0, 300, 40));
    assert_eq!(app.tree.allocation(buttons), Rect::new(214, 0, 86, 40));
    assert!(
        !app.tree
            .flags(buttons)
            .unwrap()
            .contains(WidgetFlags::ALLOC_NEEDED)
    );
}
