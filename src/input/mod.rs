use egui::{Context, Key, Modifiers, PointerButton, Pos2, Rect};

/// Where an input event occurred
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputLocation {
    /// Position relative to the canvas origin (view space)
    pub position: Pos2,
    /// Whether this position is within the canvas bounds
    pub in_canvas: bool,
}

/// Pointer and keyboard input, already mapped to canvas coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown {
        location: InputLocation,
        button: PointerButton,
        modifiers: Modifiers,
        /// Stylus pressure in 0..=1 when the device reports it
        pressure: Option<f32>,
        time_ms: f64,
    },
    PointerMove {
        location: InputLocation,
        modifiers: Modifiers,
        pressure: Option<f32>,
        time_ms: f64,
    },
    PointerUp {
        location: InputLocation,
        button: PointerButton,
        modifiers: Modifiers,
        time_ms: f64,
    },
    DoubleClick {
        location: InputLocation,
        modifiers: Modifiers,
    },
    /// Pointer left the canvas or the window
    PointerLeave {
        last_known_location: InputLocation,
        time_ms: f64,
    },
    KeyDown {
        key: Key,
        modifiers: Modifiers,
    },
    KeyUp {
        key: Key,
        modifiers: Modifiers,
    },
    /// Text typed by the user, after keyboard layout processing
    Text(String),
    /// Wheel or trackpad zoom, as a multiplicative factor
    Zoom { factor: f32 },
}

/// Turns raw egui input into [`InputEvent`]s relative to a canvas rectangle
#[derive(Debug, Default)]
pub struct InputHandler {
    last_pointer_pos: Option<Pos2>,
    pressure: Option<f32>,
}

impl InputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn make_location(canvas: Rect, pos: Pos2) -> InputLocation {
        InputLocation {
            position: (pos - canvas.min).to_pos2(),
            in_canvas: canvas.contains(pos),
        }
    }

    /// Process this frame's egui input
    pub fn process_input(&mut self, ctx: &Context, canvas: Rect) -> Vec<InputEvent> {
        let mut events = Vec::new();

        ctx.input(|input| {
            let time_ms = input.time * 1000.0;
            let modifiers = input.modifiers;

            for event in &input.events {
                match event {
                    egui::Event::Touch { force, .. } => self.pressure = *force,
                    egui::Event::Key { key, pressed, .. } => {
                        let key = *key;
                        events.push(if *pressed {
                            InputEvent::KeyDown { key, modifiers }
                        } else {
                            InputEvent::KeyUp { key, modifiers }
                        });
                    }
                    egui::Event::Text(text) => events.push(InputEvent::Text(text.clone())),
                    _ => {}
                }
            }

            if let Some(pos) = input.pointer.hover_pos() {
                if Some(pos) != self.last_pointer_pos {
                    events.push(InputEvent::PointerMove {
                        location: Self::make_location(canvas, pos),
                        modifiers,
                        pressure: self.pressure,
                        time_ms,
                    });
                }
                self.last_pointer_pos = Some(pos);
            } else if let Some(last) = self.last_pointer_pos.take() {
                events.push(InputEvent::PointerLeave {
                    last_known_location: Self::make_location(canvas, last),
                    time_ms,
                });
            }

            let zoom = input.zoom_delta();
            if zoom != 1.0 {
                events.push(InputEvent::Zoom { factor: zoom });
            }

            let Some(pos) = input.pointer.interact_pos() else {
                return;
            };
            let location = Self::make_location(canvas, pos);
            for button in [PointerButton::Primary, PointerButton::Secondary, PointerButton::Middle] {
                if input.pointer.button_pressed(button) {
                    events.push(InputEvent::PointerDown {
                        location,
                        button,
                        modifiers,
                        pressure: self.pressure,
                        time_ms,
                    });
                }
                if input.pointer.button_released(button) {
                    events.push(InputEvent::PointerUp {
                        location,
                        button,
                        modifiers,
                        time_ms,
                    });
                }
            }
            if input.pointer.button_double_clicked(PointerButton::Primary) {
                events.push(InputEvent::DoubleClick { location, modifiers });
            }
        });

        events
    }
}
