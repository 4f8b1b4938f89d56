#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use std::rc::Rc;

use eframe_annotate::collaborator::{BlankPages, NoOcr};
use eframe_annotate::{AnnotatorApp, EditorConfig};

const DEMO_PAGES: usize = 3;

// When compiling natively:
#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let config = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path).map_err(|e| e.to_string()).and_then(|json| {
            EditorConfig::from_json(&json).map_err(|e| e.to_string())
        }) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Ignoring config {}: {}", path, e);
                EditorConfig::default()
            }
        },
        None => EditorConfig::default(),
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "annotate-demo",
        native_options,
        Box::new(move |cc| {
            let rasterizer = Rc::new(BlankPages::letter(DEMO_PAGES));
            let byte_size = DEMO_PAGES as u64 * 1024;
            Ok(Box::new(AnnotatorApp::new(
                cc,
                rasterizer,
                Rc::new(NoOcr),
                config,
                "demo.pdf",
                byte_size,
            )))
        }),
    )
}

// The library is embedded by web hosts directly; the demo binary is native only.
#[cfg(target_arch = "wasm32")]
fn main() {}
