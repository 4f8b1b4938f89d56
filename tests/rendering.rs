use std::rc::Rc;

use eframe_annotate::collaborator::{BlankPages, NoOcr};
use eframe_annotate::element::factory;
use eframe_annotate::renderer::RedrawOutcome;
use eframe_annotate::{EditorConfig, EditorSession};
use egui::{Color32, Rect, pos2, vec2};
use futures::executor::block_on;

fn open_with(pages: usize, config: EditorConfig) -> EditorSession {
    let mut session = EditorSession::new(Rc::new(BlankPages::letter(pages)), Rc::new(NoOcr), config);
    session.load_document("form.pdf", 2048).unwrap();
    session
}

fn open(pages: usize) -> EditorSession {
    open_with(pages, EditorConfig::default())
}

#[test]
fn test_redraw_requests_during_a_pass_coalesce() {
    let mut session = open(1);
    let first = session.request_redraw();
    assert!(session.compositor().is_rendering());
    let second = block_on(session.request_redraw());
    assert_eq!(second, RedrawOutcome::Coalesced);

    assert_eq!(block_on(first), RedrawOutcome::Rendered { passes: 2 });
    assert!(!session.compositor().is_rendering());
    assert!(!session.needs_redraw());
}

#[test]
fn test_flattened_export_contains_layers_but_not_selection() {
    let mut session = open(2);
    let id = session.edit("Add", |scene| {
        let layer = scene.active_layer_id();
        let mut rect = factory::rectangle(1, layer, Rect::from_min_size(pos2(100.0, 100.0), vec2(50.0, 50.0)), Color32::BLACK, 2.0);
        if let eframe_annotate::element::ObjectKind::Rectangle(shape) = &mut rect.kind {
            shape.fill = Some(Color32::RED);
        }
        scene.add_object(rect).unwrap()
    });
    session.edit("Select", |scene| scene.select(&[id]));
    assert!(!session.frame().unwrap().overlay.is_empty());

    let image = block_on(session.flatten_page(1, 1.0).unwrap()).unwrap();
    assert_eq!(image.dimensions(), (612, 792));
    assert_eq!(image.get_pixel(125, 125).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(300, 300).0, [255, 255, 255, 255]);
    // Selection handles sit outside the shape and must not be exported
    assert_eq!(image.get_pixel(96, 96).0, [255, 255, 255, 255]);

    let other = block_on(session.flatten_page(2, 0.5).unwrap()).unwrap();
    assert_eq!(other.dimensions(), (306, 396));
    assert_eq!(other.get_pixel(62, 62).0, [255, 255, 255, 255]);
}

#[test]
fn test_hidden_layers_are_not_exported() {
    let mut session = open(1);
    session.edit("Add", |scene| {
        let layer = scene.active_layer_id();
        let mut rect = factory::rectangle(1, layer, Rect::from_min_size(pos2(10.0, 10.0), vec2(20.0, 20.0)), Color32::BLACK, 1.0);
        if let eframe_annotate::element::ObjectKind::Rectangle(shape) = &mut rect.kind {
            shape.fill = Some(Color32::BLUE);
        }
        scene.add_object(rect).unwrap();
        scene.set_layer_visible(layer, false).unwrap();
    });
    let image = block_on(session.flatten_page(1, 1.0).unwrap()).unwrap();
    assert_eq!(image.get_pixel(20, 20).0, [255, 255, 255, 255]);
}

#[test]
fn test_thumbnail_cache_keeps_most_recent_pages() {
    let config = EditorConfig {
        thumbnail_capacity: 2,
        ..EditorConfig::default()
    };
    let mut session = open_with(3, config);
    for page in 1..=3 {
        let work = session.request_thumbnail(page).unwrap();
        session.complete(block_on(work));
    }
    assert!(session.thumbnail(1).is_none());
    assert!(session.thumbnail(2).is_some());
    assert!(session.thumbnail(3).is_some());
}

#[test]
fn test_thumbnail_goes_stale_on_content_edit_only() {
    let mut session = open(2);
    let work = session.request_thumbnail(1).unwrap();
    session.complete(block_on(work));
    assert!(session.thumbnail(1).is_some());

    session.set_zoom(2.5);
    session.go_to_page(2);
    assert!(session.thumbnail(1).is_some());

    session.edit("Add", |scene| {
        let layer = scene.active_layer_id();
        scene
            .add_object(factory::rectangle(1, layer, Rect::from_min_size(pos2(5.0, 5.0), vec2(20.0, 20.0)), Color32::BLACK, 1.0))
            .unwrap();
    });
    assert!(session.thumbnail(1).is_none());
}

#[test]
fn test_render_started_before_an_edit_is_discarded() {
    let mut session = open(1);
    let work = session.request_thumbnail(1).unwrap();
    session.edit("Background", |scene| scene.set_page_background(1, Some(Color32::LIGHT_GRAY)).unwrap());
    session.complete(block_on(work));
    assert!(session.thumbnail(1).is_none());
}
