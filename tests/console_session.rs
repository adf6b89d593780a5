// tests/console_session.rs
use std::time::{Duration, Instant};
use tiny_skia::Pixmap;
use toroid_turtle::{CanvasConfig, PixmapSurface, RecordingSurface, Session, TurtleError};

fn config() -> CanvasConfig {
    CanvasConfig {
        width: 120,
        height: 80,
        seed: Some(42),
        ..Default::default()
    }
}

fn pixmap_session() -> Session<PixmapSurface> {
    let config = config();
    let surface = PixmapSurface::new(config.width, config.height).unwrap();
    Session::new(surface, config).unwrap()
}

fn painted(png: &[u8]) -> (u32, u32, usize) {
    let pixmap = Pixmap::decode_png(png).unwrap();
    let count = pixmap.pixels().iter().filter(|p| p.alpha() > 0).count();
    (pixmap.width(), pixmap.height(), count)
}

#[test]
fn test_script_draws_onto_the_raster() {
    let mut s = pixmap_session();
    s.submit("width 3 repeat 4 [ forward 30 right 90 ]").unwrap();

    let (w, h, count) = painted(&s.export_png().unwrap());
    assert_eq!((w, h), (120, 80));
    assert!(count > 0);
}

#[test]
fn test_wrapped_stroke_shows_up_on_both_sides() {
    let mut s = pixmap_session();
    s.submit("width 2 forward 60").unwrap();

    let pixmap = Pixmap::decode_png(&s.export_png().unwrap()).unwrap();
    // Turtle-space x = 0 is raster column 60. The stroke runs from the center to
    // the top edge, then from the bottom edge back up 20 units.
    let alpha = |y: u32| pixmap.pixel(60, y).map(|p| p.alpha()).unwrap_or(0);
    assert!(alpha(10) > 0, "upper half drawn");
    assert!(alpha(75) > 0, "re-entry at the bottom drawn");
    assert_eq!(alpha(55), 0, "lower half between the pieces left empty");
}

#[test]
fn test_cursor_reaches_the_frame_but_not_the_drawing() {
    let mut s = pixmap_session();
    s.submit("pu forward 5").unwrap();

    let (_, _, drawing) = painted(&s.export_png().unwrap());
    let (_, _, frame) = painted(&s.export_frame_png().unwrap());
    assert_eq!(drawing, 0);
    assert!(frame > 0);

    s.submit("hide").unwrap();
    let (_, _, frame) = painted(&s.export_frame_png().unwrap());
    assert_eq!(frame, 0);
}

#[test]
fn test_high_res_export_is_scaled() {
    let mut s = pixmap_session();
    s.submit("repeat 3 [ forward random(20, 50) right 120 ]").unwrap();

    let (w, h, count) = painted(&s.export_high_res(3).unwrap());
    assert_eq!((w, h), (360, 240));
    assert!(count > 0);

    let (w, h, _) = painted(&s.export_png().unwrap());
    assert_eq!((w, h), (120, 80));
}

#[test]
fn test_recording_export_matches_dimensions() {
    let config = config();
    let mut s = Session::new(RecordingSurface::new(1, 1), config).unwrap();
    assert_eq!(s.engine().size(), (120, 80));
    s.submit("forward 10").unwrap();
    let (w, h, count) = painted(&s.export_png().unwrap());
    assert_eq!((w, h), (120, 80));
    assert!(count > 0);
}

#[test]
fn test_animations_tick_and_stop_on_failure() {
    let mut s = pixmap_session();
    let handles = s.submit("animate 10 [ forward 1 ]").unwrap();
    assert_eq!(handles.len(), 1);

    let later = Instant::now() + Duration::from_millis(50);
    let report = s.tick(later);
    assert_eq!(report.ran, 1);
    assert!((s.engine().position().y - 1.0).abs() < 1e-9);

    // Ticking again at the same instant is not due yet.
    assert_eq!(s.tick(later).ran, 0);

    let bad = s.submit("animate 10 [ forward 1 missing ]").unwrap();
    let report = s.tick(later + Duration::from_millis(50));
    assert_eq!(report.ran, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, bad[0]);
    assert!(matches!(
        report.failed[0].1,
        TurtleError::UnknownProcedure(_)
    ));
    assert_eq!(s.engine().animations(), handles);
    // The failing animation's own forward was rolled back.
    assert!((s.engine().position().y - 2.0).abs() < 1e-9);
}

#[test]
fn test_invalid_values_are_reported_not_drawn() {
    let mut s = pixmap_session();
    assert!(matches!(
        s.submit("width 0"),
        Err(TurtleError::InvalidWidth(_))
    ));
    assert!(matches!(
        s.submit("forward 1 / 0"),
        Err(TurtleError::NonFinite { .. })
    ));
    let (_, _, count) = painted(&s.export_png().unwrap());
    assert_eq!(count, 0);
    assert!(s.history().is_empty());
}
