// tests/toroidal_motion.rs
use glam::DVec2;
use proptest::prelude::*;
use toroid_turtle::geometry::{turtle_to_raster, upright_text_transform};
use toroid_turtle::motion::{StepKind, try_advance};
use toroid_turtle::{
    Bounds, CanvasConfig, Edge, RecordingSurface, SurfaceOp, TurtleEngine, trace_forward,
};

fn engine(width: u32, height: u32) -> TurtleEngine<RecordingSurface> {
    let config = CanvasConfig {
        width,
        height,
        seed: Some(1),
        ..Default::default()
    };
    TurtleEngine::new(RecordingSurface::new(width, height), &config).unwrap()
}

fn close(a: DVec2, b: DVec2) -> bool {
    (a - b).length() < 1e-9
}

#[test]
fn test_forward_past_the_top_reenters_from_the_bottom() {
    let mut t = engine(300, 300);
    t.forward(200.0).unwrap();

    // 150 units up to the top edge, the remaining 50 from the bottom edge.
    let strokes = t.surface().strokes();
    assert_eq!(strokes.len(), 1);
    let segments = strokes[0];
    assert_eq!(segments.len(), 2);
    assert!(close(segments[0].start, DVec2::new(0.0, 0.0)));
    assert!(close(segments[0].end, DVec2::new(0.0, 150.0)));
    assert!(close(segments[1].start, DVec2::new(0.0, -150.0)));
    assert!(close(segments[1].end, DVec2::new(0.0, -100.0)));
    assert!(close(t.position(), DVec2::new(0.0, -100.0)));
}

#[test]
fn test_crossing_close_to_the_edge_still_wraps() {
    let mut t = engine(300, 300);
    t.goto(149.0, 0.0).unwrap();
    t.set_heading(90.0).unwrap();
    t.forward(50.0).unwrap();

    let strokes = t.surface().strokes();
    let segments = strokes.last().unwrap();
    assert_eq!(segments.len(), 2);
    assert!(close(segments[0].end, DVec2::new(150.0, 0.0)));
    assert!(close(segments[1].start, DVec2::new(-150.0, 0.0)));
    assert!(close(t.position(), DVec2::new(-101.0, 0.0)));
}

#[test]
fn test_exact_corner_exit_prefers_the_right_edge() {
    let mut t = engine(300, 300);
    t.goto(100.0, 100.0).unwrap();
    t.set_heading(45.0).unwrap();
    t.forward(100.0).unwrap();

    let strokes = t.surface().strokes();
    let segments = strokes.last().unwrap();
    assert!(close(segments[0].end, DVec2::new(150.0, 150.0)));
    // Right is tested before Top, so the turtle re-enters on the left.
    assert!(close(segments[1].start, DVec2::new(-150.0, 150.0)));
    let drawn: f64 = segments.iter().map(|s| s.length()).sum();
    assert!((drawn - 100.0).abs() < 1e-9);
}

#[test]
fn test_corner_crossings_are_deterministic() {
    let bounds = Bounds::centered(300.0, 300.0);
    let heading = 45f64.to_radians();
    let distance = 150.0 * 2f64.sqrt() + 10.0;

    let step = try_advance(DVec2::ZERO, heading, distance, &bounds, true);
    assert!(matches!(step.kind, StepKind::Wrapped(Edge::Right | Edge::Top)));

    let a = trace_forward(DVec2::ZERO, heading, distance, &bounds, true).unwrap();
    let b = trace_forward(DVec2::ZERO, heading, distance, &bounds, true).unwrap();
    assert_eq!(a, b);
    assert!(a.end.is_finite());
    assert!((a.length() - distance).abs() < 1e-6);
}

#[test]
fn test_reset_is_idempotent() {
    let mut t = engine(200, 120);
    t.set_color(10.0, 20.0, 30.0, 0.5).unwrap();
    t.set_width(4.0).unwrap();
    t.forward(500.0).unwrap();
    t.turn_right(90.0).unwrap();

    t.reset();
    let once = t.state().clone();
    let ops_once = t.surface().drawing_ops().to_vec();
    t.reset();
    assert_eq!(t.state(), &once);
    assert_eq!(t.surface().drawing_ops(), ops_once.as_slice());
    assert!(t.surface().strokes().is_empty());
    assert_eq!(t.position(), DVec2::ZERO);
}

#[test]
fn test_text_is_stamped_upright_at_the_turtle() {
    let mut t = engine(300, 300);
    t.goto(20.0, 30.0).unwrap();
    t.turn_right(137.0).unwrap();
    t.write("hi");

    let Some(SurfaceOp::Text {
        anchor, transform, ..
    }) = t
        .surface()
        .drawing_ops()
        .iter()
        .find(|op| matches!(op, SurfaceOp::Text { .. }))
    else {
        panic!("no text drawn");
    };
    assert!(close(*anchor, DVec2::new(20.0, 30.0)));
    assert_eq!(*transform, upright_text_transform(*anchor));

    // Glyph offsets (Y down) land as-is on the raster next to the anchor.
    let display = turtle_to_raster(300.0, 300.0) * *transform;
    let on_screen = display.transform_point2(*anchor + DVec2::new(4.0, 6.0));
    assert!(close(on_screen, DVec2::new(150.0 + 20.0 + 4.0, 150.0 - 30.0 + 6.0)));
}

proptest! {
    #[test]
    fn test_wrapped_moves_conserve_distance(
        x in -149.0f64..149.0,
        y in -99.0f64..99.0,
        heading in 0.0f64..360.0,
        distance in 0.1f64..5000.0,
    ) {
        let bounds = Bounds::centered(300.0, 200.0);
        let path = trace_forward(DVec2::new(x, y), heading.to_radians(), distance, &bounds, true)
            .unwrap();
        prop_assert!(path.end.is_finite());
        prop_assert!((path.length() - distance).abs() < 1e-6 * distance.max(1.0));
    }

    #[test]
    fn test_unwrapped_moves_go_straight(
        x in -500.0f64..500.0,
        y in -500.0f64..500.0,
        heading in -720.0f64..720.0,
        distance in 0.1f64..2000.0,
    ) {
        let mut t = engine(300, 300);
        t.set_wrap(false);
        t.goto(x, y).unwrap();
        t.set_heading(heading).unwrap();
        t.forward(distance).unwrap();

        let rad = heading.to_radians();
        let expected = DVec2::new(x, y) + DVec2::new(rad.sin(), rad.cos()) * distance;
        prop_assert!((t.position() - expected).length() < 1e-6);
        prop_assert_eq!(t.surface().strokes().last().map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_goto_lands_inside_the_canvas(
        x in -10_000.0f64..10_000.0,
        y in -10_000.0f64..10_000.0,
    ) {
        let mut t = engine(300, 200);
        t.goto(x, y).unwrap();
        let p = t.position();
        prop_assert!((-150.0..150.0).contains(&p.x), "x = {}", p.x);
        prop_assert!((-100.0..100.0).contains(&p.y), "y = {}", p.y);
    }

    #[test]
    fn test_non_positive_distance_is_a_no_op(distance in -1000.0f64..=0.0) {
        let mut t = engine(300, 300);
        t.forward(distance).unwrap();
        prop_assert_eq!(t.position(), DVec2::ZERO);
        prop_assert!(t.surface().strokes().is_empty());
    }
}
