/// Segment planner properties: ray conservation, gap-free tiling of the
/// screen and the corner-reachability bounds for off-screen vanishing points.
use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use voxel_raycaster::camera::{Camera, CameraFrame};
use voxel_raycaster::rendering::{RayBuffer, SegmentKind, SegmentPlan};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 200;

fn plan_for(vp: Vec2) -> SegmentPlan {
    let mut frame = CameraFrame::compute(&Camera::new(Vec3::ZERO), (WIDTH, HEIGHT), 1000.0, &[]);
    frame.vanishing_point = vp;
    SegmentPlan::compute(&frame)
}

fn assert_close(actual: f32, expected: f32, what: &str) {
    assert!((actual - expected).abs() < 0.05, "{what}: expected {expected}, got {actual}");
}

#[test]
fn vp_on_top_edge_centre_conserves_width_plus_two_heights() {
    let plan = plan_for(Vec2::new(WIDTH as f32 / 2.0, 0.0));
    let expected = (WIDTH + 2 * HEIGHT) as usize;
    assert!(
        plan.total_rays.abs_diff(expected) <= 4,
        "expected about {expected} rays, got {}",
        plan.total_rays
    );
}

#[test]
fn vp_on_bottom_edge_centre_conserves_width_plus_two_heights() {
    let plan = plan_for(Vec2::new(WIDTH as f32 / 2.0, HEIGHT as f32));
    let expected = (WIDTH + 2 * HEIGHT) as usize;
    assert!(plan.total_rays.abs_diff(expected) <= 4, "got {}", plan.total_rays);
    assert!(plan.segment(SegmentKind::Bottom).is_degenerate());
}

#[test]
fn vp_far_above_spends_whole_budget_on_bottom_segment() {
    let plan = plan_for(Vec2::new(WIDTH as f32 / 2.0, -1.0e5));
    let bottom = plan.segment(SegmentKind::Bottom);
    assert_eq!(bottom.ray_count, (WIDTH + 2 * HEIGHT) as usize);
    assert!(bottom.spread() <= WIDTH as f32 + 1.0, "rays stay over the screen width");
    for kind in [SegmentKind::Top, SegmentKind::Left, SegmentKind::Right] {
        assert!(plan.segment(kind).is_degenerate(), "{kind:?} should be empty");
    }
}

#[test]
fn ray_counts_sum_to_width_plus_two_heights_for_any_vanishing_point() {
    let expected = (WIDTH + 2 * HEIGHT) as usize;
    let mut rng = ChaCha8Rng::seed_from_u64(0xC0C0);
    for _ in 0..200 {
        let vp = Vec2::new(
            rng.gen_range(-3.0 * WIDTH as f32..4.0 * WIDTH as f32),
            rng.gen_range(-3.0 * HEIGHT as f32..4.0 * HEIGHT as f32),
        );
        let plan = plan_for(vp);
        let counts: Vec<usize> = plan.segments.iter().map(|s| s.ray_count).collect();
        assert!(
            plan.total_rays.abs_diff(expected) <= 4,
            "vp {vp}: total {} counts {counts:?}",
            plan.total_rays
        );
        for segment in plan.segments.iter().filter(|s| s.ray_count > 1) {
            let spacing = segment.spread() / (segment.ray_count - 1) as f32;
            assert!(spacing < 2.0, "vp {vp}: {:?} far-edge spacing {spacing}", segment.kind);
        }
    }
}

#[test]
fn vp_just_off_screen_left_uses_diagonal_bounds() {
    let plan = plan_for(Vec2::new(-10.0, HEIGHT as f32 / 2.0));
    let right = plan.segment(SegmentKind::Right);
    assert_close(right.lo, -230.0, "right lo");
    assert_close(right.hi, 430.0, "right hi");
    assert_eq!(right.column_len, WIDTH as usize);
    assert!(plan.segment(SegmentKind::Left).is_degenerate());
    // Spans 660 / 90 / 90 share the 720-ray budget.
    assert_eq!(right.ray_count, 565);
    assert_eq!(plan.segment(SegmentKind::Top).ray_count, 78);
    assert_eq!(plan.segment(SegmentKind::Bottom).ray_count, 78);
    assert_eq!(plan.total_rays, 721);
}

#[test]
fn vp_far_off_screen_left_uses_corner_bounds() {
    let plan = plan_for(Vec2::new(-1000.0, HEIGHT as f32 / 2.0));
    let right = plan.segment(SegmentKind::Right);
    assert_close(right.lo, -31.93, "right lo");
    assert_close(right.hi, 231.93, "right hi");
    for kind in [SegmentKind::Top, SegmentKind::Bottom, SegmentKind::Left] {
        assert!(plan.segment(kind).is_degenerate(), "{kind:?} should be empty");
    }
    assert_eq!(right.ray_count, 720);
    assert_eq!(plan.total_rays, 720);
}

#[test]
fn every_pixel_maps_to_a_ray_for_random_vanishing_points() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5E6);
    for _ in 0..40 {
        let vp = Vec2::new(
            rng.gen_range(-2.0 * WIDTH as f32..3.0 * WIDTH as f32),
            rng.gen_range(-2.0 * HEIGHT as f32..3.0 * HEIGHT as f32),
        );
        let plan = plan_for(vp);
        assert!(
            plan.cell_count() <= SegmentPlan::max_cell_count(WIDTH, HEIGHT),
            "plan for {vp} exceeds the ray buffer bound"
        );
        for py in (0..HEIGHT).step_by(3) {
            for px in (0..WIDTH).step_by(3) {
                let located = plan.locate(px, py);
                let (kind, ray, k) = located.unwrap_or_else(|| panic!("pixel ({px}, {py}) has no ray for vp {vp}"));
                let segment = plan.segment(kind);
                assert!(ray < segment.ray_count && k < segment.column_len);
            }
        }
    }
}

#[test]
fn located_ray_passes_through_its_pixel() {
    let plan = plan_for(Vec2::new(131.7, 58.2));
    for (px, py) in [(10, 190), (300, 20), (5, 60), (250, 150), (131, 199)] {
        let (kind, ray, k) = plan.locate(px, py).unwrap();
        let (x, y) = plan.segment(kind).pixel(ray, k);
        if kind.is_vertical() {
            assert_eq!(y, py as i64);
            assert!((x - px as i64).abs() <= 1, "{kind:?} ray {ray} row {k} lands at x {x}, pixel {px}");
        } else {
            assert_eq!(x, px as i64);
            assert!((y - py as i64).abs() <= 1, "{kind:?} ray {ray} row {k} lands at y {y}, pixel {py}");
        }
    }
}

#[test]
fn ray_buffer_holds_any_plan_after_prepare() {
    let mut buffer = RayBuffer::with_resolution(WIDTH, HEIGHT);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for _ in 0..20 {
        let vp = Vec2::new(rng.gen_range(-500.0..800.0), rng.gen_range(-500.0..700.0));
        let plan = plan_for(vp);
        buffer.prepare(&plan, 0xFF000000);
        assert_eq!(buffer.used(), plan.cell_count());
        assert!(buffer.capacity() >= buffer.used());
    }
}
