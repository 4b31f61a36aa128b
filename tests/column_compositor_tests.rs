/// Column compositing against real camera frames: every row of a ray's
/// window is written exactly once, and an occluding wall ends the ray.
use glam::{UVec3, Vec2, Vec3};
use voxel_raycaster::camera::{Camera, CameraFrame};
use voxel_raycaster::rendering::{trace_ray, ColumnTarget, RayOcclusion, RayProjection, RayWalker, SegmentPlan};
use voxel_raycaster::world::{terrain, LodPyramid, TerrainConfig, Voxel, WorldBuilder};

const SKY: u32 = 0xFF87CEEB;

/// Records how often each row is written, independently of the seen bitmap.
struct CountingTarget {
    colors: Vec<u32>,
    writes: Vec<u32>,
}

impl CountingTarget {
    fn new(len: usize) -> Self {
        Self {
            colors: vec![0; len],
            writes: vec![0; len],
        }
    }
}

impl ColumnTarget for CountingTarget {
    fn write(&mut self, row: usize, color: u32) {
        self.colors[row] = color;
        self.writes[row] += 1;
    }
}

fn terrain_pyramid() -> LodPyramid {
    let config = TerrainConfig {
        size: UVec3::new(128, 64, 128),
        base_height: 24.0,
        amplitude: 12.0,
        scale: 0.03,
        overhangs: true,
        ..TerrainConfig::default()
    };
    LodPyramid::build(terrain::generate(&config).unwrap(), 3).unwrap()
}

fn check_every_row_written_once(world: &LodPyramid, camera: &Camera, expect_terrain: bool) {
    let frame = CameraFrame::compute(camera, (160, 120), 400.0, &[32.0, 96.0]);
    let plan = SegmentPlan::compute(&frame);
    let mut occlusion = RayOcclusion::new();
    let mut drawn = 0;

    for segment in plan.segments.iter().filter(|s| !s.is_degenerate()) {
        for ray in (0..segment.ray_count).step_by(7) {
            let dir = segment.ray_direction(&frame, ray);
            let projection = segment.projection(&frame, dir, world.size().y as f32);
            let window = segment.row_window(ray);
            occlusion.reset(segment.column_len, window);
            let mut target = CountingTarget::new(segment.column_len);
            let walker = RayWalker::new(world, frame.eye_xz(), dir, frame.far_clip, &frame.lod_distances);
            let stats = trace_ray(world, walker, &projection, &mut occlusion, &mut target, SKY, frame.vp_is_up);
            drawn += stats.runs_drawn;

            for (row, &count) in target.writes.iter().enumerate() {
                let inside = window.map_or(false, |(lo, hi)| row >= lo && row <= hi);
                let expected = u32::from(inside);
                assert_eq!(
                    count, expected,
                    "{:?} ray {ray} row {row}: written {count} times, window {window:?}",
                    segment.kind
                );
            }
            let window_rows = window.map_or(0, |(lo, hi)| hi - lo + 1) as u64;
            assert_eq!(stats.rows_written, window_rows);
        }
    }
    if expect_terrain {
        assert!(drawn > 0, "terrain should be visible from {:?}", camera.position);
    }
}

#[test]
fn rows_written_exactly_once_looking_level() {
    let world = terrain_pyramid();
    let mut camera = Camera::new(Vec3::new(40.0, 44.0, 90.0));
    camera.yaw = 0.6;
    check_every_row_written_once(&world, &camera, true);
}

#[test]
fn rows_written_exactly_once_looking_down_and_rolled() {
    let world = terrain_pyramid();
    let mut camera = Camera::new(Vec3::new(64.0, 50.0, 64.0));
    camera.pitch = -1.1;
    camera.roll = 0.4;
    check_every_row_written_once(&world, &camera, true);
}

#[test]
fn rows_written_exactly_once_looking_up() {
    let world = terrain_pyramid();
    let mut camera = Camera::new(Vec3::new(10.0, 30.0, 10.0));
    camera.pitch = 0.9;
    camera.yaw = -2.0;
    check_every_row_written_once(&world, &camera, false);
}

#[test]
fn covering_wall_terminates_ray_without_touching_outside_window() {
    // Full-height wall at x = 3.
    let base = WorldBuilder::from_fn(UVec3::new(16, 16, 16), false, |x, _, out| {
        if x == 3 {
            out.extend((0..16).map(|y| Voxel::new(y, 0xFF000000 | y as u32)));
        }
    })
    .unwrap();
    let world = LodPyramid::build(base, 1).unwrap();

    // Row coordinate q = 8 + h / t: a horizontal view at eye height 8.
    let projection = RayProjection {
        r: Vec2::new(0.0, 1.0),
        c: Vec2::new(1.0, 0.0),
        eye_height: 8.0,
        q_a: 8.0,
        q_b: 1.0,
        near: 0.1,
        world_height: 16.0,
    };
    let mut occlusion = RayOcclusion::new();
    occlusion.reset(16, Some((5, 10)));
    let mut target = CountingTarget::new(16);
    let walker = RayWalker::new(&world, Vec2::new(0.5, 8.5), Vec2::X, 100.0, &[]);
    let stats = trace_ray(&world, walker, &projection, &mut occlusion, &mut target, SKY, false);

    assert_eq!(stats.early_terminations, 1, "wall resolves the whole window");
    assert_eq!(stats.dda_steps, 4, "walk stops at the wall cell");
    for row in 0..16 {
        let expected = u32::from((5..=10).contains(&row));
        assert_eq!(target.writes[row], expected, "row {row}");
    }
    assert!(target.colors[5..=10].iter().all(|&c| c != SKY), "window shows the wall");
}
