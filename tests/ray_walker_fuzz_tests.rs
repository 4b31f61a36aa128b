//! Randomized tests for the grid walker: step adjacency, distance continuity
//! and LOD transitions that never jump away from the ray.
use glam::{IVec2, UVec3, Vec2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use voxel_raycaster::rendering::{DdaStep, RayWalker};
use voxel_raycaster::world::{LodPyramid, WorldBuilder};

const RAYS: usize = 500;

fn empty_pyramid(size: u32, repeating: bool, levels: usize) -> LodPyramid {
    let base = WorldBuilder::from_fn(UVec3::new(size, 8, size), repeating, |_, _, _| {}).unwrap();
    LodPyramid::build(base, levels).unwrap()
}

fn random_ray(rng: &mut ChaCha8Rng, extent: f32) -> (Vec2, Vec2) {
    let origin = Vec2::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent));
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    (origin, Vec2::new(angle.cos(), angle.sin()))
}

/// The point at distance `t` lies in `step`'s cell, up to `slack` world units.
fn assert_point_in_cell(origin: Vec2, dir: Vec2, t: f32, step: &DdaStep, slack: f32) {
    let size = LodPyramid::voxel_size(step.level);
    let p = origin + dir * t;
    let min = step.cell.as_vec2() * size - Vec2::splat(slack);
    let max = (step.cell + IVec2::ONE).as_vec2() * size + Vec2::splat(slack);
    assert!(
        p.cmpge(min).all() && p.cmple(max).all(),
        "point {p} at t={t} outside level {} cell {} (origin {origin}, dir {dir})",
        step.level,
        step.cell
    );
}

#[test]
fn consecutive_cells_are_adjacent_and_distances_continuous() {
    let world = empty_pyramid(64, true, 1);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for _ in 0..RAYS {
        let (origin, dir) = random_ray(&mut rng, 64.0);
        let steps: Vec<DdaStep> = RayWalker::new(&world, origin, dir, 50.0, &[]).collect();
        assert!(!steps.is_empty());
        assert_eq!(steps[0].t_enter, 0.0);
        for pair in steps.windows(2) {
            let delta = (pair[1].cell - pair[0].cell).abs();
            assert_eq!(delta.x + delta.y, 1, "cells {} -> {} are not neighbours", pair[0].cell, pair[1].cell);
            assert!((pair[1].t_enter - pair[0].t_exit).abs() < 1e-4);
            assert!(pair[1].t_exit >= pair[1].t_enter);
        }
        let last = steps[steps.len() - 1];
        assert!((last.t_exit - 50.0).abs() < 1e-3, "repeating world walks to the far clip");
    }
}

#[test]
fn every_step_contains_its_segment_of_the_ray() {
    let world = empty_pyramid(64, true, 3);
    let distances = [6.0, 20.0];
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..RAYS {
        let (origin, dir) = random_ray(&mut rng, 64.0);
        let walker = RayWalker::new(&world, origin, dir, 60.0, &distances);
        let dir = walker.direction();
        for step in walker {
            assert_point_in_cell(origin, dir, step.t_enter, &step, 1e-3);
            assert_point_in_cell(origin, dir, step.t_exit, &step, 1e-3);
        }
    }
}

#[test]
fn lod_transition_stays_within_one_coarse_voxel() {
    let world = empty_pyramid(128, true, 4);
    let distances = [5.0, 13.0, 29.0];
    let mut rng = ChaCha8Rng::seed_from_u64(1234);
    for _ in 0..RAYS {
        let (origin, dir) = random_ray(&mut rng, 128.0);
        let mut walker = RayWalker::new(&world, origin, dir, 90.0, &distances);
        let dir = walker.direction();
        let steps: Vec<DdaStep> = walker.by_ref().collect();
        assert_eq!(walker.lod_switches(), 3, "every distance is crossed");
        for pair in steps.windows(2) {
            let (fine, coarse) = (pair[0], pair[1]);
            assert!(coarse.level >= fine.level, "levels never go back to finer");
            if coarse.level != fine.level {
                assert!(coarse.level == fine.level + 1, "one level per boundary here");
                assert!(fine.t_exit <= distances[fine.level] + 1e-3, "switch happens at the boundary");
                let coarse_size = LodPyramid::voxel_size(coarse.level);
                let fine_centre = origin + dir * fine.t_exit;
                let coarse_centre = (coarse.cell.as_vec2() + Vec2::splat(0.5)) * coarse_size;
                assert!(
                    (fine_centre - coarse_centre).abs().max_element() <= coarse_size,
                    "coarse cell {} jumped away from {fine_centre}",
                    coarse.cell
                );
            }
        }
    }
}

#[test]
fn bounded_world_rays_stay_inside_footprint() {
    let world = empty_pyramid(32, false, 2);
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for _ in 0..RAYS {
        let origin = Vec2::new(rng.gen_range(-40.0..72.0), rng.gen_range(-40.0..72.0));
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let dir = Vec2::new(angle.cos(), angle.sin());
        for step in RayWalker::new(&world, origin, dir, 200.0, &[10.0]) {
            let cells = 32 >> step.level;
            assert!(
                step.cell.x >= 0 && step.cell.y >= 0 && step.cell.x < cells && step.cell.y < cells,
                "cell {} at level {} outside the world",
                step.cell,
                step.level
            );
        }
    }
}
