mod util;

use mesh_morph::prelude::*;
use mesh_morph::spatial::queries::{
    cell_distance, distance, distances, find_point_closest_cell, locate_point_on_patch, project_point,
    project_points, select_by_patch, signed_distance,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use util::*;

fn grid_with_tree(ctx: &Context) -> MeshObject<'static> {
    let mut mesh = grid_mesh(ctx);
    assert!(mesh.ensure_current(Structure::CellTree));
    mesh
}

#[test]
fn tree_distance_matches_brute_force() {
    let ctx = Context::serial();
    let mesh = grid_with_tree(&ctx);
    let view = mesh.tree_view().unwrap();
    let mut rng = SmallRng::seed_from_u64(7);
    for _ in 0..200 {
        let p = [
            rng.gen_range(-0.5..2.0),
            rng.gen_range(-0.5..1.5),
            rng.gen_range(-1.0..1.0),
        ];
        let hit = distance(p, &view, f64::MAX).unwrap();
        let brute = mesh
            .patch()
            .cells()
            .map(|c| cell_distance(mesh.patch(), c, p, view.tol))
            .fold(f64::MAX, f64::min);
        assert!(hit.is_found());
        assert_close(hit.distance, brute, 1e-12);
    }
}

#[test]
fn radius_limits_the_search() {
    let ctx = Context::serial();
    let mesh = grid_with_tree(&ctx);
    let view = mesh.tree_view().unwrap();
    let pts = [[0.3, 0.4, 2.0], [0.3, 0.4, 0.05]];
    let got = distances(&pts, &view, Radius::Shared(0.1)).unwrap();
    assert_eq!(got[0], Proximity::NOT_FOUND);
    assert_close(got[1].distance, 0.05, 1e-12);
    let got = distances(&pts, &view, Radius::PerPoint(&[3.0, 0.01])).unwrap();
    assert_close(got[0].distance, 2.0, 1e-12);
    assert!(!got[1].is_found());
}

#[test]
fn sign_follows_the_cell_orientation() {
    let ctx = Context::serial();
    let mesh = grid_with_tree(&ctx);
    let view = mesh.tree_view().unwrap();
    let above = signed_distance([0.3, 0.4, 0.5], &view, f64::MAX).unwrap();
    let below = signed_distance([0.3, 0.4, -0.5], &view, f64::MAX).unwrap();
    assert_close(above.distance, 0.5, 1e-12);
    assert_close(below.distance, -0.5, 1e-12);
    assert_close(above.pseudo_normal[2], 1.0, 1e-12);
    assert_close(below.pseudo_normal[2], 1.0, 1e-12);
    // on the surface the sign counts as positive and the raw normal is used
    let on = signed_distance([0.3, 0.4, 0.0], &view, f64::MAX).unwrap();
    assert!(on.distance.abs() < 1e-12);
    assert_close(on.pseudo_normal[2], 1.0, 1e-12);
}

#[test]
fn projection_and_location() {
    let ctx = Context::serial();
    let mesh = grid_with_tree(&ctx);
    let view = mesh.tree_view().unwrap();
    let x = project_point([0.3, 0.4, 2.0], &view, 0.0).unwrap();
    for (a, b) in x.iter().zip([0.3, 0.4, 0.0]) {
        assert_close(*a, b, 1e-12);
    }
    let xs = project_points(&[[0.3, 0.4, -1.0], [3.0, 0.5, 0.0]], &view, Radius::Shared(0.01)).unwrap();
    assert_close(xs[0][2], 0.0, 1e-12);
    assert_close(xs[1][0], 1.5, 1e-12);
    // x + y < 0.75 in square (1, 1): the first triangle
    assert_eq!(locate_point_on_patch([0.3, 0.4, 0.0], &view).unwrap(), Some(10));
    assert_eq!(locate_point_on_patch([0.45, 0.45, 0.0], &view).unwrap(), Some(11));
    assert_eq!(locate_point_on_patch([3.0, 0.4, 0.0], &view).unwrap(), None);
}

#[test]
fn selection_by_patch_and_volume_trees() {
    let ctx = Context::serial();
    let mesh = grid_with_tree(&ctx);
    let mut w = wall(&ctx, -0.1, -1.0, 2.0);
    w.ensure_current(Structure::CellTree);
    let picked = select_by_patch(w.cell_tree().unwrap(), mesh.cell_tree().unwrap(), 0.2);
    assert_eq!(picked, (0..8).collect::<Vec<_>>());

    let mut cube = cube_tets(&ctx);
    cube.ensure_current(Structure::CellTree);
    let view = cube.tree_view().unwrap();
    assert_eq!(distance([0.5, 0.5, 0.5], &view, f64::MAX), Err(MeshError::NotASurfaceTree));
    let inside = find_point_closest_cell([0.2, 0.5, 0.6], &view, f64::MAX);
    assert!(inside.is_found());
    assert_eq!(inside.distance, 0.0);
    let outside = find_point_closest_cell([2.0, 0.5, 0.5], &view, f64::MAX);
    assert_close(outside.distance, 1.0, 1e-12);
}
