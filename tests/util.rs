#![allow(dead_code)]
use std::sync::Arc;
use std::thread;

use mesh_morph::prelude::*;

/// 7 x 5 vertices with spacing 0.25; vertex `5 i + j` sits at `(i dx, j dy)`.
pub fn grid_vertices() -> Vec<Point3> {
    let (dx, dy) = (0.25, 0.25);
    let mut out = vec![[0.0; 3]; 35];
    for i in 0..7 {
        for j in 0..5 {
            out[5 * i + j] = [i as f64 * dx, j as f64 * dy, 0.0];
        }
    }
    out
}

/// 48 triangles, two per grid square. Cell `8 i + 2 j` and its sibling fill
/// column `i`, row `j`; the diagonal flips after the third column.
pub fn grid_triangles() -> Vec<Vec<i64>> {
    let mut conn = vec![Vec::new(); 48];
    for j in 0..4i64 {
        for i in 0..6i64 {
            let c = (8 * i + 2 * j) as usize;
            if i < 3 {
                conn[c] = vec![5 * i + j, 5 * (i + 1) + j, 5 * i + j + 1];
                conn[c + 1] = vec![5 * (i + 1) + j, 5 * (i + 1) + j + 1, 5 * i + j + 1];
            } else {
                conn[c] = vec![5 * i + j, 5 * (i + 1) + j, 5 * (i + 1) + j + 1];
                conn[c + 1] = vec![5 * i + j, 5 * (i + 1) + j + 1, 5 * i + j + 1];
            }
        }
    }
    conn
}

/// Cells drawing an "M" on the grid.
pub fn m_cells() -> Vec<i64> {
    let mut list: Vec<i64> = (0..8).flat_map(|k| [8 + k, 32 + k]).collect();
    list.extend([21, 22, 29, 30]);
    list
}

pub fn grid_mesh(ctx: &Context) -> MeshObject<'static> {
    MeshObject::from_arrays(MeshKind::Surface, &grid_vertices(), Some(&grid_triangles()), ctx)
}

/// Axis-aligned quad in the plane `x = x0`, covering `y, z` in `[lo, hi]`.
pub fn wall(ctx: &Context, x0: f64, lo: f64, hi: f64) -> MeshObject<'static> {
    let verts = [[x0, lo, lo], [x0, hi, lo], [x0, hi, hi], [x0, lo, hi]];
    MeshObject::from_arrays(MeshKind::Surface, &verts, Some(&[vec![0, 1, 2, 3]]), ctx)
}

/// Unit cube split in 6 tetrahedra around the main diagonal.
pub fn cube_tets(ctx: &Context) -> MeshObject<'static> {
    let verts = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];
    let conn = vec![
        vec![0, 1, 2, 6],
        vec![0, 2, 3, 6],
        vec![0, 3, 7, 6],
        vec![0, 7, 4, 6],
        vec![0, 4, 5, 6],
        vec![0, 5, 1, 6],
    ];
    MeshObject::from_arrays(MeshKind::Volume, &verts, Some(&conn), ctx)
}

/// Run `f` once per in-process rank and return the results in rank order.
pub fn run_ranks<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(Context) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = ThreadComm::group(size)
        .into_iter()
        .map(|comm| {
            let f = Arc::clone(&f);
            thread::spawn(move || {
                let target = format!("mesh_morph::rank{}", comm.rank());
                let ctx = Context::new(Arc::new(comm), GeometryConfig::default()).with_log_target(target);
                f(ctx)
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}

pub fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "{a} != {b} (tol {tol})");
}
