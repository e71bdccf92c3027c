mod util;

use std::collections::{BTreeMap, BTreeSet};

use mesh_morph::prelude::*;
use mesh_morph::spatial::global::{global_distance, locate_point_on_global_patch, project_point_global};
use serial_test::serial;
use util::*;

// Rank 0 reads the whole grid and hands the right half (columns 3..6,
// cells 24..48) to rank 1.
fn partitioned_grid(ctx: &Context) -> MeshObject<'static> {
    let mut mesh = if ctx.comm().rank() == 0 {
        grid_mesh(ctx)
    } else {
        MeshObject::new(MeshKind::Surface, ctx)
    };
    let owners: BTreeMap<i64, usize> = (0..48).map(|id| (id, usize::from(id >= 24))).collect();
    mesh.partition(&owners).unwrap();
    mesh
}

#[test]
#[serial]
fn partition_splits_cells_and_adds_one_ghost_layer() {
    let out = run_ranks(2, |ctx| {
        let mut mesh = partitioned_grid(&ctx);
        let ghosts: Vec<i64> = mesh
            .cell_ids(false)
            .into_iter()
            .filter(|id| mesh.patch().is_ghost_cell(*id))
            .collect();
        (
            mesh.cell_ids(true),
            ghosts,
            mesh.n_global_cells(),
            mesh.n_global_vertices(),
            mesh.cell_global_count_offset(),
            mesh.n_internal_vertices(),
        )
    });
    let (interior0, ghosts0, cells0, verts0, offset0, owned0) = &out[0];
    let (interior1, ghosts1, cells1, verts1, offset1, owned1) = &out[1];
    assert_eq!(*interior0, (0..24).collect::<Vec<_>>());
    assert_eq!(*interior1, (24..48).collect::<Vec<_>>());
    assert_eq!(*ghosts0, vec![25, 27, 29, 31]);
    assert_eq!(*ghosts1, vec![17, 19, 21, 23]);
    assert_eq!((*cells0, *cells1), (48, 48));
    assert_eq!((*verts0, *verts1), (35, 35));
    assert_eq!(*offset0, (48, 0));
    assert_eq!(*offset1, (48, 24));
    // the seam column belongs to the lower rank
    assert_eq!((*owned0, *owned1), (20, 15));
}

#[test]
#[serial]
fn ghost_exchange_lists_mirror_each_other() {
    let out = run_ranks(2, |ctx| {
        let mut mesh = partitioned_grid(&ctx);
        let ge = mesh.ghost_exchange().cloned().unwrap();
        assert_eq!(mesh.sync_state(Structure::GhostExchange), SyncState::Current);
        ge
    });
    let other = |r: usize| 1 - r;
    for (r, ge) in out.iter().enumerate() {
        assert_eq!(ge.neighbour_ranks(), BTreeSet::from([other(r)]));
        assert_eq!(ge.cell_sources[&other(r)], out[other(r)].cell_targets[&r]);
    }
    assert_eq!(out[0].cell_sources[&1], vec![17, 19, 21, 23]);
    assert_eq!(out[0].cell_targets[&1], vec![25, 27, 29, 31]);
    // rank 1 ghosts (column 2 cells) reach back to x = 0.5
    assert_eq!(out[1].point_targets[&0], vec![11, 12, 13, 14]);
    assert_eq!(out[0].point_sources[&1], vec![11, 12, 13, 14]);
}

#[test]
#[serial]
fn boundary_with_and_without_ghosts() {
    let out = run_ranks(2, |ctx| {
        let mut mesh = partitioned_grid(&ctx);
        let interior = mesh.extract_boundary_cell_id(false);
        let with_ghosts = mesh.extract_boundary_cell_id(true);
        let border = mesh.border_cells();
        let closed = mesh.is_closed_loop();
        let bbox = mesh.bounding_box(true);
        (interior, with_ghosts, border, closed, bbox)
    });

    let ctx = Context::serial();
    let mut serial = grid_mesh(&ctx);
    let want: BTreeSet<i64> = serial.extract_boundary_cell_id(false).into_iter().collect();
    let got: BTreeSet<i64> = out.iter().flat_map(|o| o.0.iter().copied()).collect();
    assert_eq!(got, want);

    // ghost 31 touches the top edge of the grid, ghost 25 does not
    assert!(!out[0].0.contains(&31));
    assert!(out[0].1.contains(&31));
    assert!(!out[0].1.contains(&25));
    // the local border also sees the seam behind the ghosts
    assert!(out[0].2.contains(&25));
    for o in &out {
        assert!(!o.3);
        assert_eq!(o.4.min, [0.0, 0.0, 0.0]);
        assert_eq!(o.4.max, [1.5, 1.0, 0.0]);
    }
}

#[test]
#[serial]
fn global_queries_pick_the_owning_rank() {
    let out = run_ranks(2, |ctx| {
        let mut mesh = partitioned_grid(&ctx);
        mesh.ensure_current(Structure::CellTree);
        let comm = ctx.comm();
        let view = mesh.tree_view().unwrap();
        let shared = [[0.3, 0.4, 1.0], [1.3, 0.6, -2.0]];
        let hits = global_distance(&shared, &view, Radius::Shared(f64::MAX), true, comm).unwrap();
        // each rank asks about a different point
        let mine = [[0.1 + 1.2 * comm.rank() as f64, 0.1, 0.0]];
        let located = locate_point_on_global_patch(&mine, &view, false, comm).unwrap();
        let projected = project_point_global(&mine, &view, Radius::Shared(0.0), false, comm).unwrap();
        (hits, located, projected)
    });
    for (hits, _, _) in &out {
        assert_eq!(hits[0].rank, Some(0));
        assert_eq!(hits[0].cell, Some(10));
        assert_close(hits[0].distance, 1.0, 1e-12);
        assert_eq!(hits[1].rank, Some(1));
        assert_close(hits[1].distance, 2.0, 1e-12);
        assert!((40..48).contains(&hits[1].cell.unwrap()));
    }
    assert_eq!(out[0].0, out[1].0);
    // (0.1, 0.1) lies in cell 0, (1.3, 0.1) in column 5
    assert_eq!(out[0].1, vec![Some(0)]);
    assert!((40..48).contains(&out[1].1[0].unwrap()));
    assert_close(out[1].2[0][0], 1.3, 1e-12);
}

#[test]
#[serial]
fn narrow_band_crosses_the_seam() {
    let out = run_ranks(2, |ctx| {
        let mut mesh = partitioned_grid(&ctx);
        // the wall is replicated on every rank
        let mut w = wall(&Context::serial(), -0.1, -1.0, 2.0);
        let vertices = mesh.vertices_narrow_band_to_ext_surface_wdist(&mut w, 1.0, None).unwrap();
        let cells = mesh.cells_narrow_band_to_ext_surface(&mut w, 0.6, None).unwrap();
        (vertices, cells)
    });
    let union: BTreeSet<i64> = out.iter().flat_map(|o| o.0.keys().copied()).collect();
    assert_eq!(union, (0..20).collect());
    let grid = grid_vertices();
    for (band, _) in &out {
        for (id, d) in band {
            assert_close(*d, grid[*id as usize][0] + 0.1, 1e-9);
        }
    }
    // rank 1 also bands the vertices of its ghost cells
    let seam: BTreeSet<i64> = out[1].0.keys().copied().collect();
    assert_eq!(seam, (11..20).collect());

    // centroids with x < 0.5: columns 0 and 1
    let cells: BTreeSet<i64> = out.iter().flat_map(|o| o.1.iter().copied()).collect();
    assert_eq!(cells, (0..16).collect());
}

#[test]
#[serial]
fn partition_rejects_too_many_ranks() {
    let out = run_ranks(2, |ctx| {
        let mut mesh = if ctx.comm().rank() == 0 {
            grid_mesh(&ctx)
        } else {
            MeshObject::new(MeshKind::Surface, &ctx)
        };
        mesh.partition(&BTreeMap::from([(0, 3)]))
    });
    for r in out {
        assert_eq!(r, Err(MeshError::PartitionCountMismatch { expected: 2, found: 4 }));
    }
}
