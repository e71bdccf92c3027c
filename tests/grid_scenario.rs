mod util;

use mesh_morph::prelude::*;
use util::*;

#[test]
fn grid_counts_and_pid_extraction() {
    let ctx = Context::serial();
    let mut mesh = grid_mesh(&ctx);
    for id in m_cells() {
        assert!(mesh.set_pid_cell(id, 1));
    }
    assert_eq!(mesh.n_cells(), 48);
    assert_eq!(mesh.n_vertices(), 35);
    assert_permutation(&mesh.extract_pid_cells(1), &m_cells());
    assert_eq!(mesh.extract_pid_cells(0).len(), 28);
    assert_eq!(mesh.pids().keys().copied().collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn sub_mesh_boundary_vertices() {
    let ctx = Context::serial();
    let mut mesh = grid_mesh(&ctx);
    for id in m_cells() {
        mesh.set_pid_cell(id, 1);
    }
    let list = mesh.extract_pid_cells(1);

    let mut sub = MeshObject::new(MeshKind::Surface, &ctx);
    for v in mesh.vertex_from_cell_list(&list) {
        let p = mesh.patch().vertex(v).unwrap();
        assert_eq!(sub.add_vertex(p, Some(v)), Some(v));
    }
    for id in &list {
        let cell = mesh.patch().cell(*id).unwrap();
        let got = sub.add_connected_cell(cell.connect().to_vec(), ElementType::Triangle, cell.pid(), Some(*id), None);
        assert_eq!(got, Some(*id));
    }
    assert!(sub.ensure_current(Structure::Adjacency));

    let mut want: Vec<i64> = (0..10).flat_map(|i| [5 + i, 20 + i]).collect();
    want.extend([17, 18]);
    want.sort_unstable();
    assert_eq!(sub.extract_boundary_vertex_id(false), want);
    assert_eq!(sub.extract_pid_cells(1).len(), 20);
}

#[test]
fn clone_is_a_hard_copy() {
    let ctx = Context::serial();
    let mut mesh = grid_mesh(&ctx);
    mesh.set_pid_name(0, "plate");
    mesh.ensure_current(Structure::Adjacency);
    let mut copy = mesh.clone_object();
    assert_ne!(copy.id(), mesh.id());
    assert!(copy.owns_patch());
    assert_eq!(copy.n_cells(), mesh.n_cells());
    assert_eq!(copy.sync_state(Structure::Adjacency), SyncState::Current);
    assert_eq!(copy.pids()[&0], "plate");

    copy.modify_vertex([9.0, 9.0, 0.0], 0);
    assert_eq!(mesh.patch().vertex(0), Some([0.0, 0.0, 0.0]));
}

#[test]
fn grid_boundary_is_the_perimeter() {
    let ctx = Context::serial();
    let mut mesh = grid_mesh(&ctx);
    let boundary = mesh.extract_boundary_vertex_id(false);
    // 2 * 7 + 2 * 5 - 4 perimeter vertices
    assert_eq!(boundary.len(), 20);
    assert!(!boundary.contains(&6));
    assert!(!mesh.is_closed_loop());
    assert_eq!(mesh.decompose_loop().len(), 1);

    let skin = mesh.extract_boundary_mesh().unwrap().unwrap();
    assert_eq!(skin.kind(), MeshKind::Curve);
    assert_eq!(skin.n_cells(), 20);
    assert_eq!(skin.n_vertices(), 20);
}

#[test]
fn one_ring_of_an_inner_vertex() {
    let ctx = Context::serial();
    let mut mesh = grid_mesh(&ctx);
    // cell 1 = [5, 6, 1]; vertex 6 sits at (0.25, 0.25)
    let ring = mesh.find_vertex_vertex_one_ring(1, 6);
    assert_eq!(ring.into_iter().collect::<Vec<_>>(), vec![1, 2, 5, 7, 10, 11]);
    assert_eq!(mesh.point_connectivity(6).into_iter().collect::<Vec<_>>(), vec![1, 2, 5, 7, 10, 11]);
}
