//! Cells and interfaces stored in a [`MeshPatch`](super::patch::MeshPatch).

use serde::{Deserialize, Serialize};

use super::cell_type::ElementType;

/// A mesh cell: element kind, raw connectivity, part id and owner rank.
///
/// `connect` keeps the storage layout of the kind: the vertex list for fixed
/// kinds, `[n, v..]` for polygons and the face stream for polyhedra.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    id: i64,
    kind: ElementType,
    connect: Vec<i64>,
    pid: i64,
    owner: usize,
    /// Neighbour cell ids per local face; empty while adjacencies are unbuilt.
    #[serde(skip)]
    pub(crate) adjacency: Vec<Vec<i64>>,
    /// Interface ids per local face; empty while interfaces are unbuilt.
    #[serde(skip)]
    pub(crate) interfaces: Vec<Vec<i64>>,
}

impl Cell {
    pub fn new(id: i64, kind: ElementType, connect: Vec<i64>, pid: i64, owner: usize) -> Self {
        Self {
            id,
            kind,
            connect,
            pid,
            owner,
            adjacency: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn kind(&self) -> ElementType {
        self.kind
    }

    pub fn pid(&self) -> i64 {
        self.pid
    }

    pub(crate) fn set_pid(&mut self, pid: i64) {
        self.pid = pid;
    }

    /// Rank owning this cell.
    pub fn owner(&self) -> usize {
        self.owner
    }

    /// Raw connectivity, including count prefixes for variable kinds.
    pub fn connect(&self) -> &[i64] {
        &self.connect
    }

    /// Distinct vertex ids in first-appearance order.
    pub fn vertex_ids(&self) -> Vec<i64> {
        match self.kind {
            ElementType::Polygon => self.connect.get(1..).map(|v| v.to_vec()).unwrap_or_default(),
            ElementType::Polyhedron => {
                let mut out: Vec<i64> = Vec::new();
                for face in self.polyhedron_faces() {
                    for v in face {
                        if !out.contains(&v) {
                            out.push(v);
                        }
                    }
                }
                out
            }
            _ => self.connect.clone(),
        }
    }

    /// Local index of `vertex` in [`vertex_ids`](Self::vertex_ids).
    pub fn find_vertex(&self, vertex: i64) -> Option<usize> {
        self.vertex_ids().iter().position(|&v| v == vertex)
    }

    pub fn face_count(&self) -> usize {
        match self.kind {
            ElementType::Polygon => self.connect.len().saturating_sub(1),
            ElementType::Polyhedron => self.connect.first().map_or(0, |&n| n.max(0) as usize),
            kind => kind.local_faces().map_or(0, |faces| faces.len()),
        }
    }

    /// Vertex ids of local face `face`, in loop order.
    pub fn face_vertex_ids(&self, face: usize) -> Vec<i64> {
        match self.kind {
            ElementType::Polygon => {
                let verts = &self.connect[1..];
                let n = verts.len();
                vec![verts[face % n], verts[(face + 1) % n]]
            }
            ElementType::Polyhedron => self.polyhedron_faces().nth(face).unwrap_or_default(),
            kind => kind
                .local_faces()
                .and_then(|faces| faces.get(face))
                .map(|local| local.iter().map(|&i| self.connect[i]).collect())
                .unwrap_or_default(),
        }
    }

    /// Every face as a vertex-id loop.
    pub fn faces(&self) -> Vec<Vec<i64>> {
        (0..self.face_count()).map(|f| self.face_vertex_ids(f)).collect()
    }

    /// Element kind of local face `face`.
    pub fn face_kind(&self, face: usize) -> ElementType {
        ElementType::face_kind(self.face_vertex_ids(face).len())
    }

    /// Edges as vertex-id pairs, without duplicates.
    pub fn edges(&self) -> Vec<[i64; 2]> {
        match self.kind {
            ElementType::Polygon => {
                let verts = &self.connect[1..];
                let n = verts.len();
                (0..n).map(|i| [verts[i], verts[(i + 1) % n]]).collect()
            }
            ElementType::Polyhedron => {
                let mut out: Vec<[i64; 2]> = Vec::new();
                for face in self.polyhedron_faces() {
                    let n = face.len();
                    for i in 0..n {
                        let (a, b) = (face[i], face[(i + 1) % n]);
                        if !out.iter().any(|e| (e[0] == a && e[1] == b) || (e[0] == b && e[1] == a)) {
                            out.push([a, b]);
                        }
                    }
                }
                out
            }
            kind => kind
                .local_edges()
                .map(|edges| edges.iter().map(|e| [self.connect[e[0]], self.connect[e[1]]]).collect())
                .unwrap_or_default(),
        }
    }

    fn polyhedron_faces(&self) -> impl Iterator<Item = Vec<i64>> + '_ {
        let n_faces = self.connect.first().map_or(0, |&n| n.max(0) as usize);
        let mut pos = 1usize;
        (0..n_faces).map_while(move |_| {
            let n = *self.connect.get(pos)? as usize;
            let face = self.connect.get(pos + 1..pos + 1 + n)?.to_vec();
            pos += n + 1;
            Some(face)
        })
    }

    /// Neighbours across local face `face`.
    pub fn adjacencies(&self, face: usize) -> &[i64] {
        self.adjacency.get(face).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if any face has at least one neighbour.
    pub fn has_adjacency(&self) -> bool {
        self.adjacency.iter().any(|a| !a.is_empty())
    }

    /// True when local face `face` has no neighbour.
    pub fn is_face_border(&self, face: usize) -> bool {
        self.adjacencies(face).is_empty()
    }

    /// Interfaces on local face `face`.
    pub fn face_interfaces(&self, face: usize) -> &[i64] {
        self.interfaces.get(face).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replaces vertex ids through `remap`, leaving count prefixes untouched.
    pub(crate) fn remap_vertices(&mut self, remap: impl Fn(i64) -> i64) {
        match self.kind {
            ElementType::Polygon => {
                for v in self.connect.iter_mut().skip(1) {
                    *v = remap(*v);
                }
            }
            ElementType::Polyhedron => {
                let n_faces = self.connect.first().map_or(0, |&n| n.max(0) as usize);
                let mut pos = 1usize;
                for _ in 0..n_faces {
                    let Some(&n) = self.connect.get(pos) else { break };
                    let n = n as usize;
                    for v in self.connect.iter_mut().skip(pos + 1).take(n) {
                        *v = remap(*v);
                    }
                    pos += n + 1;
                }
            }
            _ => {
                for v in self.connect.iter_mut() {
                    *v = remap(*v);
                }
            }
        }
    }
}

/// Shared face between two cells, or between a cell and the domain border.
#[derive(Clone, Debug, PartialEq)]
pub struct Interface {
    pub(crate) id: i64,
    pub(crate) kind: ElementType,
    pub(crate) connect: Vec<i64>,
    pub(crate) owner: i64,
    pub(crate) owner_face: usize,
    pub(crate) neigh: Option<(i64, usize)>,
}

impl Interface {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn kind(&self) -> ElementType {
        self.kind
    }

    /// Vertex ids in the owner face's loop order.
    pub fn vertex_ids(&self) -> &[i64] {
        &self.connect
    }

    pub fn owner(&self) -> i64 {
        self.owner
    }

    pub fn owner_face(&self) -> usize {
        self.owner_face
    }

    /// Neighbour cell and its local face, `None` on a border.
    pub fn neigh(&self) -> Option<(i64, usize)> {
        self.neigh
    }

    pub fn is_border(&self) -> bool {
        self.neigh.is_none()
    }
}
