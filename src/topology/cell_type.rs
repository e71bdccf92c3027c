//! Element kinds, their arity rules and local face/edge tables.
//!
//! Fixed-arity kinds list their vertices directly. Polygons are stored as
//! `[n, v0, .., v(n-1)]` and polyhedra as a count-prefixed face stream
//! `[nFaces, n0, f0v0, .., n1, f1v0, ..]`.

use serde::{Deserialize, Serialize};

/// Element kinds a mesh patch can store.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementType {
    /// 0D vertex.
    Vertex,
    /// 1D segment.
    Line,
    /// 2D triangle.
    Triangle,
    /// Axis-aligned quad with lexicographic (VTK pixel) ordering.
    Pixel,
    /// 2D quadrilateral.
    Quad,
    /// 2D polygon, count-prefixed connectivity.
    Polygon,
    /// 3D tetrahedron.
    Tetra,
    /// Axis-aligned hexahedron with lexicographic (VTK voxel) ordering.
    Voxel,
    /// 3D hexahedron.
    Hexahedron,
    /// 3D wedge/prism.
    Wedge,
    /// 3D pyramid.
    Pyramid,
    /// 3D polyhedron, face-stream connectivity.
    Polyhedron,
    /// No valid kind; used as "delete with no replacement".
    Undefined,
}

impl Default for ElementType {
    fn default() -> Self {
        ElementType::Undefined
    }
}

impl ElementType {
    /// Returns the topological dimension of the element.
    pub fn dimension(self) -> u8 {
        match self {
            ElementType::Vertex | ElementType::Undefined => 0,
            ElementType::Line => 1,
            ElementType::Triangle | ElementType::Pixel | ElementType::Quad | ElementType::Polygon => 2,
            ElementType::Tetra
            | ElementType::Voxel
            | ElementType::Hexahedron
            | ElementType::Wedge
            | ElementType::Pyramid
            | ElementType::Polyhedron => 3,
        }
    }

    /// Exact connectivity length for fixed-arity kinds.
    pub fn fixed_arity(self) -> Option<usize> {
        match self {
            ElementType::Vertex => Some(1),
            ElementType::Line => Some(2),
            ElementType::Triangle => Some(3),
            ElementType::Pixel | ElementType::Quad | ElementType::Tetra => Some(4),
            ElementType::Pyramid => Some(5),
            ElementType::Wedge => Some(6),
            ElementType::Voxel | ElementType::Hexahedron => Some(8),
            ElementType::Polygon | ElementType::Polyhedron | ElementType::Undefined => None,
        }
    }

    /// True for kinds with a count-prefixed connectivity.
    pub fn is_variable(self) -> bool {
        matches!(self, ElementType::Polygon | ElementType::Polyhedron)
    }

    /// Local vertex indices of each face, for fixed-arity kinds.
    ///
    /// Faces of 2D elements are their edges; faces of a line are its endpoints.
    pub fn local_faces(self) -> Option<&'static [&'static [usize]]> {
        match self {
            ElementType::Vertex => Some(&[]),
            ElementType::Line => Some(&LINE_FACES),
            ElementType::Triangle => Some(&TRI_EDGES),
            ElementType::Quad => Some(&QUAD_EDGES),
            ElementType::Pixel => Some(&PIXEL_EDGES),
            ElementType::Tetra => Some(&TET_FACES),
            ElementType::Hexahedron => Some(&HEX_FACES),
            ElementType::Voxel => Some(&VOXEL_FACES),
            ElementType::Wedge => Some(&WEDGE_FACES),
            ElementType::Pyramid => Some(&PYRAMID_FACES),
            ElementType::Polygon | ElementType::Polyhedron | ElementType::Undefined => None,
        }
    }

    /// Local vertex index pairs of each edge, for fixed-arity kinds.
    pub fn local_edges(self) -> Option<&'static [[usize; 2]]> {
        match self {
            ElementType::Vertex => Some(&[]),
            ElementType::Line => Some(&[[0, 1]]),
            ElementType::Triangle => Some(&[[0, 1], [1, 2], [2, 0]]),
            ElementType::Quad => Some(&[[0, 1], [1, 2], [2, 3], [3, 0]]),
            ElementType::Pixel => Some(&[[0, 2], [1, 3], [0, 1], [2, 3]]),
            ElementType::Tetra => Some(&TET_EDGES),
            ElementType::Hexahedron => Some(&HEX_EDGES),
            ElementType::Voxel => Some(&VOXEL_EDGES),
            ElementType::Wedge => Some(&WEDGE_EDGES),
            ElementType::Pyramid => Some(&PYRAMID_EDGES),
            ElementType::Polygon | ElementType::Polyhedron | ElementType::Undefined => None,
        }
    }

    /// Kind of a face with `n` vertices.
    pub fn face_kind(n: usize) -> ElementType {
        match n {
            0 => ElementType::Undefined,
            1 => ElementType::Vertex,
            2 => ElementType::Line,
            3 => ElementType::Triangle,
            4 => ElementType::Quad,
            _ => ElementType::Polygon,
        }
    }
}

/// Validates a connectivity list against the arity rule of `kind`.
///
/// Fixed kinds need an exact length. A polygon needs `len == conn[0] + 1` with
/// at least three vertices. A polyhedron needs at least four faces of at least
/// three vertices each, and the face stream must consume the list exactly.
pub fn check_cell_conn_coherence(kind: ElementType, conn: &[i64]) -> bool {
    match kind {
        ElementType::Undefined => false,
        ElementType::Polygon => {
            let Some(&n) = conn.first() else {
                return false;
            };
            n >= 3 && (conn.len() - 1) as i64 == n
        }
        ElementType::Polyhedron => polyhedron_face_count(conn).is_some(),
        fixed => fixed.fixed_arity() == Some(conn.len()),
    }
}

/// Number of faces of a well-formed polyhedron stream, `None` if malformed.
pub fn polyhedron_face_count(conn: &[i64]) -> Option<usize> {
    let &n_faces = conn.first()?;
    if n_faces < 4 {
        return None;
    }
    let n_faces = n_faces as usize;
    let mut pos = 1usize;
    let mut count = 0usize;
    while pos < conn.len() && count < n_faces {
        let n = conn[pos];
        if n < 3 {
            return None;
        }
        pos += n as usize + 1;
        count += 1;
    }
    (pos == conn.len() && count == n_faces).then_some(n_faces)
}

const LINE_FACE_0: [usize; 1] = [0];
const LINE_FACE_1: [usize; 1] = [1];
const LINE_FACES: [&[usize]; 2] = [&LINE_FACE_0, &LINE_FACE_1];

const TRI_EDGES: [&[usize]; 3] = [&[0, 1], &[1, 2], &[2, 0]];
const QUAD_EDGES: [&[usize]; 4] = [&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const PIXEL_EDGES: [&[usize]; 4] = [&[2, 0], &[1, 3], &[0, 1], &[3, 2]];

const TET_FACES: [&[usize]; 4] = [&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const HEX_FACES: [&[usize]; 6] = [
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[3, 0, 4, 7],
];
const VOXEL_FACES: [&[usize]; 6] = [
    &[0, 4, 6, 2],
    &[1, 3, 7, 5],
    &[0, 1, 5, 4],
    &[2, 6, 7, 3],
    &[0, 2, 3, 1],
    &[4, 5, 7, 6],
];
const WEDGE_FACES: [&[usize]; 5] = [
    &[0, 2, 1],
    &[3, 4, 5],
    &[0, 1, 4, 3],
    &[1, 2, 5, 4],
    &[2, 0, 3, 5],
];
const PYRAMID_FACES: [&[usize]; 5] = [
    &[0, 3, 2, 1],
    &[0, 1, 4],
    &[1, 2, 4],
    &[2, 3, 4],
    &[3, 0, 4],
];

const TET_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];
const HEX_EDGES: [[usize; 2]; 12] = [
    [0, 1], [1, 2], [2, 3], [3, 0],
    [4, 5], [5, 6], [6, 7], [7, 4],
    [0, 4], [1, 5], [2, 6], [3, 7],
];
const VOXEL_EDGES: [[usize; 2]; 12] = [
    [0, 1], [1, 3], [3, 2], [2, 0],
    [4, 5], [5, 7], [7, 6], [6, 4],
    [0, 4], [1, 5], [2, 6], [3, 7],
];
const WEDGE_EDGES: [[usize; 2]; 9] = [
    [0, 1], [1, 2], [2, 0],
    [3, 4], [4, 5], [5, 3],
    [0, 3], [1, 4], [2, 5],
];
const PYRAMID_EDGES: [[usize; 2]; 8] = [
    [0, 1], [1, 2], [2, 3], [3, 0],
    [0, 4], [1, 4], [2, 4], [3, 4],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_kinds_need_exact_length() {
        assert!(check_cell_conn_coherence(ElementType::Triangle, &[1, 2, 3]));
        assert!(!check_cell_conn_coherence(ElementType::Triangle, &[1, 2]));
        assert!(check_cell_conn_coherence(ElementType::Voxel, &[0, 1, 2, 3, 4, 5, 6, 7]));
        assert!(!check_cell_conn_coherence(ElementType::Undefined, &[]));
    }

    #[test]
    fn polygon_prefix_rule() {
        assert!(check_cell_conn_coherence(ElementType::Polygon, &[5, 0, 1, 2, 3, 4]));
        assert!(!check_cell_conn_coherence(ElementType::Polygon, &[5, 0, 1, 2, 3]));
        assert!(!check_cell_conn_coherence(ElementType::Polygon, &[2, 0, 1]));
        assert!(!check_cell_conn_coherence(ElementType::Polygon, &[]));
    }

    #[test]
    fn polyhedron_stream_rule() {
        // tetrahedron written as a face stream
        let tet = [4, 3, 0, 2, 1, 3, 0, 1, 3, 3, 1, 2, 3, 3, 0, 3, 2];
        assert_eq!(polyhedron_face_count(&tet), Some(4));
        assert!(!check_cell_conn_coherence(ElementType::Polyhedron, &tet[..tet.len() - 1]));
        let mut longer = tet.to_vec();
        longer.push(7);
        assert!(!check_cell_conn_coherence(ElementType::Polyhedron, &longer));
    }

    #[test]
    fn face_tables_match_arity() {
        for kind in [
            ElementType::Triangle,
            ElementType::Quad,
            ElementType::Pixel,
            ElementType::Tetra,
            ElementType::Hexahedron,
            ElementType::Voxel,
            ElementType::Wedge,
            ElementType::Pyramid,
        ] {
            let arity = kind.fixed_arity().unwrap();
            for face in kind.local_faces().unwrap() {
                assert!(face.iter().all(|&i| i < arity), "{kind:?}");
            }
            for edge in kind.local_edges().unwrap() {
                assert!(edge.iter().all(|&i| i < arity), "{kind:?}");
            }
        }
    }
}
