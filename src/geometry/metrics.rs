//! Geometry metrics for mesh cells: measure (length/area/volume), centroid,
//! normals and aspect ratio.
//!
//! The vertex ordering of fixed-arity kinds follows the usual VTK layout:
//! - Line: `[v0, v1]`.
//! - Triangle/Quad: counter-clockwise loop.
//! - Pixel: lexicographic `(0,0) (1,0) (0,1) (1,1)`, so the loop is `[0, 1, 3, 2]`.
//! - Tetra: `[v0, v1, v2, v3]`.
//! - Hexahedron: bottom loop `[v0..v3]`, top loop `[v4..v7]`.
//! - Voxel: lexicographic corners of the unit cube.
//! - Wedge: bottom triangle `[v0, v1, v2]`, top triangle `[v3, v4, v5]`.
//! - Pyramid: base loop `[v0..v3]`, apex `v4`.
//!
//! Polyhedra are measured from their face loops.

use crate::geometry::cg::{newell_vector, polygon_area, signed_tet_volume};
use crate::geometry::vector::{Point3, distance, mean, normalize};
use crate::mesh_error::MeshError;
use crate::topology::cell_type::ElementType;

const EPS: f64 = 1e-12;

/// Compute the length/area/volume of a cell.
///
/// `vertices` holds the coordinates of the cell's vertex ids in order; `faces`
/// holds face loops and is only read for polyhedra.
pub fn cell_measure(
    kind: ElementType,
    vertices: &[Point3],
    faces: &[Vec<Point3>],
) -> Result<f64, MeshError> {
    if let Some(expected) = kind.fixed_arity() {
        if vertices.len() != expected {
            return Err(MeshError::InvalidGeometry(format!(
                "vertex count mismatch: expected {expected}, got {}",
                vertices.len()
            )));
        }
    }
    match kind {
        ElementType::Vertex => Ok(0.0),
        ElementType::Line => Ok(distance(vertices[1], vertices[0])),
        ElementType::Triangle | ElementType::Quad | ElementType::Polygon => Ok(polygon_area(vertices)),
        ElementType::Pixel => Ok(polygon_area(&surface_loop(kind, vertices))),
        ElementType::Tetra => {
            Ok(signed_tet_volume(vertices[0], vertices[1], vertices[2], vertices[3]).abs())
        }
        ElementType::Hexahedron => Ok(hex_volume(vertices).abs()),
        ElementType::Voxel => {
            let hex: Vec<Point3> = VOXEL_TO_HEX.iter().map(|&i| vertices[i]).collect();
            Ok(hex_volume(&hex).abs())
        }
        ElementType::Wedge => Ok(wedge_volume(vertices).abs()),
        ElementType::Pyramid => Ok(pyramid_volume(vertices).abs()),
        ElementType::Polyhedron => Ok(polyhedron_volume(vertices, faces)),
        ElementType::Undefined => Err(MeshError::InvalidGeometry(
            "cannot measure an undefined element".into(),
        )),
    }
}

/// Vertex-average centroid.
pub fn cell_centroid(vertices: &[Point3]) -> Point3 {
    mean(vertices)
}

/// Vertices of a 2D cell arranged as a closed loop.
pub fn surface_loop(kind: ElementType, vertices: &[Point3]) -> Vec<Point3> {
    if kind == ElementType::Pixel && vertices.len() == 4 {
        vec![vertices[0], vertices[1], vertices[3], vertices[2]]
    } else {
        vertices.to_vec()
    }
}

/// Unit normal of a 2D cell, or the zero vector for degenerate/non-2D input.
pub fn cell_normal(kind: ElementType, vertices: &[Point3]) -> Point3 {
    if kind.dimension() != 2 {
        return [0.0; 3];
    }
    normalize(newell_vector(&surface_loop(kind, vertices)), EPS * EPS)
}

/// Unit normal of a face loop.
pub fn face_normal(face: &[Point3]) -> Point3 {
    normalize(newell_vector(face), EPS * EPS)
}

/// Ratio between the longest and the shortest edge of a 2D cell loop.
///
/// Returns `f64::MAX` when the shortest edge collapses.
pub fn surface_aspect_ratio(kind: ElementType, vertices: &[Point3]) -> f64 {
    let ring = surface_loop(kind, vertices);
    let n = ring.len();
    if n < 2 {
        return 0.0;
    }
    let (mut lmin, mut lmax) = (f64::MAX, 0.0f64);
    for i in 0..n {
        let l = distance(ring[i], ring[(i + 1) % n]);
        lmin = lmin.min(l);
        lmax = lmax.max(l);
    }
    if lmin <= f64::MIN_POSITIVE { f64::MAX } else { lmax / lmin }
}

/// Hydraulic-diameter aspect ratio of a volume cell: `sum(face areas) / (6 V^(2/3))`.
pub fn volume_aspect_ratio(volume: f64, face_area_sum: f64) -> f64 {
    if volume <= f64::MIN_POSITIVE {
        return f64::MAX;
    }
    face_area_sum / (6.0 * volume.powf(2.0 / 3.0))
}

const VOXEL_TO_HEX: [usize; 8] = [0, 1, 3, 2, 4, 5, 7, 6];

fn wedge_volume(vertices: &[Point3]) -> f64 {
    signed_tet_volume(vertices[0], vertices[1], vertices[2], vertices[3])
        + signed_tet_volume(vertices[1], vertices[4], vertices[2], vertices[3])
        + signed_tet_volume(vertices[2], vertices[4], vertices[5], vertices[3])
}

fn pyramid_volume(vertices: &[Point3]) -> f64 {
    signed_tet_volume(vertices[0], vertices[1], vertices[2], vertices[4])
        + signed_tet_volume(vertices[0], vertices[2], vertices[3], vertices[4])
}

fn hex_volume(vertices: &[Point3]) -> f64 {
    signed_tet_volume(vertices[0], vertices[1], vertices[3], vertices[4])
        + signed_tet_volume(vertices[1], vertices[2], vertices[3], vertices[6])
        + signed_tet_volume(vertices[1], vertices[3], vertices[4], vertices[6])
        + signed_tet_volume(vertices[1], vertices[4], vertices[5], vertices[6])
        + signed_tet_volume(vertices[3], vertices[4], vertices[6], vertices[7])
}

// Star decomposition from the vertex centroid: one pyramid per face, each
// split into a fan of tetrahedra around the face centroid.
fn polyhedron_volume(vertices: &[Point3], faces: &[Vec<Point3>]) -> f64 {
    let apex = mean(vertices);
    let mut total = 0.0;
    for face in faces {
        let fc = mean(face);
        let n = face.len();
        for i in 0..n {
            total += signed_tet_volume(apex, fc, face[i], face[(i + 1) % n]).abs();
        }
    }
    total
}

/// Sum of the areas of the given face loops.
pub fn faces_area(faces: &[Vec<Point3>]) -> f64 {
    faces.iter().map(|f| polygon_area(f)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    const CUBE: [Point3; 8] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];

    #[test]
    fn segment_and_surface_measures() {
        let seg = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        assert!(approx(cell_measure(ElementType::Line, &seg, &[]).unwrap(), 2.0));
        let tri = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        assert!(approx(cell_measure(ElementType::Triangle, &tri, &[]).unwrap(), 0.5));
        assert!(approx(cell_normal(ElementType::Triangle, &tri)[2], 1.0));
        let pixel = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [2.0, 1.0, 0.0]];
        assert!(approx(cell_measure(ElementType::Pixel, &pixel, &[]).unwrap(), 2.0));
        assert!(approx(surface_aspect_ratio(ElementType::Pixel, &pixel), 2.0));
    }

    #[test]
    fn volume_measures() {
        let tet = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(approx(cell_measure(ElementType::Tetra, &tet, &[]).unwrap(), 1.0 / 6.0));
        assert!(approx(cell_measure(ElementType::Hexahedron, &CUBE, &[]).unwrap(), 1.0));
        let voxel: Vec<Point3> = [0, 1, 3, 2, 4, 5, 7, 6].iter().map(|&i| CUBE[i]).collect();
        assert!(approx(cell_measure(ElementType::Voxel, &voxel, &[]).unwrap(), 1.0));
        let wedge = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 2.0],
            [1.0, 0.0, 2.0],
            [0.0, 1.0, 2.0],
        ];
        assert!(approx(cell_measure(ElementType::Wedge, &wedge, &[]).unwrap(), 1.0));
        let pyr = [CUBE[0], CUBE[1], CUBE[2], CUBE[3], [0.5, 0.5, 1.0]];
        assert!(approx(cell_measure(ElementType::Pyramid, &pyr, &[]).unwrap(), 1.0 / 3.0));
    }

    #[test]
    fn polyhedron_cube_volume() {
        let faces: Vec<Vec<Point3>> = [
            [0, 3, 2, 1],
            [4, 5, 6, 7],
            [0, 1, 5, 4],
            [1, 2, 6, 5],
            [2, 3, 7, 6],
            [3, 0, 4, 7],
        ]
        .iter()
        .map(|f| f.iter().map(|&i| CUBE[i]).collect())
        .collect();
        let vol = cell_measure(ElementType::Polyhedron, &CUBE, &faces).unwrap();
        assert!(approx(vol, 1.0));
        assert!(approx(faces_area(&faces), 6.0));
        assert!(approx(volume_aspect_ratio(vol, 6.0), 1.0));
    }

    #[test]
    fn wrong_arity_is_an_error() {
        let seg = [[0.0, 0.0, 0.0]];
        assert!(cell_measure(ElementType::Line, &seg, &[]).is_err());
        assert_eq!(volume_aspect_ratio(0.0, 1.0), f64::MAX);
    }
}
