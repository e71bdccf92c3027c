//! Computational geometry primitives: closest points with barycentric weights,
//! point containment tests and planar polygon measures.
//!
//! Closest-point routines return the projected point together with the
//! barycentric weights of the element vertices, so callers can blend
//! per-vertex quantities (normals) at the projection.

use super::vector::{Point3, add, cross, dot, norm, scale, sub};

const DEGENERATE: f64 = 1e-300;

/// Closest point on segment `ab` and its weights `[1 - t, t]`.
pub fn project_point_segment(p: Point3, a: Point3, b: Point3) -> (Point3, [f64; 2]) {
    let ab = sub(b, a);
    let len2 = dot(ab, ab);
    let t = if len2 <= DEGENERATE {
        0.0
    } else {
        (dot(sub(p, a), ab) / len2).clamp(0.0, 1.0)
    };
    (add(a, scale(ab, t)), [1.0 - t, t])
}

/// Closest point on triangle `abc` and its barycentric weights.
pub fn project_point_triangle(p: Point3, a: Point3, b: Point3, c: Point3) -> (Point3, [f64; 3]) {
    let ab = sub(b, a);
    let ac = sub(c, a);
    let ap = sub(p, a);
    let d1 = dot(ab, ap);
    let d2 = dot(ac, ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (a, [1.0, 0.0, 0.0]);
    }

    let bp = sub(p, b);
    let d3 = dot(ab, bp);
    let d4 = dot(ac, bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (b, [0.0, 1.0, 0.0]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 && (d1 - d3) > DEGENERATE {
        let v = d1 / (d1 - d3);
        return (add(a, scale(ab, v)), [1.0 - v, v, 0.0]);
    }

    let cp = sub(p, c);
    let d5 = dot(ab, cp);
    let d6 = dot(ac, cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (c, [0.0, 0.0, 1.0]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 && (d2 - d6) > DEGENERATE {
        let w = d2 / (d2 - d6);
        return (add(a, scale(ac, w)), [1.0 - w, 0.0, w]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 && ((d4 - d3) + (d5 - d6)) > DEGENERATE {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (add(b, scale(sub(c, b), w)), [0.0, 1.0 - w, w]);
    }

    let sum = va + vb + vc;
    if sum.abs() <= DEGENERATE {
        return project_degenerate_triangle(p, a, b, c);
    }
    let v = vb / sum;
    let w = vc / sum;
    (add(a, add(scale(ab, v), scale(ac, w))), [1.0 - v - w, v, w])
}

// Collapsed triangle: best of its three edges.
fn project_degenerate_triangle(p: Point3, a: Point3, b: Point3, c: Point3) -> (Point3, [f64; 3]) {
    let (xab, lab) = project_point_segment(p, a, b);
    let (xbc, lbc) = project_point_segment(p, b, c);
    let (xca, lca) = project_point_segment(p, c, a);
    let dab = norm(sub(p, xab));
    let dbc = norm(sub(p, xbc));
    let dca = norm(sub(p, xca));
    if dab <= dbc && dab <= dca {
        (xab, [lab[0], lab[1], 0.0])
    } else if dbc <= dca {
        (xbc, [0.0, lbc[0], lbc[1]])
    } else {
        (xca, [lca[1], 0.0, lca[0]])
    }
}

/// Closest point on a planar polygon, via a fan split from its first vertex.
///
/// The weights have one entry per polygon vertex.
pub fn project_point_polygon(p: Point3, vertices: &[Point3]) -> (Point3, Vec<f64>) {
    match vertices.len() {
        0 => (p, Vec::new()),
        1 => (vertices[0], vec![1.0]),
        2 => {
            let (x, l) = project_point_segment(p, vertices[0], vertices[1]);
            (x, l.to_vec())
        }
        n => {
            let mut best = (f64::MAX, vertices[0], 1usize, [1.0, 0.0, 0.0]);
            for i in 1..n - 1 {
                let (x, l) = project_point_triangle(p, vertices[0], vertices[i], vertices[i + 1]);
                let d = norm(sub(p, x));
                if d < best.0 {
                    best = (d, x, i, l);
                }
            }
            let (_, x, i, l) = best;
            let mut lambda = vec![0.0; n];
            lambda[0] += l[0];
            lambda[i] += l[1];
            lambda[i + 1] += l[2];
            (x, lambda)
        }
    }
}

/// Distance from `p` to a point, segment or polygon given by its vertices.
pub fn distance_point_element(p: Point3, vertices: &[Point3]) -> f64 {
    let (x, _) = project_point_polygon(p, vertices);
    norm(sub(p, x))
}

/// True when `p` lies on segment `ab` within `tol`.
pub fn is_point_inside_segment(p: Point3, a: Point3, b: Point3, tol: f64) -> bool {
    let (x, _) = project_point_segment(p, a, b);
    norm(sub(p, x)) <= tol
}

/// True when `p` lies on the plane of triangle `abc` and inside it, within `tol`.
pub fn is_point_inside_triangle(p: Point3, a: Point3, b: Point3, c: Point3, tol: f64) -> bool {
    let (x, _) = project_point_triangle(p, a, b, c);
    norm(sub(p, x)) <= tol
}

/// True when `p` lies inside one fan triangle of the polygon, within `tol`.
pub fn is_point_inside_polygon(p: Point3, vertices: &[Point3], tol: f64) -> bool {
    match vertices.len() {
        0 => false,
        1 => norm(sub(p, vertices[0])) <= tol,
        2 => is_point_inside_segment(p, vertices[0], vertices[1], tol),
        n => (1..n - 1)
            .any(|i| is_point_inside_triangle(p, vertices[0], vertices[i], vertices[i + 1], tol)),
    }
}

/// Newell area vector of a closed polygon loop; its length is twice the area.
pub fn newell_vector(vertices: &[Point3]) -> Point3 {
    let n = vertices.len();
    let mut acc = [0.0; 3];
    for i in 0..n {
        acc = add(acc, cross(vertices[i], vertices[(i + 1) % n]));
    }
    acc
}

/// Area of a planar polygon loop (triangle, quad, n-gon).
pub fn polygon_area(vertices: &[Point3]) -> f64 {
    0.5 * norm(newell_vector(vertices))
}

/// Signed volume of tetrahedron `abcd`.
pub fn signed_tet_volume(a: Point3, b: Point3, c: Point3, d: Point3) -> f64 {
    dot(sub(b, a), cross(sub(c, a), sub(d, a))) / 6.0
}

/// True when `p` is on the inner side of every face plane (within `tol`).
///
/// Faces are vertex loops; each plane is oriented away from `interior`.
pub fn is_point_inside_convex(p: Point3, faces: &[Vec<Point3>], interior: Point3, tol: f64) -> bool {
    faces.iter().all(|face| {
        if face.len() < 3 {
            return true;
        }
        let mut n = newell_vector(face);
        if dot(n, sub(face[0], interior)) < 0.0 {
            n = scale(n, -1.0);
        }
        let len = norm(n);
        len <= DEGENERATE || dot(sub(p, face[0]), n) / len <= tol
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    #[test]
    fn triangle_regions() {
        let (a, b, c) = ([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let (x, l) = project_point_triangle([0.25, 0.25, 2.0], a, b, c);
        assert!(approx(x[2], 0.0) && approx(x[0], 0.25));
        assert!(approx(l.iter().sum::<f64>(), 1.0));
        let (x, l) = project_point_triangle([-1.0, -1.0, 0.0], a, b, c);
        assert_eq!(x, a);
        assert_eq!(l, [1.0, 0.0, 0.0]);
        let (x, _) = project_point_triangle([1.0, 1.0, 0.0], a, b, c);
        assert!(approx(x[0], 0.5) && approx(x[1], 0.5));
    }

    #[test]
    fn polygon_weights_sum_to_one() {
        let square = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let (x, l) = project_point_polygon([0.9, 0.8, -3.0], &square);
        assert!(approx(x[0], 0.9) && approx(x[1], 0.8));
        assert_eq!(l.len(), 4);
        assert!(approx(l.iter().sum::<f64>(), 1.0));
        assert!(approx(polygon_area(&square), 1.0));
    }

    #[test]
    fn containment_tests() {
        let (a, b, c) = ([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        assert!(is_point_inside_triangle([0.2, 0.2, 0.0], a, b, c, 1e-12));
        assert!(!is_point_inside_triangle([0.2, 0.2, 1e-6], a, b, c, 1e-12));
        assert!(!is_point_inside_triangle([0.8, 0.8, 0.0], a, b, c, 1e-12));
        assert!(is_point_inside_segment([0.5, 0.0, 0.0], a, b, 1e-12));
        let square = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        assert!(is_point_inside_polygon([0.9, 0.9, 0.0], &square, 1e-12));
    }

    #[test]
    fn convex_containment() {
        let cube: Vec<Vec<Point3>> = vec![
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            vec![[0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
            vec![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]],
            vec![[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 0.0, 1.0]],
        ];
        let center = [0.5, 0.5, 0.5];
        assert!(is_point_inside_convex([0.1, 0.9, 0.5], &cube, center, 1e-12));
        assert!(!is_point_inside_convex([1.1, 0.5, 0.5], &cube, center, 1e-12));
        assert!(approx(signed_tet_volume(
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]
        ), 1.0 / 6.0));
    }
}
