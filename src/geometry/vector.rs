//! Small fixed-size vector helpers on `[f64; 3]`.

/// A point or vector in 3D space.
pub type Point3 = [f64; 3];

#[inline]
pub fn add(a: Point3, b: Point3) -> Point3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale(a: Point3, s: f64) -> Point3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn dot(a: Point3, b: Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: Point3, b: Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: Point3) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub fn distance(a: Point3, b: Point3) -> f64 {
    norm(sub(a, b))
}

/// Unit vector along `a`, or the zero vector when `a` is shorter than `eps`.
pub fn normalize(a: Point3, eps: f64) -> Point3 {
    let len = norm(a);
    if len <= eps { [0.0; 3] } else { scale(a, 1.0 / len) }
}

/// Arithmetic mean of a set of points; the origin for an empty set.
pub fn mean(points: &[Point3]) -> Point3 {
    if points.is_empty() {
        return [0.0; 3];
    }
    let sum = points.iter().fold([0.0; 3], |acc, p| add(acc, *p));
    scale(sum, 1.0 / points.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_is_right_handed() {
        assert_eq!(cross([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn normalize_guards_zero_length() {
        assert_eq!(normalize([0.0, 0.0, 1e-20], 1e-15), [0.0; 3]);
        assert_eq!(normalize([0.0, 3.0, 0.0], 1e-15), [0.0, 1.0, 0.0]);
    }
}
