use nalgebra::{Point3, Rotation3, Unit, Vector3};
use rand::Rng;
use std::f64::consts::PI;

const DEGENERATE_NORM: f64 = 1e-12;

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_radians: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_radians)
}

#[inline]
pub fn rotate_about(point: &Point3<f64>, origin: &Point3<f64>, rotation: &Rotation3<f64>) -> Point3<f64> {
    origin + rotation * (point - origin)
}

/// Bond angle at vertex `b` in radians, in `[0, π]`.
pub fn bond_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ba = a - b;
    let bc = c - b;
    let denom = (ba.norm_squared() * bc.norm_squared()).sqrt();
    if denom < DEGENERATE_NORM {
        return 0.0;
    }
    (ba.dot(&bc) / denom).clamp(-1.0, 1.0).acos()
}

/// Signed dihedral of the four points, reported in `[0, 2π)`.
///
/// The magnitude comes from the angle between the normals `AB×BC` and `BC×CD`; the
/// half-turn is resolved by projecting the first normal onto the far bond `CD`.
pub fn dihedral(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let ab = b - a;
    let bc = c - b;
    let cd = d - c;
    let n1 = ab.cross(&bc);
    let n2 = bc.cross(&cd);
    let y = bc.norm() * n1.dot(&cd);
    let x = n1.dot(&n2);
    let phi = y.atan2(x);
    if phi < 0.0 { phi + 2.0 * PI } else { phi }
}

/// Gradient of [`bond_angle`] with respect to each of the three points.
pub fn bond_angle_gradient(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> [Vector3<f64>; 3] {
    let u = a - b;
    let v = c - b;
    let (lu, lv) = (u.norm(), v.norm());
    if lu < DEGENERATE_NORM || lv < DEGENERATE_NORM {
        return [Vector3::zeros(); 3];
    }
    let (uh, vh) = (u / lu, v / lv);
    let cos = uh.dot(&vh).clamp(-1.0, 1.0);
    let sin = (1.0 - cos * cos).sqrt().max(1e-8);
    let ga = -(vh - uh * cos) / (lu * sin);
    let gc = -(uh - vh * cos) / (lv * sin);
    [ga, -(ga + gc), gc]
}

/// Gradient of [`dihedral`] with respect to each of the four points.
pub fn dihedral_gradient(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> [Vector3<f64>; 4] {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;
    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let (n1sq, n2sq, b2sq) = (n1.norm_squared(), n2.norm_squared(), b2.norm_squared());
    if n1sq < DEGENERATE_NORM || n2sq < DEGENERATE_NORM || b2sq < DEGENERATE_NORM {
        return [Vector3::zeros(); 4];
    }
    let b2n = b2sq.sqrt();
    let ga = -n1 * (b2n / n1sq);
    let gd = n2 * (b2n / n2sq);
    let p = b1.dot(&b2) / b2sq;
    let q = b3.dot(&b2) / b2sq;
    let gb = ga * (p - 1.0) - gd * q;
    let gc = gd * (q - 1.0) - ga * p;
    [ga, gb, gc, gd]
}

/// Uniformly distributed direction on the unit sphere.
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f64> {
    let z: f64 = rng.gen_range(-1.0..1.0);
    let phi: f64 = rng.gen_range(0.0..2.0 * PI);
    let r = (1.0 - z * z).sqrt();
    Vector3::new(r * phi.cos(), r * phi.sin(), z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    const TOLERANCE: f64 = 1e-9;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn bond_angle_of_right_angle_is_half_pi() {
        let angle = bond_angle(&p(1.0, 0.0, 0.0), &p(0.0, 0.0, 0.0), &p(0.0, 1.0, 0.0));
        assert!((angle - PI / 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn dihedral_follows_rotation_of_last_point() {
        for &phi in &[0.3_f64, 1.2, 2.9, 3.5, 5.8] {
            let d = p(phi.cos(), phi.sin(), 1.0);
            let measured = dihedral(&p(1.0, 0.0, -1.0), &p(0.0, 0.0, 0.0), &p(0.0, 0.0, 1.0), &d);
            assert!((measured - phi).abs() < TOLERANCE, "{measured} vs {phi}");
        }
    }

    #[test]
    fn dihedral_is_reported_in_upper_half_turn_when_projection_is_negative() {
        let phi = 1.5 * PI;
        let d = p(phi.cos(), phi.sin(), 1.0);
        let measured = dihedral(&p(1.0, 0.0, -1.0), &p(0.0, 0.0, 0.0), &p(0.0, 0.0, 1.0), &d);
        assert!(measured > PI && measured < 2.0 * PI);
    }

    fn numerical_gradient<F: Fn(&[Point3<f64>]) -> f64>(f: F, points: &[Point3<f64>]) -> Vec<Vector3<f64>> {
        let h = 1e-6;
        let mut grads = Vec::new();
        for i in 0..points.len() {
            let mut g = Vector3::zeros();
            for k in 0..3 {
                let mut plus = points.to_vec();
                let mut minus = points.to_vec();
                plus[i][k] += h;
                minus[i][k] -= h;
                g[k] = (f(&plus) - f(&minus)) / (2.0 * h);
            }
            grads.push(g);
        }
        grads
    }

    #[test]
    fn bond_angle_gradient_matches_finite_differences() {
        let pts = [p(1.2, 0.1, -0.3), p(0.0, 0.2, 0.1), p(0.4, 1.3, 0.5)];
        let analytic = bond_angle_gradient(&pts[0], &pts[1], &pts[2]);
        let numeric = numerical_gradient(|q| bond_angle(&q[0], &q[1], &q[2]), &pts);
        for (a, n) in analytic.iter().zip(numeric.iter()) {
            assert!((a - n).norm() < 1e-5);
        }
    }

    #[test]
    fn dihedral_gradient_matches_finite_differences() {
        let pts = [
            p(1.1, 0.2, -0.9),
            p(0.1, -0.1, 0.0),
            p(0.0, 0.3, 1.2),
            p(-0.7, 1.0, 1.6),
        ];
        let analytic = dihedral_gradient(&pts[0], &pts[1], &pts[2], &pts[3]);
        let numeric = numerical_gradient(|q| dihedral(&q[0], &q[1], &q[2], &q[3]), &pts);
        for (a, n) in analytic.iter().zip(numeric.iter()) {
            assert!((a - n).norm() < 1e-5);
        }
    }

    #[test]
    fn random_unit_vectors_have_unit_length() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        for _ in 0..100 {
            assert!((random_unit_vector(&mut rng).norm() - 1.0).abs() < TOLERANCE);
        }
    }

    #[test]
    fn rotate_about_keeps_distance_to_origin() {
        let origin = p(1.0, 1.0, 1.0);
        let point = p(2.0, 3.0, -1.0);
        let rot = rotation_from_axis_angle(&Vector3::new(0.3, -0.2, 1.0), 0.8);
        let moved = rotate_about(&point, &origin, &rot);
        assert!(((moved - origin).norm() - (point - origin).norm()).abs() < TOLERANCE);
    }
}
