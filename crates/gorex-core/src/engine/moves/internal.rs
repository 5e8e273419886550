use super::{gaussian, MoveKind, MoveProposal};
use crate::core::models::conformation::Conformation;
use crate::core::utils::geometry;
use rand::Rng;
use std::f64::consts::PI;

const MIN_AXIS_NORM: f64 = 1e-10;

/// Opens or closes the bond angle at a random internal bead by a Gaussian amount.
///
/// One arm, chosen at random, is rotated rigidly about the angle's normal. The proposal is
/// symmetric in the angle, so the Cartesian volume element leaves `sin θ' / sin θ`.
pub fn bend<R: Rng + ?Sized>(current: &Conformation, sigma: f64, rng: &mut R) -> MoveProposal {
    let vertex = rng.gen_range(1..current.len() - 1);
    let upper = rng.gen_bool(0.5);
    let delta = gaussian(rng, sigma);
    bend_at(current, vertex, upper, delta)
}

pub(super) fn bend_at(current: &Conformation, vertex: usize, upper: bool, delta: f64) -> MoveProposal {
    let n = current.len();
    let p = current.positions();
    let pivot = p[vertex];
    let normal = (p[vertex - 1] - pivot).cross(&(p[vertex + 1] - pivot));
    if normal.norm() < MIN_AXIS_NORM {
        return MoveProposal::unclosable(MoveKind::Bend);
    }
    let theta = current.angle(vertex - 1);
    let new_theta = theta + delta;
    if !(new_theta > 0.0 && new_theta < PI) {
        return MoveProposal::unclosable(MoveKind::Bend);
    }

    let mut next = current.clone();
    if upper {
        let rotation = geometry::rotation_from_axis_angle(&normal, delta);
        next.rotate_range_about(vertex + 1..n, &pivot, &rotation);
    } else {
        let rotation = geometry::rotation_from_axis_angle(&normal, -delta);
        next.rotate_range_about(0..vertex, &pivot, &rotation);
    }
    let jacobian = new_theta.sin() / theta.sin();
    MoveProposal::new(MoveKind::Bend, next, vec![vertex - 1], Vec::new(), jacobian)
}

/// Twists one side of the chain about a random bond.
pub fn axis_torsion<R: Rng + ?Sized>(current: &Conformation, sigma: f64, rng: &mut R) -> MoveProposal {
    let torsion = rng.gen_range(0..current.len() - 3);
    let upper = rng.gen_bool(0.5);
    let delta = gaussian(rng, sigma);
    twist(current, torsion, upper, delta)
}

/// Rotates the beads beyond torsion `torsion`'s central bond by `delta` about that bond.
pub(super) fn twist(current: &Conformation, torsion: usize, upper: bool, delta: f64) -> MoveProposal {
    let n = current.len();
    let p = current.positions();
    let origin = p[torsion + 1];
    let axis = p[torsion + 2] - origin;
    if axis.norm() < MIN_AXIS_NORM {
        return MoveProposal::unclosable(MoveKind::Torsion);
    }
    let rotation = geometry::rotation_from_axis_angle(&axis, delta);
    let mut next = current.clone();
    if upper {
        next.rotate_range_about(torsion + 3..n, &origin, &rotation);
    } else {
        next.rotate_range_about(0..torsion + 1, &origin, &rotation.inverse());
    }
    MoveProposal::new(MoveKind::Torsion, next, Vec::new(), vec![torsion], 1.0)
}

/// Rotates every internal bead about the axis through its two neighbours.
///
/// Beads of one parity are moved first, then the other; the order is chosen at random so
/// that the reverse sweep is itself a proposable move.
pub fn crankshaft<R: Rng + ?Sized>(current: &Conformation, sigma: f64, rng: &mut R) -> MoveProposal {
    let n = current.len();
    let odd_first = rng.gen_bool(0.5);
    let angles: Vec<f64> = (0..n - 2).map(|_| gaussian(rng, sigma)).collect();
    match crank_sweep(current, odd_first, &angles) {
        Some(next) => MoveProposal::new(
            MoveKind::Crankshaft,
            next,
            (0..n - 2).collect(),
            (0..n - 3).collect(),
            1.0,
        ),
        None => MoveProposal::unclosable(MoveKind::Crankshaft),
    }
}

/// `angles[i - 1]` is the rotation applied to internal bead `i`.
pub(super) fn crank_sweep(current: &Conformation, odd_first: bool, angles: &[f64]) -> Option<Conformation> {
    let n = current.len();
    let order = if odd_first { [1, 2] } else { [2, 1] };
    let mut next = current.clone();
    for start in order {
        for bead in (start..n - 1).step_by(2) {
            let p = next.positions();
            let origin = p[bead - 1];
            let axis = p[bead + 1] - origin;
            if axis.norm() < MIN_AXIS_NORM {
                return None;
            }
            let rotation = geometry::rotation_from_axis_angle(&axis, angles[bead - 1]);
            let moved = geometry::rotate_about(&p[bead], &origin, &rotation);
            next.positions_mut()[bead] = moved;
        }
    }
    Some(next)
}
