use super::{gaussian, internal, terms_touching, MoveKind, MoveProposal};
use crate::core::models::conformation::Conformation;
use crate::core::utils::geometry;
use nalgebra::{Point3, Vector3};
use rand::Rng;

const MIN_NORM: f64 = 1e-10;

/// Local frame around the line from a moving bead to a fixed end bead.
struct Hinge {
    axis: Vector3<f64>,
    r0: Vector3<f64>,
    r1: Vector3<f64>,
    span: f64,
}

impl Hinge {
    /// `r0` points from the hinge line towards `anchor`; `None` if the frame is degenerate.
    fn new(anchor: &Point3<f64>, moving: &Point3<f64>, end: &Point3<f64>) -> Option<Self> {
        let line = end - moving;
        let span = line.norm();
        if span < MIN_NORM {
            return None;
        }
        let axis = line / span;
        let w = anchor - moving;
        let perp = w - axis * w.dot(&axis);
        let perp_norm = perp.norm();
        if perp_norm < MIN_NORM {
            return None;
        }
        let r0 = perp / perp_norm;
        let r1 = axis.cross(&r0);
        Some(Self { axis, r0, r1, span })
    }
}

/// Concerted rotation of two consecutive beads between fixed neighbours.
///
/// The first moving bead swings about the preceding bond; the second is rebuilt on the
/// circle that keeps both of its bond lengths, at the same azimuth it had before. When the
/// circle vanishes the chain cannot be closed. The measure of the rebuilt bead on its
/// circle is `l₂ l₃ / d`, so the Jacobian is `d / d'`.
pub fn parrot<R: Rng + ?Sized>(current: &Conformation, sigma: f64, rng: &mut R) -> MoveProposal {
    let n = current.len();
    if n < 5 {
        let mut proposal = internal::axis_torsion(current, sigma, rng);
        proposal.kind = MoveKind::Parrot;
        return proposal;
    }
    let window = rng.gen_range(1..n - 3);
    let reversed = rng.gen_bool(0.5);
    let delta = gaussian(rng, sigma);
    concerted_rotation(current, window, reversed, delta)
}

pub(super) fn concerted_rotation(
    current: &Conformation,
    window: usize,
    reversed: bool,
    delta: f64,
) -> MoveProposal {
    let n = current.len();
    let idx = |k: usize| if reversed { n - 1 - k } else { k };
    let p = current.positions();
    let previous = p[idx(window - 1)];
    let anchor = p[idx(window)];
    let first = p[idx(window + 1)];
    let second = p[idx(window + 2)];
    let end = p[idx(window + 3)];

    let l2 = (second - first).norm();
    let l3 = (end - second).norm();
    let Some(before) = Hinge::new(&anchor, &first, &end) else {
        return MoveProposal::unclosable(MoveKind::Parrot);
    };
    let offset = second - first;
    let psi = offset.dot(&before.r1).atan2(offset.dot(&before.r0));

    let swing = anchor - previous;
    if swing.norm() < MIN_NORM {
        return MoveProposal::unclosable(MoveKind::Parrot);
    }
    let new_first = geometry::rotate_about(
        &first,
        &anchor,
        &geometry::rotation_from_axis_angle(&swing, delta),
    );
    let Some(after) = Hinge::new(&anchor, &new_first, &end) else {
        return MoveProposal::unclosable(MoveKind::Parrot);
    };
    let along = (l2 * l2 - l3 * l3 + after.span * after.span) / (2.0 * after.span);
    let height_sq = l2 * l2 - along * along;
    if !(height_sq >= 0.0) {
        return MoveProposal::unclosable(MoveKind::Parrot);
    }
    let height = height_sq.sqrt();
    let new_second = new_first
        + after.axis * along
        + (after.r0 * psi.cos() + after.r1 * psi.sin()) * height;

    let mut next = current.clone();
    let positions = next.positions_mut();
    positions[idx(window + 1)] = new_first;
    positions[idx(window + 2)] = new_second;
    let (angles, torsions) = terms_touching(&[idx(window + 1), idx(window + 2)], n);
    MoveProposal::new(
        MoveKind::Parrot,
        next,
        angles,
        torsions,
        before.span / after.span,
    )
}
