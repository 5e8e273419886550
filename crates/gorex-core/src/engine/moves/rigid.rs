use super::{gaussian, MoveKind, MoveProposal};
use crate::core::models::conformation::Conformation;
use crate::core::utils::geometry;
use nalgebra::Vector3;
use rand::Rng;

/// Shifts the whole chain by a Gaussian displacement of width `sigma` Å per axis.
pub fn translation<R: Rng + ?Sized>(current: &Conformation, sigma: f64, rng: &mut R) -> MoveProposal {
    let shift = Vector3::new(
        gaussian(rng, sigma),
        gaussian(rng, sigma),
        gaussian(rng, sigma),
    );
    let mut next = current.clone();
    next.translate(&shift);
    MoveProposal::new(MoveKind::Translation, next, Vec::new(), Vec::new(), 1.0)
}

/// Rotates the whole chain about its centre of mass around a uniformly random axis.
pub fn rotation<R: Rng + ?Sized>(
    current: &Conformation,
    masses: &[f64],
    sigma: f64,
    rng: &mut R,
) -> MoveProposal {
    let axis = geometry::random_unit_vector(rng);
    let angle = gaussian(rng, sigma);
    let centre = current.center_of_mass(masses);
    let mut next = current.clone();
    next.rotate_about(&centre, &geometry::rotation_from_axis_angle(&axis, angle));
    MoveProposal::new(MoveKind::Rotation, next, Vec::new(), Vec::new(), 1.0)
}
