use super::conformation::Conformation;
use crate::core::utils::geometry;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Planar adsorbing surface: lattice sites in the `z = 0` plane, periodic in x and y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceLattice {
    sites: Vec<Point3<f64>>,
    x_length: f64,
    y_length: f64,
    x_period: f64,
    y_period: f64,
}

impl SurfaceLattice {
    pub fn new(
        sites: Vec<Point3<f64>>,
        x_length: f64,
        y_length: f64,
        x_period: f64,
        y_period: f64,
    ) -> Self {
        Self {
            sites,
            x_length,
            y_length,
            x_period,
            y_period,
        }
    }

    /// Hexagonally packed sites covering `x_size × y_size`, centred on the origin.
    ///
    /// Rows are `spacing·√3/2` apart and alternate their x offset by half a spacing, so
    /// the lattice repeats every `spacing` in x and every two rows in y. The fold extent
    /// is the covered area minus `margin` on each axis.
    pub fn hexagonal(x_size: f64, y_size: f64, spacing: f64, margin: f64) -> Self {
        let row_height = spacing * 3f64.sqrt() / 2.0;
        let per_row = (x_size / spacing).floor().max(1.0) as usize;
        let rows = (y_size / row_height).floor().max(1.0) as usize;

        let mut sites = Vec::with_capacity(per_row * rows);
        let mut row_start = Point3::origin();
        for row in 0..rows {
            if row > 0 {
                let shift = if (row - 1) % 2 == 0 { 0.5 } else { -0.5 };
                row_start += Vector3::new(shift * spacing, row_height, 0.0);
            }
            for col in 0..per_row {
                sites.push(row_start + Vector3::new(col as f64 * spacing, 0.0, 0.0));
            }
        }

        let centre = sites
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / sites.len() as f64;
        for site in &mut sites {
            *site -= centre;
        }

        Self::new(
            sites,
            x_size - margin,
            y_size - margin,
            spacing,
            2.0 * row_height,
        )
    }

    #[inline]
    pub fn sites(&self) -> &[Point3<f64>] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn x_length(&self) -> f64 {
        self.x_length
    }

    pub fn y_length(&self) -> f64 {
        self.y_length
    }

    /// Shifts the whole chain by lattice periods until it lies inside the fold extent.
    ///
    /// Returns `true` when the chain was moved.
    pub fn fold(&self, conformation: &mut Conformation) -> bool {
        let dx = fold_shift(
            conformation.positions().iter().map(|p| p.x),
            self.x_length,
            self.x_period,
        );
        let dy = fold_shift(
            conformation.positions().iter().map(|p| p.y),
            self.y_length,
            self.y_period,
        );
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        conformation.translate(&Vector3::new(dx, dy, 0.0));
        true
    }

    /// Randomly orients the chain and lifts it so its lowest bead sits `clearance` above
    /// the surface plane.
    pub fn place_above<R: Rng + ?Sized>(
        &self,
        conformation: &mut Conformation,
        clearance: f64,
        rng: &mut R,
    ) {
        let axis = geometry::random_unit_vector(rng);
        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
        let rotation = geometry::rotation_from_axis_angle(&axis, angle);
        let centre = conformation.centroid();
        conformation.rotate_about(&centre, &rotation);
        let lift = clearance - conformation.min_z();
        conformation.translate(&Vector3::new(-centre.x, -centre.y, lift));
    }
}

fn fold_shift(values: impl Iterator<Item = f64>, length: f64, period: f64) -> f64 {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let half = 0.5 * length;
    if max > half {
        -((max - half) / period).ceil() * period
    } else if min < -half {
        ((-half - min) / period).ceil() * period
    } else {
        0.0
    }
}
