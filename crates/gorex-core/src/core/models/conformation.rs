use crate::core::utils::geometry;
use nalgebra::{Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Ordered bead positions of one chain. Index order is chain order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conformation {
    positions: Vec<Point3<f64>>,
}

impl Conformation {
    pub fn new(positions: Vec<Point3<f64>>) -> Self {
        Self { positions }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    #[inline]
    pub fn positions_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.positions
    }

    #[inline]
    pub fn position(&self, index: usize) -> &Point3<f64> {
        &self.positions[index]
    }

    pub fn centroid(&self) -> Point3<f64> {
        let sum = self
            .positions
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.positions.len().max(1) as f64)
    }

    pub fn center_of_mass(&self, masses: &[f64]) -> Point3<f64> {
        let (weighted, total) = self
            .positions
            .iter()
            .zip(masses)
            .fold((Vector3::zeros(), 0.0), |(acc, m_tot), (p, &m)| {
                (acc + p.coords * m, m_tot + m)
            });
        if total <= 0.0 {
            return self.centroid();
        }
        Point3::from(weighted / total)
    }

    pub fn translate(&mut self, shift: &Vector3<f64>) {
        for p in &mut self.positions {
            *p += shift;
        }
    }

    pub fn rotate_about(&mut self, origin: &Point3<f64>, rotation: &Rotation3<f64>) {
        self.rotate_range_about(0..self.positions.len(), origin, rotation);
    }

    pub fn rotate_range_about(
        &mut self,
        range: std::ops::Range<usize>,
        origin: &Point3<f64>,
        rotation: &Rotation3<f64>,
    ) {
        for p in &mut self.positions[range] {
            *p = geometry::rotate_about(p, origin, rotation);
        }
    }

    /// Bond angle with vertex at bead `index + 1`.
    pub fn angle(&self, index: usize) -> f64 {
        let p = &self.positions;
        geometry::bond_angle(&p[index], &p[index + 1], &p[index + 2])
    }

    /// Dihedral about the bond between beads `index + 1` and `index + 2`.
    pub fn torsion(&self, index: usize) -> f64 {
        let p = &self.positions;
        geometry::dihedral(&p[index], &p[index + 1], &p[index + 2], &p[index + 3])
    }

    pub fn bond_lengths(&self) -> Vec<f64> {
        self.positions
            .windows(2)
            .map(|w| (w[1] - w[0]).norm())
            .collect()
    }

    /// Indices of beads whose position differs from `other`.
    pub fn moved_beads(&self, other: &Conformation) -> Vec<usize> {
        self.positions
            .iter()
            .zip(other.positions.iter())
            .enumerate()
            .filter_map(|(i, (a, b))| (a != b).then_some(i))
            .collect()
    }

    pub fn is_finite(&self) -> bool {
        self.positions
            .iter()
            .all(|p| p.coords.iter().all(|c| c.is_finite()))
    }

    pub fn min_z(&self) -> f64 {
        self.positions
            .iter()
            .map(|p| p.z)
            .fold(f64::INFINITY, f64::min)
    }
}

impl From<Vec<[f64; 3]>> for Conformation {
    fn from(coords: Vec<[f64; 3]>) -> Self {
        Self::new(coords.into_iter().map(Point3::from).collect())
    }
}
