use super::potentials::FourierTerm;
use crate::core::models::conformation::Conformation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const TERMS_PER_TORSION: usize = 4;
pub const MIN_BEADS: usize = 4;
pub const DEFAULT_BEAD_MASS: f64 = 110.0;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AngleParam {
    pub force_constant: f64,
    /// Equilibrium angle in degrees.
    pub theta0: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TorsionParam {
    /// `[amplitude, periodicity, phase in degrees]` per Fourier term.
    pub terms: Vec<[f64; 3]>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NativeContact {
    pub i: usize,
    pub j: usize,
    pub depth: f64,
    pub radius: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NonNativeParams {
    pub depth: f64,
    pub radii: Vec<f64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SurfaceParams {
    pub depths: Vec<f64>,
    pub radii: Vec<f64>,
}

/// On-disk layout of a parameter file. Bead indices are zero-based.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParameterFile {
    pub angles: Vec<AngleParam>,
    pub torsions: Vec<TorsionParam>,
    pub nonnative: NonNativeParams,
    #[serde(default)]
    pub contacts: Vec<NativeContact>,
    #[serde(default)]
    pub masses: Option<Vec<f64>>,
    #[serde(default)]
    pub bonds: Option<Vec<f64>>,
    #[serde(default)]
    pub surface: Option<SurfaceParams>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleTerm {
    pub force_constant: f64,
    /// Radians.
    pub theta0: f64,
}

/// Parameters for one non-local pair. Exactly one family applies per pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PairParam {
    Native { depth: f64, sigma: f64 },
    NonNative { sigma: f64 },
}

impl PairParam {
    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self, PairParam::Native { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceTerm {
    pub depth: f64,
    pub radius: f64,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid parameters in '{path}': {source}")]
    Invalid {
        path: String,
        source: ParameterError,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("A chain needs at least {min} beads, found {found}")]
    TooFewBeads { min: usize, found: usize },
    #[error("Expected {expected} {what} entries for {beads} beads, found {found}")]
    DimensionMismatch {
        what: &'static str,
        beads: usize,
        expected: usize,
        found: usize,
    },
    #[error("Native contact ({i}, {j}) is not a non-local pair of a {beads}-bead chain")]
    InvalidContact { i: usize, j: usize, beads: usize },
    #[error("Native contact ({i}, {j}) is listed more than once")]
    DuplicateContact { i: usize, j: usize },
    #[error("Torsion {index} has {found} Fourier terms, at most {TERMS_PER_TORSION} are allowed")]
    TooManyTorsionTerms { index: usize, found: usize },
    #[error("Invalid value for {what}: {value}")]
    InvalidValue { what: &'static str, value: f64 },
    #[error("Parameter section '{0}' is required but missing")]
    MissingSection(&'static str),
}

/// Simulation-wide constants of one Go-model chain.
///
/// Angle `i` spans beads `i, i+1, i+2`; torsion `i` spans beads `i..=i+3`. Non-local pairs
/// `(i, j)` with `j ≥ i + 3` are numbered row by row, so pair `(0, 3)` is index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    bead_count: usize,
    angles: Vec<AngleTerm>,
    torsions: Vec<[FourierTerm; TERMS_PER_TORSION]>,
    pairs: Vec<PairParam>,
    pair_offsets: Vec<usize>,
    native_pairs: Vec<(usize, usize, usize)>,
    nonnative_depth: f64,
    masses: Vec<f64>,
    bond_lengths: Option<Vec<f64>>,
    surface: Option<Vec<SurfaceTerm>>,
}

impl ParameterTable {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let file: ParameterFile = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path_str.clone(),
            source: e,
        })?;
        Self::from_file(file).map_err(|e| ParamLoadError::Invalid {
            path: path_str,
            source: e,
        })
    }

    pub fn from_file(file: ParameterFile) -> Result<Self, ParameterError> {
        let beads = file.angles.len() + 2;
        if beads < MIN_BEADS {
            return Err(ParameterError::TooFewBeads {
                min: MIN_BEADS,
                found: beads,
            });
        }
        check_len("torsion", beads, beads - 3, file.torsions.len())?;
        check_len("nonnative radius", beads, beads, file.nonnative.radii.len())?;
        if let Some(masses) = &file.masses {
            check_len("mass", beads, beads, masses.len())?;
            if let Some(&bad) = masses.iter().find(|m| !(m.is_finite() && **m > 0.0)) {
                return Err(ParameterError::InvalidValue {
                    what: "mass",
                    value: bad,
                });
            }
        }
        if let Some(bonds) = &file.bonds {
            check_len("bond", beads, beads - 1, bonds.len())?;
        }
        if let Some(surface) = &file.surface {
            check_len("surface depth", beads, beads, surface.depths.len())?;
            check_len("surface radius", beads, beads, surface.radii.len())?;
        }
        if !file.nonnative.depth.is_finite() {
            return Err(ParameterError::InvalidValue {
                what: "nonnative depth",
                value: file.nonnative.depth,
            });
        }

        let angles = file
            .angles
            .iter()
            .map(|a| AngleTerm {
                force_constant: a.force_constant,
                theta0: a.theta0.to_radians(),
            })
            .collect();

        let torsions = file
            .torsions
            .iter()
            .enumerate()
            .map(|(index, t)| {
                if t.terms.len() > TERMS_PER_TORSION {
                    return Err(ParameterError::TooManyTorsionTerms {
                        index,
                        found: t.terms.len(),
                    });
                }
                let mut terms = [FourierTerm::default(); TERMS_PER_TORSION];
                for (slot, &[amplitude, periodicity, phase]) in terms.iter_mut().zip(&t.terms) {
                    *slot = FourierTerm {
                        amplitude,
                        periodicity,
                        phase: phase.to_radians(),
                    };
                }
                Ok(terms)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pair_offsets = pair_offsets(beads);
        let radii = &file.nonnative.radii;
        let mut pairs = Vec::with_capacity(pair_count(beads));
        for i in 0..beads {
            for j in (i + 3)..beads {
                pairs.push(PairParam::NonNative {
                    sigma: radii[i] + radii[j],
                });
            }
        }

        let mut native_pairs = Vec::with_capacity(file.contacts.len());
        for contact in &file.contacts {
            let (i, j) = (contact.i.min(contact.j), contact.i.max(contact.j));
            if j >= beads || j < i + 3 {
                return Err(ParameterError::InvalidContact { i, j, beads });
            }
            let k = pair_offsets[i] + (j - i - 3);
            if pairs[k].is_native() {
                return Err(ParameterError::DuplicateContact { i, j });
            }
            pairs[k] = PairParam::Native {
                depth: contact.depth,
                sigma: contact.radius,
            };
            native_pairs.push((i, j, k));
        }
        native_pairs.sort_unstable_by_key(|&(_, _, k)| k);

        let surface = file.surface.map(|s| {
            s.depths
                .into_iter()
                .zip(s.radii)
                .map(|(depth, radius)| SurfaceTerm { depth, radius })
                .collect()
        });

        Ok(Self {
            bead_count: beads,
            angles,
            torsions,
            pairs,
            pair_offsets,
            native_pairs,
            nonnative_depth: file.nonnative.depth,
            masses: file.masses.unwrap_or_else(|| vec![DEFAULT_BEAD_MASS; beads]),
            bond_lengths: file.bonds,
            surface,
        })
    }

    /// Fills in missing bond lengths from a reference conformation.
    pub fn with_bond_lengths_from(mut self, conformation: &Conformation) -> Result<Self, ParameterError> {
        self.check_conformation(conformation)?;
        if self.bond_lengths.is_none() {
            self.bond_lengths = Some(conformation.bond_lengths());
        }
        Ok(self)
    }

    pub fn check_conformation(&self, conformation: &Conformation) -> Result<(), ParameterError> {
        check_len("coordinate", self.bead_count, self.bead_count, conformation.len())
    }

    #[inline]
    pub fn bead_count(&self) -> usize {
        self.bead_count
    }

    #[inline]
    pub fn angle_count(&self) -> usize {
        self.angles.len()
    }

    #[inline]
    pub fn torsion_count(&self) -> usize {
        self.torsions.len()
    }

    #[inline]
    pub fn angle(&self, index: usize) -> &AngleTerm {
        &self.angles[index]
    }

    #[inline]
    pub fn torsion(&self, index: usize) -> &[FourierTerm; TERMS_PER_TORSION] {
        &self.torsions[index]
    }

    #[inline]
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn pair(&self, index: usize) -> &PairParam {
        &self.pairs[index]
    }

    /// Index of the non-local pair `(i, j)`, `None` for bonded or 1-3 neighbours.
    #[inline]
    pub fn pair_index(&self, i: usize, j: usize) -> Option<usize> {
        let (i, j) = (i.min(j), i.max(j));
        (j >= i + 3 && j < self.bead_count).then(|| self.pair_offsets[i] + (j - i - 3))
    }

    /// Native contacts as `(i, j, pair index)`, ordered by pair index.
    #[inline]
    pub fn native_pairs(&self) -> &[(usize, usize, usize)] {
        &self.native_pairs
    }

    #[inline]
    pub fn nonnative_depth(&self) -> f64 {
        self.nonnative_depth
    }

    #[inline]
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    #[inline]
    pub fn bond_lengths(&self) -> Option<&[f64]> {
        self.bond_lengths.as_deref()
    }

    #[inline]
    pub fn surface_terms(&self) -> Option<&[SurfaceTerm]> {
        self.surface.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct CoordinateRecord {
    x: f64,
    y: f64,
    z: f64,
}

/// Reads bead coordinates from a CSV file with `x,y,z` columns, one row per bead.
pub fn load_coordinates(path: &Path) -> Result<Conformation, ParamLoadError> {
    let path_str = path.to_string_lossy().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ParamLoadError::Csv {
            path: path_str.clone(),
            source: e,
        })?;

    let mut coords = Vec::new();
    for result in reader.deserialize::<CoordinateRecord>() {
        let record = result.map_err(|e| ParamLoadError::Csv {
            path: path_str.clone(),
            source: e,
        })?;
        coords.push([record.x, record.y, record.z]);
    }
    Ok(Conformation::from(coords))
}

pub fn pair_count(beads: usize) -> usize {
    if beads < 3 {
        return 0;
    }
    (beads - 2) * (beads - 3) / 2
}

fn pair_offsets(beads: usize) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(beads);
    let mut acc = 0;
    for i in 0..beads {
        offsets.push(acc);
        acc += beads.saturating_sub(i + 3);
    }
    offsets
}

fn check_len(
    what: &'static str,
    beads: usize,
    expected: usize,
    found: usize,
) -> Result<(), ParameterError> {
    if expected == found {
        Ok(())
    } else {
        Err(ParameterError::DimensionMismatch {
            what,
            beads,
            expected,
            found,
        })
    }
}
