use core::f64::consts::PI;

use fd_core::Error;
use serde::{Deserialize, Serialize};

/// Curved (equi-angular) detector seen from the source.
///
/// Conventions:
/// - `dsd` is the source-to-detector distance in mm.
/// - `arclength` is the full angular span of the detector in radians.
/// - Curved column `d` spans `[d, d + 1)` in angular units of
///   `arclength / n`, measured from the left detector edge.
/// - The flat detector is tangent to the arc at the centre and sampled at
///   `oversample` times the pitch of the central curved pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvedDetector {
    pub dsd: f64,
    pub arclength: f64,
    #[serde(default = "default_oversample")]
    pub oversample: u32,
}

fn default_oversample() -> u32 {
    1
}

impl CurvedDetector {
    pub fn new(dsd: f64, arclength: f64) -> Self {
        Self {
            dsd,
            arclength,
            oversample: 1,
        }
    }

    pub fn with_oversample(mut self, oversample: u32) -> Self {
        self.oversample = oversample;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.dsd.is_finite() || self.dsd <= 0.0 {
            return Err(Error::InvalidGeometry(
                "source-to-detector distance must be finite and > 0",
            ));
        }
        if !self.arclength.is_finite() || self.arclength <= 0.0 || self.arclength >= PI {
            return Err(Error::InvalidGeometry("arclength must lie in (0, pi)"));
        }
        if self.oversample == 0 {
            return Err(Error::InvalidGeometry("oversample must be >= 1"));
        }
        Ok(())
    }

    /// Angular width of one curved column.
    pub fn pixel_arclength(&self, orig_num_detectors: usize) -> f64 {
        self.arclength / orig_num_detectors as f64
    }

    /// Flat-detector sample positions in mm, symmetric about the centre.
    ///
    /// Odd detectors keep a sample on the centreline; even detectors place
    /// the two central samples half a pitch either side of it.
    pub fn flat_positions(&self, orig_num_detectors: usize) -> Result<Vec<f64>, Error> {
        self.validate()?;
        if orig_num_detectors == 0 {
            return Err(Error::EmptyDetector);
        }

        let odd = orig_num_detectors % 2 == 1;
        let pixel_arclength = self.pixel_arclength(orig_num_detectors);

        let mut pitch = if odd {
            pixel_arclength.tan() * self.dsd
        } else {
            (pixel_arclength / 2.0).tan() * self.dsd * 2.0
        };
        pitch /= self.oversample as f64;
        let total = (self.arclength / 2.0).tan() * self.dsd * 2.0;

        let start = if odd { pitch } else { pitch / 2.0 };
        let half = arange(start, total / 2.0, pitch);

        let mut positions = Vec::with_capacity(2 * half.len() + usize::from(odd));
        positions.extend(half.iter().rev().map(|&p| -p));
        if odd {
            positions.push(0.0);
        }
        positions.extend_from_slice(&half);
        Ok(positions)
    }

    /// Flat column positions as fractional curved-detector columns.
    pub fn normalized_angles(&self, orig_num_detectors: usize) -> Result<Vec<f64>, Error> {
        let positions = self.flat_positions(orig_num_detectors)?;
        let pixel_arclength = self.pixel_arclength(orig_num_detectors);
        let centre = orig_num_detectors as f64 / 2.0;

        Ok(positions
            .into_iter()
            .map(|p| p.atan2(self.dsd) / pixel_arclength + centre)
            .collect())
    }

    pub fn num_flat_columns(&self, orig_num_detectors: usize) -> Result<usize, Error> {
        self.flat_positions(orig_num_detectors).map(|p| p.len())
    }
}

/// Half-open `[start, stop)` sequence with step `step`.
///
/// Length is `ceil((stop - start) / step)`, element `i` is `start + i * step`.
fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let count = ((stop - start) / step).ceil();
    if count.is_nan() || count <= 0.0 {
        return Vec::new();
    }
    (0..count as usize).map(|i| start + i as f64 * step).collect()
}
