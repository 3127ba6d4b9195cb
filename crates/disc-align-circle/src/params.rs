use serde::{Deserialize, Serialize};

/// Hough-gradient circle detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughCircleParams {
    /// Median blur kernel side (odd).
    pub median_kernel: usize,
    /// Minimum center distance as a fraction of image height.
    ///
    /// The effective distance is `floor(height * min_dist_frac)`, at least 1 px.
    pub min_dist_frac: f32,
    /// Upper Canny threshold; the lower one is half of it.
    pub canny_high: f32,
    /// Votes a center needs within its 3x3 neighbourhood, and edge pixels
    /// its radius shell needs, to be accepted.
    pub accumulator_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
}

impl Default for HoughCircleParams {
    fn default() -> Self {
        Self {
            median_kernel: 5,
            min_dist_frac: 1.0 / 16.0,
            canny_high: 100.0,
            accumulator_threshold: 30,
            min_radius: 1,
            max_radius: 1500,
        }
    }
}

impl HoughCircleParams {
    pub fn min_dist(&self, height: usize) -> f32 {
        (height as f32 * self.min_dist_frac).floor().max(1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropParams {
    /// Pixels kept around the circle on every side.
    pub margin: u32,
}

impl Default for CropParams {
    fn default() -> Self {
        Self { margin: 20 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorParams {
    pub hough: HoughCircleParams,
    pub crop: CropParams,
}
