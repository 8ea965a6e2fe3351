//! Azimuth/elevation viewpoint coverage and the coverage-based auto-stop.

use crate::constants::{DEFAULT_AUTO_STOP_COVERAGE, DEFAULT_AZIMUTH_BINS, DEFAULT_ELEVATION_BINS};
use crate::geometry::Transform;
use crate::pose_angles::{camera_angles, ViewAngles};
use crate::types::CaptureMode;
use crate::utils::safe_cast::{fraction, normalized_to_bin};

/// Grid cell as `(azimuth_bin, elevation_bin)`
pub type CoverageBin = (usize, usize);

/// Grid of visited viewing-direction bins
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageMap {
    azimuth_bins: usize,
    elevation_bins: usize,
    visited: Vec<bool>,
    visited_count: usize,
}

impl CoverageMap {
    /// Create an empty grid; dimensions are raised to at least 1
    #[must_use]
    pub fn new(azimuth_bins: usize, elevation_bins: usize) -> Self {
        let azimuth_bins = azimuth_bins.max(1);
        let elevation_bins = elevation_bins.max(1);
        Self {
            azimuth_bins,
            elevation_bins,
            visited: vec![false; azimuth_bins * elevation_bins],
            visited_count: 0,
        }
    }

    /// Grid dimensions as `(azimuth, elevation)`
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.azimuth_bins, self.elevation_bins)
    }

    /// Total number of bins
    #[must_use]
    pub fn total_bins(&self) -> usize {
        self.visited.len()
    }

    /// Number of visited bins
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited_count
    }

    /// Bin a pair of viewing angles falls into
    #[must_use]
    pub fn bin_for(&self, angles: ViewAngles) -> CoverageBin {
        let (az, el) = angles.normalized();
        (
            normalized_to_bin(az, self.azimuth_bins),
            normalized_to_bin(el, self.elevation_bins),
        )
    }

    /// Mark a bin visited. Out-of-range bins are ignored.
    ///
    /// Returns `true` if the bin was not visited before.
    pub fn mark(&mut self, (az, el): CoverageBin) -> bool {
        if az >= self.azimuth_bins || el >= self.elevation_bins {
            return false;
        }
        let slot = &mut self.visited[el * self.azimuth_bins + az];
        if *slot {
            return false;
        }
        *slot = true;
        self.visited_count += 1;
        true
    }

    /// Whether a bin has been visited
    #[must_use]
    pub fn is_visited(&self, (az, el): CoverageBin) -> bool {
        az < self.azimuth_bins && el < self.elevation_bins && self.visited[el * self.azimuth_bins + az]
    }

    /// Visited bins over total bins
    #[must_use]
    pub fn fraction(&self) -> f32 {
        fraction(self.visited_count, self.total_bins())
    }

    /// Whether every bin has been visited
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.visited_count == self.total_bins()
    }

    /// Forget every visited bin
    pub fn clear(&mut self) {
        self.visited.fill(false);
        self.visited_count = 0;
    }
}

impl Default for CoverageMap {
    fn default() -> Self {
        Self::new(DEFAULT_AZIMUTH_BINS, DEFAULT_ELEVATION_BINS)
    }
}

/// Coverage meter with a latched auto-stop
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    map: CoverageMap,
    auto_stop_fraction: f32,
    auto_stop_fired: bool,
}

impl Default for CoverageTracker {
    fn default() -> Self {
        Self::new(DEFAULT_AZIMUTH_BINS, DEFAULT_ELEVATION_BINS, DEFAULT_AUTO_STOP_COVERAGE)
    }
}

impl CoverageTracker {
    /// Create a tracker over an `azimuth_bins × elevation_bins` grid
    #[must_use]
    pub fn new(azimuth_bins: usize, elevation_bins: usize, auto_stop_fraction: f32) -> Self {
        Self {
            map: CoverageMap::new(azimuth_bins, elevation_bins),
            auto_stop_fraction,
            auto_stop_fired: false,
        }
    }

    /// Viewing angles of `current` relative to `reference`
    #[must_use]
    pub fn angles(reference: &Transform, current: &Transform) -> ViewAngles {
        camera_angles(reference, current)
    }

    /// Record the viewpoint of `current`; returns the bin it fell into
    pub fn mark(&mut self, reference: &Transform, current: &Transform) -> CoverageBin {
        let bin = self.map.bin_for(Self::angles(reference, current));
        if self.map.mark(bin) {
            log::debug!(
                "Coverage bin {:?} visited ({}/{})",
                bin,
                self.map.visited_count(),
                self.map.total_bins()
            );
        }
        bin
    }

    /// Visited fraction in `[0, 1]`
    #[must_use]
    pub fn coverage_fraction(&self) -> f32 {
        self.map.fraction()
    }

    /// Underlying grid
    #[must_use]
    pub fn map(&self) -> &CoverageMap {
        &self.map
    }

    /// Decide whether to auto-stop; fires at most once until [`reset`](Self::reset).
    ///
    /// Requires automatic mode, coverage at or above the threshold and at
    /// least half the target number of stills.
    pub fn should_auto_stop(&mut self, mode: CaptureMode, frames_captured: usize, target_frames: usize) -> bool {
        if mode != CaptureMode::Auto || self.auto_stop_fired {
            return false;
        }
        if self.coverage_fraction() >= self.auto_stop_fraction && frames_captured >= target_frames / 2 {
            self.auto_stop_fired = true;
            return true;
        }
        false
    }

    /// Whether the auto-stop already fired this session
    #[must_use]
    pub fn auto_stop_fired(&self) -> bool {
        self.auto_stop_fired
    }

    /// Clear bins and the auto-stop latch
    pub fn reset(&mut self) {
        self.map.clear();
        self.auto_stop_fired = false;
    }
}
