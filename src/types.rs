//! Capture buckets, modes and the per-bucket table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Anatomical pose category under which stills and points are grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureBucket {
    /// Relaxed face, lips closed
    Repose,
    /// Full smile
    Smile,
    /// Side view
    Profile,
    /// Close-up stills of the teeth
    TeethMacro,
}

impl CaptureBucket {
    /// Every bucket in ordinal order
    pub const ALL: [CaptureBucket; 4] = [
        CaptureBucket::Repose,
        CaptureBucket::Smile,
        CaptureBucket::Profile,
        CaptureBucket::TeethMacro,
    ];

    /// Number of buckets
    pub const COUNT: usize = Self::ALL.len();

    /// Ordinal used to index per-bucket tables
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            CaptureBucket::Repose => 0,
            CaptureBucket::Smile => 1,
            CaptureBucket::Profile => 2,
            CaptureBucket::TeethMacro => 3,
        }
    }

    /// Folder name used on disk
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CaptureBucket::Repose => "repose",
            CaptureBucket::Smile => "smile",
            CaptureBucket::Profile => "profile",
            CaptureBucket::TeethMacro => "teethMacro",
        }
    }

    /// Parse a bucket from its folder name (case-insensitive, `_` and `-` ignored)
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .iter()
            .copied()
            .find(|bucket| bucket.as_str().to_lowercase() == key)
    }
}

impl fmt::Display for CaptureBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-size table holding one value per capture bucket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketMap<T> {
    slots: [T; CaptureBucket::COUNT],
}

impl<T> BucketMap<T> {
    /// Build a table by calling `init` once per bucket
    pub fn from_fn(mut init: impl FnMut(CaptureBucket) -> T) -> Self {
        Self {
            slots: CaptureBucket::ALL.map(&mut init),
        }
    }

    /// Iterate `(bucket, value)` pairs in ordinal order
    pub fn iter(&self) -> impl Iterator<Item = (CaptureBucket, &T)> {
        CaptureBucket::ALL.iter().copied().zip(self.slots.iter())
    }
}

impl<T> Index<CaptureBucket> for BucketMap<T> {
    type Output = T;

    fn index(&self, bucket: CaptureBucket) -> &T {
        &self.slots[bucket.index()]
    }
}

impl<T> IndexMut<CaptureBucket> for BucketMap<T> {
    fn index_mut(&mut self, bucket: CaptureBucket) -> &mut T {
        &mut self.slots[bucket.index()]
    }
}

/// Whether stills are taken automatically or only on the manual shutter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Quality-gated automatic capture
    #[default]
    Auto,
    /// Stills only when the user presses the shutter
    Manual,
}

/// Treatment planning mode; drives how many stills a bucket needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningMode {
    /// Smile design, front teeth
    #[default]
    Esthetic,
    /// Full arch planning
    FullArch,
}

impl PlanningMode {
    /// Number of stills that counts as a complete bucket
    #[must_use]
    pub const fn target_frame_count(self) -> usize {
        match self {
            PlanningMode::Esthetic => 80,
            PlanningMode::FullArch => 120,
        }
    }
}

/// How the live preview geometry subsamples accumulated points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewMode {
    /// Every point
    #[default]
    PointCloud,
    /// Every second point
    SparseMesh,
    /// Every point
    DenseMesh,
}
