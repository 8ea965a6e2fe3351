//! Stabilized point accumulation per capture bucket.
//!
//! Every bucket keeps two capped buffers in reference-camera space: a global
//! envelope of all tracked feature points and a denser head-gated subset of
//! points whose projection falls inside the (expanded) head rectangle.
//! Overflow keeps the most recent points.

use crate::camera::FrameCamera;
use crate::constants::{
    DEFAULT_GLOBAL_POINT_CAP, DEFAULT_HEAD_POINT_CAP, HEAD_GATE_EXPANSION, HEAD_GATE_SKIP_EVERY,
};
use crate::face_lock::ReferenceFrame;
use crate::geometry::{invert, transform_point, ImageSize, Point, Rect};
use crate::types::{BucketMap, CaptureBucket};

/// Append-only point sequence with sliding-window retention
#[derive(Debug, Clone, Default)]
pub struct PointBuffer {
    cap: usize,
    points: Vec<Point>,
}

impl PointBuffer {
    /// Create an empty buffer holding at most `cap` points
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            points: Vec::new(),
        }
    }

    /// Append points, then drop the oldest until `len() <= cap`
    pub fn extend<I>(&mut self, incoming: I)
    where
        I: IntoIterator<Item = Point>,
    {
        self.points.extend(incoming);
        if self.points.len() > self.cap {
            let excess = self.points.len() - self.cap;
            self.points.drain(..excess);
        }
    }

    /// Points in insertion order, oldest first
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of points held
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Maximum number of points retained
    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Drop every point
    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Global and head-gated buffers of one bucket
#[derive(Debug, Clone, Default)]
pub struct BucketPoints {
    /// Every tracked point
    pub global: PointBuffer,
    /// Points projected inside the head region
    pub head: PointBuffer,
}

/// Tunables for point accumulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccumulatorSettings {
    /// Global buffer cap
    pub global_cap: usize,
    /// Head-gated buffer cap
    pub head_cap: usize,
    /// Head rectangle growth before gating
    pub head_expansion: f32,
    /// Skip every n-th head-gated point by index (0 disables skipping)
    pub head_skip_every: usize,
}

impl Default for AccumulatorSettings {
    fn default() -> Self {
        Self {
            global_cap: DEFAULT_GLOBAL_POINT_CAP,
            head_cap: DEFAULT_HEAD_POINT_CAP,
            head_expansion: HEAD_GATE_EXPANSION,
            head_skip_every: HEAD_GATE_SKIP_EVERY,
        }
    }
}

/// Points accepted by one ingest call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Points appended to the global buffer
    pub global_added: usize,
    /// Points appended to the head-gated buffer
    pub head_added: usize,
}

/// Per-bucket point accumulator
#[derive(Debug, Clone)]
pub struct PointAccumulator {
    settings: AccumulatorSettings,
    buckets: BucketMap<BucketPoints>,
}

impl Default for PointAccumulator {
    fn default() -> Self {
        Self::new(AccumulatorSettings::default())
    }
}

impl PointAccumulator {
    /// Create an accumulator with empty buffers for every bucket
    #[must_use]
    pub fn new(settings: AccumulatorSettings) -> Self {
        Self {
            settings,
            buckets: BucketMap::from_fn(|_| BucketPoints {
                global: PointBuffer::new(settings.global_cap),
                head: PointBuffer::new(settings.head_cap),
            }),
        }
    }

    /// Accumulate one frame of world-space feature points into `bucket`.
    ///
    /// Points are expressed in the reference camera space. Without a
    /// reference frame the points have no stable frame to live in and are
    /// discarded. `head_region` is the normalized head rectangle; when present,
    /// points projecting inside its expanded version also feed the head-gated
    /// buffer (skipping every `head_skip_every`-th point by index).
    pub fn ingest(
        &mut self,
        bucket: CaptureBucket,
        raw_points: &[Point],
        head_region: Option<Rect>,
        camera: &FrameCamera,
        image_size: ImageSize,
        reference: Option<&ReferenceFrame>,
    ) -> IngestStats {
        let Some(reference) = reference else {
            return IngestStats::default();
        };
        if raw_points.is_empty() {
            return IngestStats::default();
        }

        let entry = &mut self.buckets[bucket];
        entry
            .global
            .extend(raw_points.iter().map(|p| transform_point(&reference.inverse, p)));
        let mut stats = IngestStats {
            global_added: raw_points.len(),
            head_added: 0,
        };

        let Some(head) = head_region else {
            return stats;
        };
        let Some(view) = invert(&camera.transform) else {
            log::debug!("Frame camera pose is singular; skipping head gating");
            return stats;
        };
        if image_size.width <= 0.0 || image_size.height <= 0.0 {
            return stats;
        }

        let gate = head.expanded(self.settings.head_expansion);
        let skip_every = self.settings.head_skip_every;
        let gated: Vec<Point> = raw_points
            .iter()
            .enumerate()
            .filter(|(idx, _)| skip_every == 0 || idx % skip_every != 0)
            .filter_map(|(_, p)| {
                let (u, v) = camera.project_with_view(&view, p)?;
                gate.contains(u / image_size.width, v / image_size.height)
                    .then(|| transform_point(&reference.inverse, p))
            })
            .collect();

        stats.head_added = gated.len();
        entry.head.extend(gated);
        stats
    }

    /// Global buffer of a bucket
    #[must_use]
    pub fn global(&self, bucket: CaptureBucket) -> &PointBuffer {
        &self.buckets[bucket].global
    }

    /// Head-gated buffer of a bucket
    #[must_use]
    pub fn head(&self, bucket: CaptureBucket) -> &PointBuffer {
        &self.buckets[bucket].head
    }

    /// Points used by the live preview: head-gated points followed by the
    /// global envelope, or the envelope alone when nothing was head-gated.
    #[must_use]
    pub fn preview_points(&self, bucket: CaptureBucket) -> Vec<Point> {
        let entry = &self.buckets[bucket];
        let mut points = Vec::with_capacity(entry.head.len() + entry.global.len());
        points.extend_from_slice(entry.head.points());
        points.extend_from_slice(entry.global.points());
        points
    }

    /// Drop both buffers of a bucket
    pub fn clear(&mut self, bucket: CaptureBucket) {
        self.buckets[bucket].global.clear();
        self.buckets[bucket].head.clear();
    }

    /// Accumulation settings
    #[must_use]
    pub fn settings(&self) -> &AccumulatorSettings {
        &self.settings
    }
}
