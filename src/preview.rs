//! Live preview geometry built from accumulated points.

use crate::geometry::Point;
use crate::types::PreviewMode;

/// Point primitives ready for a renderer: one index per vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewGeometry {
    /// Vertex positions in reference-camera space
    pub vertices: Vec<Point>,
    /// Point primitive indices
    pub indices: Vec<u32>,
    /// Mode the geometry was built with
    pub mode: PreviewMode,
}

impl PreviewGeometry {
    /// Build preview geometry, subsampling according to `mode`.
    ///
    /// Sparse mesh keeps every second point; the other modes keep all.
    #[must_use]
    pub fn build(points: &[Point], mode: PreviewMode) -> Self {
        let step = match mode {
            PreviewMode::SparseMesh => 2,
            PreviewMode::PointCloud | PreviewMode::DenseMesh => 1,
        };
        let vertices: Vec<Point> = points.iter().step_by(step).copied().collect();
        let indices = (0..vertices.len())
            .map(|i| u32::try_from(i).unwrap_or(u32::MAX))
            .collect();

        Self {
            vertices,
            indices,
            mode,
        }
    }

    /// Number of vertices
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether there is nothing to draw
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Axis-aligned bounds as `(min, max)`
    #[must_use]
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let (first, rest) = self.vertices.split_first()?;
        Some(rest.iter().fold((*first, *first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        }))
    }
}
