use serde::{Deserialize, Serialize};

use crate::geometry::Point3D;

/// Node in a 3D k-d tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KDNode {
    pub point: Point3D,
    pub index: usize,
    pub axis: usize,
    pub left: Option<Box<KDNode>>,
    pub right: Option<Box<KDNode>>,
}

/// 3D k-d tree supporting bounded N-nearest queries, with or without a radius.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KDTree {
    pub root: Option<Box<KDNode>>,
}

impl KDTree {
    pub fn build(points: &[Point3D]) -> Self {
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let root = Self::build_recursive(points, &mut indices, 0);
        KDTree { root }
    }

    fn build_recursive(
        points: &[Point3D],
        idx: &mut [usize],
        depth: usize,
    ) -> Option<Box<KDNode>> {
        if idx.is_empty() {
            return None;
        }

        let axis = depth % 3;
        idx.sort_by(|&a, &b| points[a].axis(axis).total_cmp(&points[b].axis(axis)));
        let mid = idx.len() / 2;
        let median = idx[mid];

        Some(Box::new(KDNode {
            point: points[median],
            index: median,
            axis,
            left: Self::build_recursive(points, &mut idx[..mid], depth + 1),
            right: Self::build_recursive(points, &mut idx[mid + 1..], depth + 1),
        }))
    }

    /// Returns up to `n` nearest neighbours of `target`, optionally limited to `radius`.
    ///
    /// Results are ordered by ascending distance, ties broken by index.
    pub fn nearest(&self, target: Point3D, radius: Option<f64>, n: usize) -> Vec<(usize, f64)> {
        if n == 0 {
            return Vec::new();
        }
        let radius2 = radius.map_or(f64::INFINITY, |r| r * r);
        let mut best: Vec<(usize, f64)> = Vec::with_capacity(n.min(64));
        Self::search_recursive(&self.root, target, radius2, n, &mut best);
        best.into_iter()
            .map(|(idx, d2)| (idx, d2.sqrt()))
            .collect()
    }

    fn search_recursive(
        node: &Option<Box<KDNode>>,
        target: Point3D,
        radius2: f64,
        n: usize,
        best: &mut Vec<(usize, f64)>,
    ) {
        let Some(noderef) = node else {
            return;
        };

        let dist2 = noderef.point.distance_squared(&target);
        if dist2 <= radius2 {
            Self::offer(best, n, noderef.index, dist2);
        }

        let axis = noderef.axis;
        let delta = target.axis(axis) - noderef.point.axis(axis);
        let (first, second) = if delta < 0.0 {
            (&noderef.left, &noderef.right)
        } else {
            (&noderef.right, &noderef.left)
        };

        Self::search_recursive(first, target, radius2, n, best);
        let bound = if best.len() == n {
            best[n - 1].1.min(radius2)
        } else {
            radius2
        };
        if delta * delta <= bound {
            Self::search_recursive(second, target, radius2, n, best);
        }
    }

    /// Inserts into the sorted candidate list, keeping at most `n` entries.
    fn offer(best: &mut Vec<(usize, f64)>, n: usize, index: usize, dist2: f64) {
        let pos = best.partition_point(|&(i, d)| d < dist2 || (d == dist2 && i < index));
        if pos >= n {
            return;
        }
        best.insert(pos, (index, dist2));
        best.truncate(n);
    }
}
