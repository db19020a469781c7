//! Nearest neighbor search implementations

use std::cmp::Ordering;
use std::collections::HashMap;

use kiddo::SquaredEuclidean;
use normalcrate_core::{NearestNeighborSearch, Point3f};
use tracing::debug;

/// Order `(index, distance)` pairs by distance, then by index
fn by_distance_then_index(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

fn squared_distance(a: &Point3f, b: &Point3f) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx * dx + dy * dy + dz * dz
}

/// Leaf bucket size of `kiddo::KdTree`. A full bucket cannot be split when
/// every entry in it shares the value on the split axis.
const BUCKET_SIZE: usize = 32;

/// Largest number of positions sharing one value on `axis`
fn max_shared_value(positions: &[Point3f], axis: usize) -> usize {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for position in positions {
        *counts.entry((position[axis] + 0.0).to_bits()).or_insert(0) += 1;
    }
    counts.into_values().max().unwrap_or(0)
}

/// kiddo tree over the varying axes of the unique positions
struct AxisTree<const K: usize> {
    tree: kiddo::KdTree<f32, K>,
    axes: [usize; K],
}

impl<const K: usize> AxisTree<K> {
    /// `None` when some value on an indexed axis is shared by a full bucket
    fn build(positions: &[Point3f], axes: [usize; K]) -> Option<Self> {
        if axes
            .iter()
            .any(|&axis| max_shared_value(positions, axis) >= BUCKET_SIZE)
        {
            return None;
        }

        let mut tree: kiddo::KdTree<f32, K> = kiddo::KdTree::new();
        for (slot, position) in positions.iter().enumerate() {
            tree.add(&axes.map(|axis| position[axis]), slot as u64);
        }
        Some(Self { tree, axes })
    }

    fn project(&self, query: &Point3f) -> [f32; K] {
        self.axes.map(|axis| query[axis])
    }

    fn nearest(&self, query: &Point3f, qty: usize) -> Vec<(usize, f32)> {
        self.tree
            .nearest_n::<SquaredEuclidean>(&self.project(query), qty)
            .into_iter()
            .map(|n| (n.item as usize, n.distance))
            .collect()
    }

    fn within(&self, query: &Point3f, radius_squared: f32) -> Vec<usize> {
        // kiddo's bound is strict; widen it so points exactly at the radius
        // survive until the caller filters on full distances.
        let bound = (radius_squared * (1.0 + 1e-4)).max(f32::MIN_POSITIVE);
        self.tree
            .within::<SquaredEuclidean>(&self.project(query), bound)
            .into_iter()
            .map(|n| n.item as usize)
            .collect()
    }
}

/// Spatial index over the axes along which the cloud actually varies.
/// Dropped axes hold one value for every position, so they add the same
/// amount to every distance and do not change the neighbour order.
enum SpatialIndex {
    Volume(AxisTree<3>),
    Planar(AxisTree<2>),
    Linear(AxisTree<1>),
}

impl SpatialIndex {
    fn build(positions: &[Point3f]) -> Option<Self> {
        let first = positions.first()?;
        // kiddo cannot order NaN while splitting buckets
        if positions.iter().any(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return None;
        }
        let varying: Vec<usize> = (0..3)
            .filter(|&axis| positions.iter().any(|p| p[axis] != first[axis]))
            .collect();

        match varying[..] {
            [x, y, z] => AxisTree::build(positions, [x, y, z]).map(Self::Volume),
            [u, v] => AxisTree::build(positions, [u, v]).map(Self::Planar),
            [u] => AxisTree::build(positions, [u]).map(Self::Linear),
            _ => None,
        }
    }

    /// Slots nearest to `query` with their distance in the indexed axes,
    /// nearest first
    fn nearest(&self, query: &Point3f, qty: usize) -> Vec<(usize, f32)> {
        match self {
            Self::Volume(tree) => tree.nearest(query, qty),
            Self::Planar(tree) => tree.nearest(query, qty),
            Self::Linear(tree) => tree.nearest(query, qty),
        }
    }

    /// Superset of the slots within `radius_squared` of `query`
    fn within(&self, query: &Point3f, radius_squared: f32) -> Vec<usize> {
        match self {
            Self::Volume(tree) => tree.within(query, radius_squared),
            Self::Planar(tree) => tree.within(query, radius_squared),
            Self::Linear(tree) => tree.within(query, radius_squared),
        }
    }
}

/// KD-Tree implementation for nearest neighbor search, backed by `kiddo`.
///
/// Coincident points share one slot in the tree and constant axes are left
/// out of it. Clouds the tree cannot split, where a full bucket of positions
/// shares one coordinate value as in large regular grids, are searched by a
/// linear scan over the unique positions instead, as are clouds with
/// non-finite coordinates.
/// Distances are always evaluated on the full coordinates, so results match
/// [`BruteForceSearch`] exactly.
pub struct KdTree {
    index: Option<SpatialIndex>,
    positions: Vec<Point3f>,
    members: Vec<Vec<usize>>,
    len: usize,
}

impl KdTree {
    pub fn new(points: &[Point3f]) -> Self {
        let mut slots: HashMap<[u32; 3], usize> = HashMap::new();
        let mut positions = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        for (idx, point) in points.iter().enumerate() {
            // + 0.0 folds -0.0 into 0.0
            let key = [point.x, point.y, point.z].map(|c| (c + 0.0).to_bits());
            let slot = *slots.entry(key).or_insert_with(|| {
                positions.push(*point);
                members.push(Vec::new());
                positions.len() - 1
            });
            members[slot].push(idx);
        }

        let index = SpatialIndex::build(&positions);
        if index.is_none() && positions.len() > 1 {
            debug!(
                points = points.len(),
                unique = positions.len(),
                "positions cannot be bucketed, using a linear scan"
            );
        }

        Self {
            index,
            positions,
            members,
            len: points.len(),
        }
    }

    /// Expand slots into `(index, squared distance)` pairs for every member
    fn expand(&self, query: &Point3f, slots: impl IntoIterator<Item = usize>) -> Vec<(usize, f32)> {
        let mut found = Vec::new();
        for slot in slots {
            let distance_squared = squared_distance(&self.positions[slot], query);
            found.extend(self.members[slot].iter().map(|&idx| (idx, distance_squared)));
        }
        found
    }

    /// Squared distances from `query` to every indexed point, by index
    pub(crate) fn squared_distances_to_all(&self, query: &Point3f, out: &mut [f32]) {
        let found = match &self.index {
            Some(index) => {
                let slots = index.nearest(query, self.positions.len());
                self.expand(query, slots.into_iter().map(|(slot, _)| slot))
            }
            None => self.expand(query, 0..self.positions.len()),
        };
        for (idx, distance_squared) in found {
            out[idx] = distance_squared;
        }
    }

    /// Slots holding the `k` nearest points, plus every slot tied with the
    /// k-th one
    fn nearest_slots(&self, index: &SpatialIndex, query: &Point3f, k: usize) -> Vec<usize> {
        let unique = self.positions.len();

        // kiddo orders equal distances arbitrarily; widen the query until the
        // distance covering the k-th point is no longer shared by the last
        // result, so the index tie-break sees every candidate.
        let mut take = k.min(unique);
        loop {
            let nearest = index.nearest(query, take);
            let mut covered = 0;
            let boundary = nearest
                .iter()
                .find(|&&(slot, _)| {
                    covered += self.members[slot].len();
                    covered >= k
                })
                .map(|&(_, distance)| distance);

            let exhausted = nearest.len() >= unique;
            let settled = match (boundary, nearest.last()) {
                (Some(boundary), Some(&(_, last))) => last > boundary,
                _ => false,
            };
            if exhausted || settled {
                return nearest.into_iter().map(|(slot, _)| slot).collect();
            }
            take = (take * 2).min(unique);
        }
    }
}

impl NearestNeighborSearch for KdTree {
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        let k = k.min(self.len);
        if k == 0 {
            return Vec::new();
        }

        let mut found = match &self.index {
            Some(index) => self.expand(query, self.nearest_slots(index, query, k)),
            None => self.expand(query, 0..self.positions.len()),
        };

        found.sort_by(by_distance_then_index);
        found.truncate(k);
        for neighbor in &mut found {
            neighbor.1 = neighbor.1.sqrt();
        }
        found
    }

    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)> {
        if self.len == 0 || radius < 0.0 {
            return Vec::new();
        }

        let radius_squared = radius * radius;
        let mut found = match &self.index {
            Some(index) => self.expand(query, index.within(query, radius_squared)),
            None => self.expand(query, 0..self.positions.len()),
        };

        found.retain(|&(_, distance_squared)| distance_squared <= radius_squared);
        found.sort_by(by_distance_then_index);
        for neighbor in &mut found {
            neighbor.1 = neighbor.1.sqrt();
        }
        found
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Simple brute force nearest neighbor search for small datasets
pub struct BruteForceSearch {
    points: Vec<Point3f>,
}

impl BruteForceSearch {
    pub fn new(points: &[Point3f]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }
}

impl NearestNeighborSearch for BruteForceSearch {
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        let mut distances: Vec<(usize, f32)> = self.points
            .iter()
            .enumerate()
            .map(|(idx, point)| (idx, squared_distance(point, query)))
            .collect();

        distances.sort_by(by_distance_then_index);
        distances.truncate(k);
        for neighbor in &mut distances {
            neighbor.1 = neighbor.1.sqrt();
        }
        distances
    }

    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)> {
        if radius < 0.0 {
            return Vec::new();
        }

        let radius_squared = radius * radius;
        let mut found: Vec<(usize, f32)> = self.points
            .iter()
            .enumerate()
            .filter_map(|(idx, point)| {
                let distance_squared = squared_distance(point, query);
                (distance_squared <= radius_squared).then_some((idx, distance_squared))
            })
            .collect();

        found.sort_by(by_distance_then_index);
        for neighbor in &mut found {
            neighbor.1 = neighbor.1.sqrt();
        }
        found
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}
