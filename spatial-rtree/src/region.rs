use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::{Point, Shape};
use crate::rtree::rtree_constants::EPSILON;
use crate::rtree::rtree_types::{SpatialError, SpatialResult};

/// An axis-aligned box in D dimensions, described by its `low` and `high`
/// corner vectors.
///
/// `Region` is the minimum bounding rectangle (MBR) type used by every node
/// entry in the tree. A non-empty region satisfies `low[i] <= high[i]` on
/// every axis.
///
/// The distinguished *empty* region has `low[i] = +inf` and `high[i] = -inf`.
/// It is the identity element for [`Region::combine`]: combining any region
/// with it yields that region unchanged.
///
/// # Examples
///
/// ```rust
/// use spatial_rtree::Region;
///
/// let a = Region::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
/// let b = Region::new(vec![2.0, 2.0], vec![3.0, 3.0]).unwrap();
/// let both = a.combine(&b);
/// assert_eq!(both.low(), &[0.0, 0.0]);
/// assert_eq!(both.high(), &[3.0, 3.0]);
/// ```
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Region {
    low: Vec<f64>,
    high: Vec<f64>,
}

impl Region {
    /// Creates a region from its corners.
    ///
    /// Fails with [`SpatialError::InvalidArgument`] when the corners have
    /// different dimensionality or when `low` exceeds `high` on some axis.
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> SpatialResult<Region> {
        if low.len() != high.len() {
            return Err(SpatialError::InvalidArgument(format!(
                "Region corners differ in dimension: {} vs {}",
                low.len(),
                high.len()
            )));
        }
        if low.is_empty() {
            return Err(SpatialError::InvalidArgument(
                "Region must have at least one dimension".to_string(),
            ));
        }
        if let Some(axis) = (0..low.len()).find(|&i| low[i] > high[i]) {
            return Err(SpatialError::InvalidArgument(format!(
                "Region low exceeds high on axis {}: {} > {}",
                axis, low[axis], high[axis]
            )));
        }
        Ok(Region { low, high })
    }

    /// A degenerate region covering exactly one point.
    pub fn from_point(coords: &[f64]) -> Region {
        Region {
            low: coords.to_vec(),
            high: coords.to_vec(),
        }
    }

    /// The empty (infinite) region, identity for union.
    pub fn empty(dimension: usize) -> Region {
        Region {
            low: vec![f64::INFINITY; dimension],
            high: vec![f64::NEG_INFINITY; dimension],
        }
    }

    /// Builds a region from raw corners without validation. Used by the
    /// wire decoder, which must round-trip whatever was stored.
    pub(crate) fn from_raw(low: Vec<f64>, high: Vec<f64>) -> Region {
        Region { low, high }
    }

    pub fn is_empty(&self) -> bool {
        self.low.iter().zip(&self.high).any(|(l, h)| l > h)
    }

    pub fn dimension(&self) -> usize {
        self.low.len()
    }

    pub fn low(&self) -> &[f64] {
        &self.low
    }

    pub fn high(&self) -> &[f64] {
        &self.high
    }

    /// The low corner as a point.
    pub fn low_point(&self) -> Point {
        Point::new(self.low.clone())
    }

    /// The high corner as a point.
    pub fn high_point(&self) -> Point {
        Point::new(self.high.clone())
    }

    /// Closed-interval overlap test on every axis.
    pub fn intersects(&self, other: &Region) -> bool {
        (0..self.dimension()).all(|i| self.low[i] <= other.high[i] && self.high[i] >= other.low[i])
    }

    pub fn contains(&self, other: &Region) -> bool {
        (0..self.dimension()).all(|i| self.low[i] <= other.low[i] && self.high[i] >= other.high[i])
    }

    pub fn contains_point(&self, coords: &[f64]) -> bool {
        (0..self.dimension()).all(|i| self.low[i] <= coords[i] && self.high[i] >= coords[i])
    }

    /// True when some face of `other` lies on the matching face of `self`
    /// (within [`EPSILON`]). Removing such a child may shrink the parent box.
    pub fn touches(&self, other: &Region) -> bool {
        (0..self.dimension()).any(|i| {
            near(self.low[i], other.low[i]) || near(self.high[i], other.high[i])
        })
    }

    pub fn touches_point(&self, coords: &[f64]) -> bool {
        (0..self.dimension()).any(|i| near(self.low[i], coords[i]) || near(self.high[i], coords[i]))
    }

    pub fn area(&self) -> f64 {
        (0..self.dimension()).map(|i| self.high[i] - self.low[i]).product()
    }

    /// Sum of all edge lengths of the box.
    pub fn margin(&self) -> f64 {
        let multiplier = 2f64.powi(self.dimension() as i32 - 1);
        (0..self.dimension())
            .map(|i| (self.high[i] - self.low[i]) * multiplier)
            .sum()
    }

    /// Area of the intersection, zero when the regions are disjoint.
    pub fn intersecting_area(&self, other: &Region) -> f64 {
        if !self.intersects(other) {
            return 0.0;
        }
        (0..self.dimension())
            .map(|i| self.high[i].min(other.high[i]) - self.low[i].max(other.low[i]))
            .product()
    }

    pub fn center(&self) -> Vec<f64> {
        (0..self.dimension())
            .map(|i| (self.low[i] + self.high[i]) / 2.0)
            .collect()
    }

    /// Euclidean distance between the closest points of the two boxes.
    pub fn minimum_distance(&self, other: &Region) -> f64 {
        (0..self.dimension())
            .map(|i| {
                if other.high[i] < self.low[i] {
                    (self.low[i] - other.high[i]).powi(2)
                } else if other.low[i] > self.high[i] {
                    (other.low[i] - self.high[i]).powi(2)
                } else {
                    0.0
                }
            })
            .sum::<f64>()
            .sqrt()
    }

    pub fn minimum_distance_to_point(&self, coords: &[f64]) -> f64 {
        (0..self.dimension())
            .map(|i| {
                if coords[i] < self.low[i] {
                    (self.low[i] - coords[i]).powi(2)
                } else if coords[i] > self.high[i] {
                    (coords[i] - self.high[i]).powi(2)
                } else {
                    0.0
                }
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Smallest region enclosing both `self` and `other`.
    pub fn combine(&self, other: &Region) -> Region {
        let mut combined = self.clone();
        combined.expand(other);
        combined
    }

    /// Grows `self` in place to enclose `other`.
    pub fn expand(&mut self, other: &Region) {
        for i in 0..self.dimension() {
            self.low[i] = self.low[i].min(other.low[i]);
            self.high[i] = self.high[i].max(other.high[i]);
        }
    }

    /// Union of a list of regions. Returns the empty region for an empty list.
    pub fn combined_region<'a, I>(dimension: usize, regions: I) -> Region
    where
        I: IntoIterator<Item = &'a Region>,
    {
        let mut combined = Region::empty(dimension);
        for region in regions {
            combined.expand(region);
        }
        combined
    }

    /// Area growth needed for `self` to also enclose `other`.
    pub fn enlargement(&self, other: &Region) -> f64 {
        self.combine(other).area() - self.area()
    }
}

fn near(a: f64, b: f64) -> bool {
    a > b - EPSILON && a < b + EPSILON
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region({:?} : {:?})", self.low, self.high)
    }
}

impl Shape for Region {
    fn dimension(&self) -> usize {
        self.low.len()
    }

    fn mbr(&self) -> Region {
        self.clone()
    }

    fn intersects_region(&self, region: &Region) -> bool {
        self.intersects(region)
    }

    fn contains_region(&self, region: &Region) -> bool {
        self.contains(region)
    }

    fn touches_region(&self, region: &Region) -> bool {
        self.touches(region)
    }

    fn minimum_distance(&self, region: &Region) -> f64 {
        Region::minimum_distance(self, region)
    }

    fn center(&self) -> Point {
        Point::new(Region::center(self))
    }

    fn area(&self) -> f64 {
        Region::area(self)
    }
}
