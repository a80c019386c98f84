//! Geometry types accepted by the spatial index.
//!
//! The index stores axis-aligned boxes only. Queries may be issued with any
//! [`Shape`]; the tree asks the shape whether it intersects, contains or
//! touches a stored [`Region`], and how far it is from one.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::region::Region;

/// A query or insert geometry.
///
/// Implemented by [`Region`] and [`Point`]. All tests are against an
/// axis-aligned box because that is all the tree stores.
pub trait Shape {
    fn dimension(&self) -> usize;

    /// Minimum bounding region of the shape.
    fn mbr(&self) -> Region;

    fn intersects_region(&self, region: &Region) -> bool;

    fn contains_region(&self, region: &Region) -> bool;

    fn touches_region(&self, region: &Region) -> bool;

    /// Lower bound of the distance between this shape and anything inside
    /// `region`. Drives nearest-neighbor ordering.
    fn minimum_distance(&self, region: &Region) -> f64;

    fn center(&self) -> Point;

    fn area(&self) -> f64;
}

/// A D-dimensional point with an optional opaque label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    coords: Vec<f64>,
    label: Option<Vec<u8>>,
}

impl Point {
    pub fn new(coords: Vec<f64>) -> Self {
        Self { coords, label: None }
    }

    /// Creates a point carrying label bytes.
    pub fn with_label(coords: Vec<f64>, label: impl Into<Vec<u8>>) -> Self {
        Self {
            coords,
            label: Some(label.into()),
        }
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Coordinate along `axis`, or `None` past the last dimension.
    pub fn coord(&self, axis: usize) -> Option<f64> {
        self.coords.get(axis).copied()
    }

    pub fn label(&self) -> Option<&[u8]> {
        self.label.as_deref()
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        self.coords
            .iter()
            .zip(&other.coords)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point{:?}", self.coords)
    }
}

impl Shape for Point {
    fn dimension(&self) -> usize {
        self.coords.len()
    }

    fn mbr(&self) -> Region {
        Region::from_point(&self.coords)
    }

    fn intersects_region(&self, region: &Region) -> bool {
        region.contains_point(&self.coords)
    }

    // A point has no extent, so it never contains a box.
    fn contains_region(&self, _region: &Region) -> bool {
        false
    }

    fn touches_region(&self, region: &Region) -> bool {
        region.touches_point(&self.coords)
    }

    fn minimum_distance(&self, region: &Region) -> f64 {
        region.minimum_distance_to_point(&self.coords)
    }

    fn center(&self) -> Point {
        Point::new(self.coords.clone())
    }

    fn area(&self) -> f64 {
        0.0
    }
}
