//! # Spatial R-Tree - Disk-Backable Spatial Indexing
//!
//! This crate provides a multi-dimensional R-Tree family index over
//! axis-aligned boxes with opaque payloads. Nodes are stored as byte blobs
//! in a pluggable storage manager, so the same tree runs in memory or on
//! disk.
//!
//! ## Features
//!
//! - **Three Variants**: linear, quadratic and R*-Tree splits
//! - **Forced Reinsertion**: R*-Tree overflow handling before splitting
//! - **Range Queries**: intersection, containment and point location
//! - **Nearest Neighbors**: best-first k-NN with tie reporting
//! - **Pluggable Storage**: in-memory or paged disk files, id reuse on delete
//! - **Thread Safe**: one reader/writer lock per tree
//! - **Auditable**: structural validation and operation statistics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use spatial_rtree::{DiskStorageConfig, DiskStorageManager, Point, RTree, RTreeConfig, Region};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(DiskStorageManager::open(&DiskStorageConfig::new("/tmp/places"))?);
//! let tree = RTree::create(storage, RTreeConfig::default())?;
//!
//! tree.insert_data(Some(b"cafe,park".as_slice()), &Region::new(vec![0.0, 0.0], vec![1.0, 1.0])?, 1)?;
//!
//! let mut nearest: Vec<i32> = Vec::new();
//! tree.nearest_neighbor_query(1, &Point::new(vec![3.0, 3.0]), &mut nearest)?;
//! tree.flush()?;
//! # Ok(())
//! # }
//! ```

pub mod geometry;
pub mod keyword_report;
pub mod region;
pub mod rtree;
pub mod storage;

pub use geometry::{Point, Shape};
pub use keyword_report::KeywordReport;
pub use region::Region;
pub use rtree::{
    Data, DataId, Entry, MinimumDistanceComparator, NearestNeighborComparator, Node,
    NodeEventListener, NodeEvents, NodeKind, PageId, QueryStrategy, RTree, RTreeConfig,
    RTreeVariant, ReopenOptions, SpatialEntry, SpatialError, SpatialResult, Statistics,
    ValidationReport, Visitor,
};
pub use storage::{
    DiskStorageConfig, DiskStorageManager, MemoryStorageManager, StorageManager, NEW_PAGE,
};
