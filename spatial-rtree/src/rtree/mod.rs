//! Paged R-Tree engine.
//!
//! Nodes live in a [`StorageManager`](crate::storage::StorageManager) under
//! integer page identifiers and are reloaded on every access; no node holds
//! a reference to another in memory. Descents record the identifiers of the
//! visited ancestors on an explicit path stack, which insertion and deletion
//! consume bottom-up to adjust boxes, propagate splits and condense
//! underfull nodes.
//!
//! Three split strategies are supported: linear, quadratic and the R*-Tree
//! with forced reinsertion.

pub mod rtree_config;
pub mod rtree_constants;
pub mod rtree_events;
pub mod rtree_node;
pub mod rtree_query;
pub mod rtree_types;
pub mod validation;
mod rtree_impl;
mod rtree_index;
mod rtree_leaf;

pub use rtree_config::{RTreeConfig, ReopenOptions};
pub use rtree_events::{NodeEventCallback, NodeEventListener, NodeEvents};
pub use rtree_impl::RTree;
pub use rtree_node::{Entry, Node, NodeKind};
pub use rtree_query::{MinimumDistanceComparator, NearestNeighborComparator, QueryStrategy, Visitor};
pub use rtree_types::{
    Data, DataId, PageId, RTreeVariant, SpatialEntry, SpatialError, SpatialResult, Statistics,
    TreeHeader,
};
pub use validation::ValidationReport;
