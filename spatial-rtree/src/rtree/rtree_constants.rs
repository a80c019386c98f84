//! Constants for the paged R-Tree.

/// Tolerance used by `touches` and by the R*-Tree overlap guard.
pub const EPSILON: f64 = 1.192092896e-07;

/// Node type tag for internal nodes in the wire format.
pub const PERSISTENT_INDEX: i32 = 1;

/// Node type tag for leaf nodes in the wire format.
pub const PERSISTENT_LEAF: i32 = 2;

/// Page identifier sentinel meaning "not yet stored".
pub const NEW_PAGE: i32 = -1;

pub const DEFAULT_DIMENSION: usize = 2;

/// Largest accepted dimension; a stored entry then still fits in 64 KiB.
pub const MAX_DIMENSION: usize = 4096;

pub const DEFAULT_FILL_FACTOR: f64 = 0.7;

pub const DEFAULT_INDEX_CAPACITY: usize = 100;

pub const DEFAULT_LEAF_CAPACITY: usize = 100;

/// Number of least-enlargement candidates evaluated for overlap cost.
pub const DEFAULT_NEAR_MINIMUM_OVERLAP_FACTOR: usize = 32;

pub const DEFAULT_SPLIT_DISTRIBUTION_FACTOR: f64 = 0.4;

pub const DEFAULT_REINSERT_FACTOR: f64 = 0.3;

/// Smallest capacity for which a split leaves both halves non-empty.
pub const MIN_CAPACITY: usize = 3;

/// Default page size of the disk storage manager.
pub const DEFAULT_PAGE_SIZE: usize = 4096;
