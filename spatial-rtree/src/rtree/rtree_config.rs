use serde::{Deserialize, Serialize};

use super::rtree_constants::{
    DEFAULT_DIMENSION, DEFAULT_FILL_FACTOR, DEFAULT_INDEX_CAPACITY, DEFAULT_LEAF_CAPACITY,
    DEFAULT_NEAR_MINIMUM_OVERLAP_FACTOR, DEFAULT_REINSERT_FACTOR,
    DEFAULT_SPLIT_DISTRIBUTION_FACTOR, MAX_DIMENSION, MIN_CAPACITY,
};
use super::rtree_types::{RTreeVariant, SpatialError, SpatialResult};

/// Configuration of an R-Tree.
///
/// # Purpose
/// `RTreeConfig` fixes the shape of a tree when it is created: the split
/// strategy, the dimensionality, node capacities and the R*-Tree tuning
/// constants. The whole configuration is persisted in the tree header, so a
/// reopened tree keeps it (see [`ReopenOptions`] for what may change).
///
/// # Characteristics
/// - **Validated**: [`RTreeConfig::validate`] runs before a tree is created
/// - **Builder Style**: `with_*` setters consume and return the config
/// - **Serializable**: doubles as the properties snapshot of a live tree
///
/// # Usage
/// ```rust
/// use spatial_rtree::{RTreeConfig, RTreeVariant};
///
/// let config = RTreeConfig::default()
///     .with_variant(RTreeVariant::Quadratic)
///     .with_leaf_capacity(16)
///     .with_index_capacity(16)
///     .with_near_minimum_overlap_factor(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RTreeConfig {
    pub variant: RTreeVariant,
    pub dimension: usize,
    /// Minimum occupancy as a fraction of capacity, in (0, 1]
    pub fill_factor: f64,
    pub index_capacity: usize,
    pub leaf_capacity: usize,
    /// Candidates evaluated for overlap cost when choosing an R*-Tree subtree
    pub near_minimum_overlap_factor: usize,
    pub split_distribution_factor: f64,
    pub reinsert_factor: f64,
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self {
            variant: RTreeVariant::RStar,
            dimension: DEFAULT_DIMENSION,
            fill_factor: DEFAULT_FILL_FACTOR,
            index_capacity: DEFAULT_INDEX_CAPACITY,
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
            near_minimum_overlap_factor: DEFAULT_NEAR_MINIMUM_OVERLAP_FACTOR,
            split_distribution_factor: DEFAULT_SPLIT_DISTRIBUTION_FACTOR,
            reinsert_factor: DEFAULT_REINSERT_FACTOR,
        }
    }
}

impl RTreeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variant(mut self, variant: RTreeVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_fill_factor(mut self, fill_factor: f64) -> Self {
        self.fill_factor = fill_factor;
        self
    }

    pub fn with_index_capacity(mut self, capacity: usize) -> Self {
        self.index_capacity = capacity;
        self
    }

    pub fn with_leaf_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = capacity;
        self
    }

    pub fn with_near_minimum_overlap_factor(mut self, factor: usize) -> Self {
        self.near_minimum_overlap_factor = factor;
        self
    }

    pub fn with_split_distribution_factor(mut self, factor: f64) -> Self {
        self.split_distribution_factor = factor;
        self
    }

    pub fn with_reinsert_factor(mut self, factor: f64) -> Self {
        self.reinsert_factor = factor;
        self
    }

    /// Checks every field against its accepted range.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidArgument`] naming the first offending
    /// field.
    pub fn validate(&self) -> SpatialResult<()> {
        if self.dimension < 1 || self.dimension > MAX_DIMENSION {
            return Err(invalid(&format!(
                "Dimension must be in [1, {}], got {}",
                MAX_DIMENSION, self.dimension
            )));
        }
        if !(self.fill_factor > 0.0 && self.fill_factor <= 1.0) {
            return Err(invalid(&format!(
                "Fill factor must be in (0.0, 1.0], got {}",
                self.fill_factor
            )));
        }
        if self.index_capacity < MIN_CAPACITY {
            return Err(invalid(&format!(
                "Index capacity must be at least {}, got {}",
                MIN_CAPACITY, self.index_capacity
            )));
        }
        if self.leaf_capacity < MIN_CAPACITY {
            return Err(invalid(&format!(
                "Leaf capacity must be at least {}, got {}",
                MIN_CAPACITY, self.leaf_capacity
            )));
        }
        if i32::try_from(self.index_capacity.max(self.leaf_capacity)).is_err() {
            return Err(invalid("Capacities must fit in a 32-bit integer"));
        }
        if self.near_minimum_overlap_factor < 1 {
            return Err(invalid("Near minimum overlap factor must be at least 1"));
        }
        if !(self.split_distribution_factor > 0.0 && self.split_distribution_factor < 1.0) {
            return Err(invalid(&format!(
                "Split distribution factor must be in (0.0, 1.0), got {}",
                self.split_distribution_factor
            )));
        }
        if !(self.reinsert_factor > 0.0 && self.reinsert_factor < 1.0) {
            return Err(invalid(&format!(
                "Reinsert factor must be in (0.0, 1.0), got {}",
                self.reinsert_factor
            )));
        }
        Ok(())
    }

    /// Capacity of a node at `level`.
    pub(crate) fn capacity_for_level(&self, level: u32) -> usize {
        if level == 0 {
            self.leaf_capacity
        } else {
            self.index_capacity
        }
    }

    /// `floor(capacity * fill_factor)`, the occupancy below which a node is
    /// condensed away after a delete.
    pub(crate) fn minimum_load(&self, capacity: usize) -> usize {
        (capacity as f64 * self.fill_factor).floor() as usize
    }
}

fn invalid(message: &str) -> SpatialError {
    SpatialError::InvalidArgument(message.to_string())
}

/// Settings that may change when an existing tree is reopened.
///
/// Everything else is fixed by the stored header. Unset fields keep the
/// stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReopenOptions {
    pub variant: Option<RTreeVariant>,
    pub near_minimum_overlap_factor: Option<usize>,
    pub split_distribution_factor: Option<f64>,
    pub reinsert_factor: Option<f64>,
}

impl ReopenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variant(mut self, variant: RTreeVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn with_near_minimum_overlap_factor(mut self, factor: usize) -> Self {
        self.near_minimum_overlap_factor = Some(factor);
        self
    }

    pub fn with_split_distribution_factor(mut self, factor: f64) -> Self {
        self.split_distribution_factor = Some(factor);
        self
    }

    pub fn with_reinsert_factor(mut self, factor: f64) -> Self {
        self.reinsert_factor = Some(factor);
        self
    }

    /// Applies the overrides to a stored configuration and re-validates it.
    pub(crate) fn apply(&self, stored: RTreeConfig) -> SpatialResult<RTreeConfig> {
        let mut config = stored;
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(factor) = self.near_minimum_overlap_factor {
            config.near_minimum_overlap_factor = factor;
        }
        if let Some(factor) = self.split_distribution_factor {
            config.split_distribution_factor = factor;
        }
        if let Some(factor) = self.reinsert_factor {
            config.reinsert_factor = factor;
        }
        config.validate()?;
        Ok(config)
    }
}
