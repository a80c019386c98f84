//! Core types shared across the R-Tree implementation.
//!
//! This module defines:
//! - Error types and result types
//! - Identifier aliases and the tree variant
//! - Statistics snapshots
//! - Query result entries
//! - The header record and the big-endian wire helpers

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

use super::rtree_config::RTreeConfig;
use crate::region::Region;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur in spatial indexing operations
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid page identifier: {0}")]
    InvalidPage(PageId),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;

/// Page identifier handed out by a storage manager
pub type PageId = i32;

/// Caller-supplied identifier of a data entry
pub type DataId = i32;

// ============================================================================
// Tree Variant
// ============================================================================

/// Split and subtree-selection strategy of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RTreeVariant {
    Quadratic,
    Linear,
    RStar,
}

impl RTreeVariant {
    /// Code stored in the header record.
    pub fn code(&self) -> i32 {
        match self {
            RTreeVariant::Quadratic => 1,
            RTreeVariant::Linear => 2,
            RTreeVariant::RStar => 3,
        }
    }
}

impl TryFrom<i32> for RTreeVariant {
    type Error = SpatialError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(RTreeVariant::Quadratic),
            2 => Ok(RTreeVariant::Linear),
            3 => Ok(RTreeVariant::RStar),
            other => Err(SpatialError::InvalidState(format!(
                "Unknown tree variant code {}",
                other
            ))),
        }
    }
}

impl fmt::Display for RTreeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RTreeVariant::Quadratic => "quadratic",
            RTreeVariant::Linear => "linear",
            RTreeVariant::RStar => "rstar",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Snapshot of tree-wide counters and structural statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub reads: u64,
    pub writes: u64,
    pub splits: u64,
    pub adjustments: u64,
    pub query_results: u64,
    pub node_count: u64,
    pub data_count: u64,
    pub tree_height: u32,
    /// Number of nodes at each level, leaves first
    pub nodes_in_level: Vec<u32>,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reads: {}", self.reads)?;
        writeln!(f, "Writes: {}", self.writes)?;
        writeln!(f, "Splits: {}", self.splits)?;
        writeln!(f, "Adjustments: {}", self.adjustments)?;
        writeln!(f, "Query results: {}", self.query_results)?;
        writeln!(f, "Nodes: {}", self.node_count)?;
        writeln!(f, "Data: {}", self.data_count)?;
        writeln!(f, "Tree height: {}", self.tree_height)?;
        for (level, count) in self.nodes_in_level.iter().enumerate() {
            writeln!(f, "Level {} pages: {}", level, count)?;
        }
        Ok(())
    }
}

// ============================================================================
// Query Entries
// ============================================================================

/// Anything the nearest-neighbor search scores: a subtree or a data entry.
pub trait SpatialEntry {
    fn identifier(&self) -> i32;

    fn region(&self) -> &Region;
}

/// A data entry reported to a visitor.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub(crate) identifier: DataId,
    pub(crate) region: Region,
    pub(crate) payload: Option<Vec<u8>>,
}

impl Data {
    pub fn new(identifier: DataId, region: Region, payload: Option<Vec<u8>>) -> Self {
        Self {
            identifier,
            region,
            payload,
        }
    }

    pub fn identifier(&self) -> DataId {
        self.identifier
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }
}

impl SpatialEntry for Data {
    fn identifier(&self) -> i32 {
        self.identifier
    }

    fn region(&self) -> &Region {
        &self.region
    }
}

// ============================================================================
// Header Record
// ============================================================================

/// Tree-wide configuration and structural statistics persisted as one
/// record through the storage manager.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeHeader {
    pub root_id: PageId,
    pub config: RTreeConfig,
    pub node_count: u64,
    pub data_count: u64,
    pub tree_height: u32,
    pub nodes_in_level: Vec<u32>,
}

impl TreeHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(80 + 4 * self.nodes_in_level.len());
        buf.put_i32(self.root_id);
        buf.put_i32(self.config.variant.code());
        buf.put_f64(self.config.fill_factor);
        buf.put_i32(self.config.index_capacity as i32);
        buf.put_i32(self.config.leaf_capacity as i32);
        buf.put_i32(self.config.near_minimum_overlap_factor as i32);
        buf.put_f64(self.config.split_distribution_factor);
        buf.put_f64(self.config.reinsert_factor);
        buf.put_i32(self.config.dimension as i32);
        buf.put_i64(self.node_count as i64);
        buf.put_i64(self.data_count as i64);
        buf.put_i32(self.tree_height as i32);
        for level in 0..self.tree_height as usize {
            let count = self.nodes_in_level.get(level).copied().unwrap_or(0);
            buf.put_i32(count as i32);
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> SpatialResult<Self> {
        let mut reader = WireReader::new(bytes);
        let root_id = reader.get_i32()?;
        let variant = RTreeVariant::try_from(reader.get_i32()?)?;
        let fill_factor = reader.get_f64()?;
        let index_capacity = reader.get_count()?;
        let leaf_capacity = reader.get_count()?;
        let near_minimum_overlap_factor = reader.get_count()?;
        let split_distribution_factor = reader.get_f64()?;
        let reinsert_factor = reader.get_f64()?;
        let dimension = reader.get_count()?;
        let node_count = reader.get_i64()?;
        let data_count = reader.get_i64()?;
        let tree_height = reader.get_count()?;

        // One int32 per level must follow; check before sizing the vector.
        reader.ensure(tree_height.saturating_mul(4))?;
        let mut nodes_in_level = Vec::with_capacity(tree_height);
        for _ in 0..tree_height {
            nodes_in_level.push(reader.get_count()? as u32);
        }

        if node_count < 0 || data_count < 0 {
            return Err(SpatialError::InvalidState(format!(
                "Negative counters in header: nodes {}, data {}",
                node_count, data_count
            )));
        }

        Ok(Self {
            root_id,
            config: RTreeConfig {
                variant,
                dimension,
                fill_factor,
                index_capacity,
                leaf_capacity,
                near_minimum_overlap_factor,
                split_distribution_factor,
                reinsert_factor,
            },
            node_count: node_count as u64,
            data_count: data_count as u64,
            tree_height: tree_height as u32,
            nodes_in_level,
        })
    }
}

// ============================================================================
// Wire Helpers
// ============================================================================

/// Bounds-checked big-endian cursor over a stored blob.
pub(crate) struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn ensure(&self, needed: usize) -> SpatialResult<()> {
        if self.buf.remaining() < needed {
            return Err(SpatialError::Serialization(format!(
                "Unexpected end of buffer: needed {} bytes, {} left",
                needed,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn get_i32(&mut self) -> SpatialResult<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn get_i64(&mut self) -> SpatialResult<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn get_f64(&mut self) -> SpatialResult<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    /// Reads an int32 that must be non-negative.
    pub fn get_count(&mut self) -> SpatialResult<usize> {
        let value = self.get_i32()?;
        usize::try_from(value)
            .map_err(|_| SpatialError::Serialization(format!("Negative count {}", value)))
    }

    pub fn get_bytes(&mut self, len: usize) -> SpatialResult<Vec<u8>> {
        self.ensure(len)?;
        let bytes = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(bytes)
    }
}
