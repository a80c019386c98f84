//! Byte-blob storage managers backing the R-Tree.
//!
//! The tree never holds node references across calls. Every node lives in a
//! storage manager under an integer page identifier and is reloaded through
//! [`StorageManager::load_byte_array`] whenever it is needed.
//!
//! Two implementations are provided:
//! - [`MemoryStorageManager`]: a vector of blobs with id reuse
//! - [`DiskStorageManager`]: fixed-size pages in a data file, with a page
//!   index and free list kept in a companion index file

pub mod disk;
pub mod memory;

pub use disk::{DiskStorageConfig, DiskStorageManager};
pub use memory::MemoryStorageManager;

use crate::rtree::rtree_types::{PageId, SpatialResult};

pub use crate::rtree::rtree_constants::NEW_PAGE;

/// A byte-blob store keyed by page identifier.
///
/// Methods take `&self`; implementations synchronize internally so that one
/// manager can be shared behind an `Arc` by the tree and by callers.
pub trait StorageManager: Send + Sync {
    /// Returns the blob stored under `id`.
    ///
    /// Fails with `SpatialError::InvalidPage` when `id` is unknown.
    fn load_byte_array(&self, id: PageId) -> SpatialResult<Vec<u8>>;

    /// Stores `data` and returns its identifier.
    ///
    /// With `id == NEW_PAGE` a fresh identifier is allocated, reusing a freed
    /// one when available. Otherwise the blob under `id` is overwritten and
    /// `id` is returned. Fails with `SpatialError::InvalidPage` when `id` is
    /// neither `NEW_PAGE` nor currently allocated.
    fn store_byte_array(&self, id: PageId, data: &[u8]) -> SpatialResult<PageId>;

    /// Frees the blob under `id` for reuse.
    fn delete_byte_array(&self, id: PageId) -> SpatialResult<()>;

    /// Persists buffered allocation metadata.
    fn flush(&self) -> SpatialResult<()>;
}
