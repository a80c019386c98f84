use parking_lot::Mutex;

use super::{StorageManager, NEW_PAGE};
use crate::rtree::rtree_types::{PageId, SpatialError, SpatialResult};

/// Keeps every blob in memory.
///
/// Deleted slots are remembered and handed out again, most recently freed
/// first, before the buffer grows.
#[derive(Default)]
pub struct MemoryStorageManager {
    inner: Mutex<MemoryPages>,
}

#[derive(Default)]
struct MemoryPages {
    buffer: Vec<Option<Vec<u8>>>,
    empty_pages: Vec<PageId>,
}

impl MemoryPages {
    fn slot(&mut self, id: PageId) -> SpatialResult<&mut Option<Vec<u8>>> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.buffer.get_mut(index))
            .ok_or(SpatialError::InvalidPage(id))
    }
}

impl MemoryStorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live blobs.
    pub fn page_count(&self) -> usize {
        self.inner.lock().buffer.iter().filter(|slot| slot.is_some()).count()
    }
}

impl StorageManager for MemoryStorageManager {
    fn load_byte_array(&self, id: PageId) -> SpatialResult<Vec<u8>> {
        let mut pages = self.inner.lock();
        pages
            .slot(id)?
            .as_ref()
            .cloned()
            .ok_or(SpatialError::InvalidPage(id))
    }

    fn store_byte_array(&self, id: PageId, data: &[u8]) -> SpatialResult<PageId> {
        let mut pages = self.inner.lock();
        if id == NEW_PAGE {
            return match pages.empty_pages.pop() {
                Some(reused) => {
                    *pages.slot(reused)? = Some(data.to_vec());
                    Ok(reused)
                }
                None => {
                    pages.buffer.push(Some(data.to_vec()));
                    PageId::try_from(pages.buffer.len() - 1).map_err(|_| {
                        SpatialError::InvalidState("Memory storage is out of identifiers".to_string())
                    })
                }
            };
        }

        let slot = pages.slot(id)?;
        if slot.is_none() {
            return Err(SpatialError::InvalidPage(id));
        }
        *slot = Some(data.to_vec());
        Ok(id)
    }

    fn delete_byte_array(&self, id: PageId) -> SpatialResult<()> {
        let mut pages = self.inner.lock();
        let slot = pages.slot(id)?;
        if slot.take().is_none() {
            return Err(SpatialError::InvalidPage(id));
        }
        pages.empty_pages.push(id);
        Ok(())
    }

    fn flush(&self) -> SpatialResult<()> {
        Ok(())
    }
}
