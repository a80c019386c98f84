//! Disk storage manager.
//!
//! Blobs are split across fixed-size pages of a data file (`<base>.dat`).
//! A page index, mapping each blob identifier to its length and page list,
//! lives in memory and is written to `<base>.idx` on flush together with the
//! free page set and the next unused page number. A blob's identifier is the
//! number of its first page, which never changes while the blob is alive.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{StorageManager, NEW_PAGE};
use crate::rtree::rtree_constants::DEFAULT_PAGE_SIZE;
use crate::rtree::rtree_types::{PageId, SpatialError, SpatialResult};

/// Where and how a [`DiskStorageManager`] keeps its files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskStorageConfig {
    /// Base path; `.idx` and `.dat` are appended
    pub path: PathBuf,
    pub page_size: usize,
    /// Truncate existing files instead of reopening them
    pub overwrite: bool,
}

impl DiskStorageConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
            overwrite: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn file_with_extension(&self, extension: &str) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }

    pub fn index_path(&self) -> PathBuf {
        self.file_with_extension("idx")
    }

    pub fn data_path(&self) -> PathBuf {
        self.file_with_extension("dat")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PageEntry {
    length: usize,
    pages: Vec<PageId>,
}

/// Contents of the `.idx` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PageIndex {
    page_size: usize,
    next_page: PageId,
    empty_pages: BTreeSet<PageId>,
    entries: BTreeMap<PageId, PageEntry>,
}

impl PageIndex {
    fn new(page_size: usize) -> Self {
        Self {
            page_size,
            next_page: 0,
            empty_pages: BTreeSet::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Smallest free page first, otherwise a page past the end of the file.
    fn allocate_page(&mut self) -> PageId {
        match self.empty_pages.pop_first() {
            Some(page) => page,
            None => {
                let page = self.next_page;
                self.next_page += 1;
                page
            }
        }
    }
}

struct DiskFiles {
    data_file: File,
    index_path: PathBuf,
    index: PageIndex,
}

impl DiskFiles {
    fn write_page(&mut self, page: PageId, chunk: &[u8]) -> SpatialResult<()> {
        let page_size = self.index.page_size;
        let mut buffer = vec![0u8; page_size];
        buffer[..chunk.len()].copy_from_slice(chunk);

        self.data_file
            .seek(SeekFrom::Start(page as u64 * page_size as u64))?;
        self.data_file.write_all(&buffer)?;
        Ok(())
    }

    fn read_page(&mut self, page: PageId, len: usize, out: &mut Vec<u8>) -> SpatialResult<()> {
        let page_size = self.index.page_size;
        self.data_file
            .seek(SeekFrom::Start(page as u64 * page_size as u64))?;
        let start = out.len();
        out.resize(start + len, 0);
        self.data_file.read_exact(&mut out[start..])?;
        Ok(())
    }

    fn write_index(&mut self) -> SpatialResult<()> {
        let bytes = bincode::serde::encode_to_vec(&self.index, bincode::config::legacy())
            .map_err(|e| SpatialError::Serialization(e.to_string()))?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.index_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        self.data_file.sync_all()?;
        Ok(())
    }
}

/// Stores blobs in page-sized chunks of a data file.
///
/// A blob larger than one page occupies several pages, not necessarily
/// contiguous. Overwriting a blob reuses its pages in order, takes further
/// pages from the free set, and returns surplus pages to the free set.
/// When a page write fails the page index is left as it was before the call.
pub struct DiskStorageManager {
    files: Mutex<DiskFiles>,
}

impl DiskStorageManager {
    /// Opens the files named by `config`, creating them when they are missing
    /// or when `overwrite` is set.
    pub fn open(config: &DiskStorageConfig) -> SpatialResult<Self> {
        if config.page_size == 0 {
            return Err(SpatialError::InvalidArgument(
                "Page size must be positive".to_string(),
            ));
        }

        let index_path = config.index_path();
        let data_path = config.data_path();
        let exists = index_path.exists() && data_path.exists();

        let files = if config.overwrite || !exists {
            log::debug!("Creating disk storage at {:?}", data_path);
            let data_file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&data_path)?;
            let mut files = DiskFiles {
                data_file,
                index_path,
                index: PageIndex::new(config.page_size),
            };
            files.write_index()?;
            files
        } else {
            log::debug!("Opening existing disk storage at {:?}", data_path);
            let data_file = OpenOptions::new().read(true).write(true).open(&data_path)?;
            let mut bytes = Vec::new();
            File::open(&index_path)?.read_to_end(&mut bytes)?;
            let (index, _): (PageIndex, usize) =
                bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())
                    .map_err(|e| SpatialError::Serialization(e.to_string()))?;
            if index.page_size != config.page_size {
                log::warn!(
                    "Ignoring configured page size {}, storage was created with {}",
                    config.page_size,
                    index.page_size
                );
            }
            DiskFiles {
                data_file,
                index_path,
                index,
            }
        };

        Ok(Self {
            files: Mutex::new(files),
        })
    }

    pub fn page_size(&self) -> usize {
        self.files.lock().index.page_size
    }

    /// Pages currently available for reuse.
    pub fn free_page_count(&self) -> usize {
        self.files.lock().index.empty_pages.len()
    }

    /// Pages ever allocated in the data file.
    pub fn allocated_page_count(&self) -> usize {
        self.files.lock().index.next_page as usize
    }
}

impl StorageManager for DiskStorageManager {
    fn load_byte_array(&self, id: PageId) -> SpatialResult<Vec<u8>> {
        let mut files = self.files.lock();
        let entry = files
            .index
            .entries
            .get(&id)
            .cloned()
            .ok_or(SpatialError::InvalidPage(id))?;

        let page_size = files.index.page_size;
        let mut data = Vec::with_capacity(entry.length);
        let mut remaining = entry.length;
        for page in entry.pages {
            let len = remaining.min(page_size);
            files.read_page(page, len, &mut data)?;
            remaining -= len;
        }
        Ok(data)
    }

    fn store_byte_array(&self, id: PageId, data: &[u8]) -> SpatialResult<PageId> {
        let mut files = self.files.lock();
        let page_size = files.index.page_size;
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![data]
        } else {
            data.chunks(page_size).collect()
        };

        let previous = if id == NEW_PAGE {
            Vec::new()
        } else {
            files
                .index
                .entries
                .get(&id)
                .map(|entry| entry.pages.clone())
                .ok_or(SpatialError::InvalidPage(id))?
        };

        // Allocation is undone if any page write fails.
        let saved_next_page = files.index.next_page;
        let saved_empty_pages = files.index.empty_pages.clone();

        let mut reusable = previous.into_iter();
        let mut pages = Vec::with_capacity(chunks.len());
        for _ in 0..chunks.len() {
            let page = match reusable.next() {
                Some(page) => page,
                None => files.index.allocate_page(),
            };
            pages.push(page);
        }

        let written = pages
            .iter()
            .zip(chunks)
            .try_for_each(|(&page, chunk)| files.write_page(page, chunk));
        if let Err(e) = written {
            log::error!("Failed to store page {}: {}", id, e);
            files.index.next_page = saved_next_page;
            files.index.empty_pages = saved_empty_pages;
            return Err(e);
        }

        files.index.empty_pages.extend(reusable);
        let new_id = pages[0];
        files.index.entries.insert(
            new_id,
            PageEntry {
                length: data.len(),
                pages,
            },
        );
        Ok(new_id)
    }

    fn delete_byte_array(&self, id: PageId) -> SpatialResult<()> {
        let mut files = self.files.lock();
        let entry = files
            .index
            .entries
            .remove(&id)
            .ok_or(SpatialError::InvalidPage(id))?;
        files.index.empty_pages.extend(entry.pages);
        Ok(())
    }

    fn flush(&self) -> SpatialResult<()> {
        self.files.lock().write_index()
    }
}

impl Drop for DiskStorageManager {
    fn drop(&mut self) {
        if let Err(e) = self.files.get_mut().write_index() {
            log::warn!("Failed to flush disk storage on drop: {}", e);
        }
    }
}
