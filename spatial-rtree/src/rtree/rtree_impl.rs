//! RTree handle, shared tree state and physical node I/O.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::rtree_config::{RTreeConfig, ReopenOptions};
use super::rtree_constants::NEW_PAGE;
use super::rtree_events::{NodeEventListener, NodeEvents, NodeListeners};
use super::rtree_node::{Entry, Node, OverflowTable};
use super::rtree_types::{DataId, PageId, SpatialError, SpatialResult, Statistics, TreeHeader};
use crate::geometry::Shape;
use crate::storage::StorageManager;

/// A paged R-Tree over a [`StorageManager`].
///
/// Nodes are never cached: every access goes through the storage manager,
/// so the tree works equally over memory and disk storage. The handle is
/// cheap to clone and may be shared across threads. Mutations take the
/// tree-wide write lock, queries the read lock.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use spatial_rtree::{MemoryStorageManager, RTree, RTreeConfig, Region};
///
/// let storage = Arc::new(MemoryStorageManager::new());
/// let tree = RTree::create(storage, RTreeConfig::default()).expect("create");
///
/// let region = Region::new(vec![0.0, 0.0], vec![1.0, 1.0]).expect("region");
/// tree.insert_data(Some(b"home".as_slice()), &region, 1).expect("insert");
///
/// let mut hits: Vec<i32> = Vec::new();
/// tree.intersection_query(&region, &mut hits).expect("query");
/// assert_eq!(hits, vec![1]);
/// ```
#[derive(Clone)]
pub struct RTree {
    pub(crate) inner: Arc<RTreeInner>,
}

pub(crate) struct RTreeInner {
    pub(crate) storage: Arc<dyn StorageManager>,
    pub(crate) config: RTreeConfig,
    pub(crate) state: RwLock<TreeState>,
    pub(crate) counters: Counters,
    pub(crate) listeners: NodeListeners,
}

/// Mutable structural state, guarded by the tree-wide lock.
#[derive(Debug, Clone)]
pub(crate) struct TreeState {
    pub header_id: PageId,
    pub root_id: PageId,
    pub node_count: u64,
    pub data_count: u64,
    pub tree_height: u32,
    pub nodes_in_level: Vec<u32>,
}

impl TreeState {
    pub fn level_count(&self, level: u32) -> u32 {
        self.nodes_in_level.get(level as usize).copied().unwrap_or(0)
    }

    pub fn set_level_count(&mut self, level: u32, count: u32) {
        let level = level as usize;
        if self.nodes_in_level.len() <= level {
            self.nodes_in_level.resize(level + 1, 0);
        }
        self.nodes_in_level[level] = count;
    }
}

/// Operation counters. Reads and query results are bumped under the shared
/// lock, so all of them are atomics.
#[derive(Default)]
pub(crate) struct Counters {
    reads: AtomicU64,
    writes: AtomicU64,
    splits: AtomicU64,
    adjustments: AtomicU64,
    query_results: AtomicU64,
}

impl Counters {
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_split(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adjustment(&self) {
        self.adjustments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query_result(&self) {
        self.query_results.fetch_add(1, Ordering::Relaxed);
    }
}

impl RTreeInner {
    /// Loads and decodes a node. Every call is one physical read.
    pub(crate) fn read_node(&self, id: PageId) -> SpatialResult<Node> {
        let bytes = self.storage.load_byte_array(id)?;
        let node = Node::load(id, &bytes, &self.config)?;
        self.counters.record_read();
        self.listeners.notify(NodeEvents::Read, &node);
        Ok(node)
    }

    pub(crate) fn check_dimension(&self, shape: &dyn Shape, operation: &str) -> SpatialResult<()> {
        if shape.dimension() != self.config.dimension {
            return Err(SpatialError::InvalidArgument(format!(
                "{}: shape has {} dimensions, tree has {}",
                operation,
                shape.dimension(),
                self.config.dimension
            )));
        }
        Ok(())
    }

    fn store_header(&self, state: &mut TreeState) -> SpatialResult<()> {
        let header = TreeHeader {
            root_id: state.root_id,
            config: self.config.clone(),
            node_count: state.node_count,
            data_count: state.data_count,
            tree_height: state.tree_height,
            nodes_in_level: state.nodes_in_level.clone(),
        };
        state.header_id = self.storage.store_byte_array(state.header_id, &header.encode())?;
        Ok(())
    }
}

impl Drop for RTreeInner {
    fn drop(&mut self) {
        let mut state = self.state.write();
        if let Err(err) = self.store_header(&mut state) {
            log::warn!("Failed to store R-Tree header on drop: {}", err);
        }
    }
}

/// Mutation context: the tree plus exclusive access to its state. Created
/// under the write lock for one top-level insert or delete.
pub(crate) struct TreeWriter<'a> {
    pub(crate) tree: &'a RTreeInner,
    pub(crate) state: &'a mut TreeState,
}

impl<'a> TreeWriter<'a> {
    pub(crate) fn new(tree: &'a RTreeInner, state: &'a mut TreeState) -> Self {
        Self { tree, state }
    }

    /// Stores a node. A node still carrying `NEW_PAGE` receives its
    /// identifier here and is counted in the structural statistics.
    pub(crate) fn write_node(&mut self, node: &mut Node) -> SpatialResult<PageId> {
        let page = self
            .tree
            .storage
            .store_byte_array(node.identifier, &node.store())?;

        if node.identifier == NEW_PAGE {
            node.identifier = page;
            self.state.node_count += 1;
            let count = self.state.level_count(node.level) + 1;
            self.state.set_level_count(node.level, count);
        }

        self.tree.counters.record_write();
        self.tree.listeners.notify(NodeEvents::Write, node);
        Ok(page)
    }

    pub(crate) fn delete_node(&mut self, node: &Node) -> SpatialResult<()> {
        self.tree.storage.delete_byte_array(node.identifier)?;

        self.state.node_count = self.state.node_count.saturating_sub(1);
        let count = self.state.level_count(node.level).saturating_sub(1);
        self.state.set_level_count(node.level, count);

        self.tree.listeners.notify(NodeEvents::Delete, node);
        Ok(())
    }

    fn insert(&mut self, entry: Entry) -> SpatialResult<()> {
        let root = self.tree.read_node(self.state.root_id)?;
        let mut overflow = OverflowTable::new(root.level as usize);
        let mut path = Vec::new();
        let mut leaf = self.tree.choose_subtree(root, &entry.region, 0, &mut path)?;
        self.insert_data(&mut leaf, entry, &mut path, &mut overflow)?;
        self.state.data_count += 1;
        Ok(())
    }
}

impl RTree {
    /// Creates an empty tree: validates `config`, writes a root leaf and
    /// stores the header record.
    pub fn create(storage: Arc<dyn StorageManager>, config: RTreeConfig) -> SpatialResult<Self> {
        config.validate()?;

        let inner = RTreeInner {
            storage,
            config,
            state: RwLock::new(TreeState {
                header_id: NEW_PAGE,
                root_id: NEW_PAGE,
                node_count: 0,
                data_count: 0,
                tree_height: 1,
                nodes_in_level: vec![0],
            }),
            counters: Counters::default(),
            listeners: NodeListeners::default(),
        };

        {
            let mut state = inner.state.write();
            let mut root = Node::new_leaf(&inner.config);
            let root_id = TreeWriter::new(&inner, &mut state).write_node(&mut root)?;
            state.root_id = root_id;
            inner.store_header(&mut state)?;

            log::debug!(
                "Created {} R-Tree with root page {} and header page {}",
                inner.config.variant,
                state.root_id,
                state.header_id
            );
        }

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Reopens a tree from the header stored under `header_id`.
    pub fn open(
        storage: Arc<dyn StorageManager>,
        header_id: PageId,
        options: ReopenOptions,
    ) -> SpatialResult<Self> {
        let header = TreeHeader::decode(&storage.load_byte_array(header_id)?)?;
        if header.tree_height == 0 {
            return Err(SpatialError::InvalidState(format!(
                "Header {} records an empty tree height",
                header_id
            )));
        }
        let config = options.apply(header.config)?;

        log::debug!(
            "Opened {} R-Tree from header page {}: {} entries, height {}",
            config.variant,
            header_id,
            header.data_count,
            header.tree_height
        );

        Ok(Self {
            inner: Arc::new(RTreeInner {
                storage,
                config,
                state: RwLock::new(TreeState {
                    header_id,
                    root_id: header.root_id,
                    node_count: header.node_count,
                    data_count: header.data_count,
                    tree_height: header.tree_height,
                    nodes_in_level: header.nodes_in_level,
                }),
                counters: Counters::default(),
                listeners: NodeListeners::default(),
            }),
        })
    }

    /// Identifier of the header record, needed to reopen the tree.
    pub fn header_id(&self) -> PageId {
        self.inner.state.read().header_id
    }

    /// Inserts a box with an optional payload. An empty payload is stored
    /// as no payload.
    pub fn insert_data(
        &self,
        payload: Option<&[u8]>,
        shape: &dyn Shape,
        id: DataId,
    ) -> SpatialResult<()> {
        self.inner.check_dimension(shape, "insert_data")?;

        let payload = payload.filter(|p| !p.is_empty()).map(<[u8]>::to_vec);
        let entry = Entry::new(shape.mbr(), id, payload);

        let mut state = self.inner.state.write();
        TreeWriter::new(&self.inner, &mut state).insert(entry)
    }

    /// Deletes the entry with identifier `id` whose box equals the MBR of
    /// `shape`. Returns false when no such entry exists.
    pub fn delete_data(&self, shape: &dyn Shape, id: DataId) -> SpatialResult<bool> {
        self.inner.check_dimension(shape, "delete_data")?;
        let region = shape.mbr();

        let mut state = self.inner.state.write();
        let root = self.inner.read_node(state.root_id)?;
        let mut path = Vec::new();
        let Some(leaf) = self.inner.find_leaf(root, &region, id, &mut path)? else {
            return Ok(false);
        };

        let mut writer = TreeWriter::new(&self.inner, &mut state);
        writer.delete_data(leaf, &region, id, &mut path)?;
        writer.state.data_count = writer.state.data_count.saturating_sub(1);
        Ok(true)
    }

    /// Configuration in effect for this tree.
    pub fn properties(&self) -> RTreeConfig {
        self.inner.config.clone()
    }

    pub fn statistics(&self) -> Statistics {
        let state = self.inner.state.read();
        let counters = &self.inner.counters;
        Statistics {
            reads: counters.reads.load(Ordering::Relaxed),
            writes: counters.writes.load(Ordering::Relaxed),
            splits: counters.splits.load(Ordering::Relaxed),
            adjustments: counters.adjustments.load(Ordering::Relaxed),
            query_results: counters.query_results.load(Ordering::Relaxed),
            node_count: state.node_count,
            data_count: state.data_count,
            tree_height: state.tree_height,
            nodes_in_level: state.nodes_in_level.clone(),
        }
    }

    /// Registers a listener for one kind of physical node operation.
    pub fn subscribe(&self, event: NodeEvents, listener: NodeEventListener) {
        self.inner.listeners.subscribe(event, listener);
    }

    /// Stores the header record, then flushes the storage manager.
    pub fn flush(&self) -> SpatialResult<()> {
        let mut state = self.inner.state.write();
        self.inner.store_header(&mut state)?;
        self.inner.storage.flush()
    }
}

impl fmt::Display for RTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = &self.inner.config;
        writeln!(f, "Variant: {}", config.variant)?;
        writeln!(f, "Dimension: {}", config.dimension)?;
        writeln!(f, "Fill factor: {}", config.fill_factor)?;
        writeln!(f, "Index capacity: {}", config.index_capacity)?;
        writeln!(f, "Leaf capacity: {}", config.leaf_capacity)?;
        write!(f, "{}", self.statistics())
    }
}

impl fmt::Debug for RTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RTree")
            .field("config", &self.inner.config)
            .field("state", &*self.inner.state.read())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
