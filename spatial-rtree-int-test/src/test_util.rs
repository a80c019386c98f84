use rand::Rng;
use spatial_rtree::{
    DataId, MemoryStorageManager, RTree, RTreeConfig, RTreeVariant, Region, ReopenOptions,
    SpatialResult, StorageManager,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::{env, fs, io};

/// Runs `test` on the context built by `before`, then always runs `after`,
/// even when the test fails or panics.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> SpatialResult<()>,
    B: Fn() -> SpatialResult<TestContext>,
    A: Fn(TestContext) -> SpatialResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| test(ctx.clone())));
    let after_result = after(ctx);

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => panic!("Test failed: {:?}", e),
        Err(panic_err) => panic::resume_unwind(panic_err),
    }
    if let Err(e) = after_result {
        panic!("After run failed: {:?}", e);
    }
}

#[derive(Clone)]
pub struct TestContext {
    path: String,
    storage: Arc<dyn StorageManager>,
    tree: RTree,
}

impl TestContext {
    pub fn new(path: String, storage: Arc<dyn StorageManager>, tree: RTree) -> Self {
        Self {
            path,
            storage,
            tree,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn storage(&self) -> Arc<dyn StorageManager> {
        self.storage.clone()
    }

    pub fn tree(&self) -> RTree {
        self.tree.clone()
    }

    /// Opens a second handle on the same storage from the stored header.
    pub fn reopen(&self, options: ReopenOptions) -> SpatialResult<RTree> {
        self.tree.flush()?;
        RTree::open(self.storage.clone(), self.tree.header_id(), options)
    }
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(id.to_string()).to_string_lossy().into_owned()
}

/// Small nodes so that a few hundred entries already build a deep tree.
pub fn test_config(variant: RTreeVariant) -> RTreeConfig {
    RTreeConfig::default()
        .with_variant(variant)
        .with_leaf_capacity(8)
        .with_index_capacity(8)
        .with_near_minimum_overlap_factor(6)
}

#[cfg(feature = "disk")]
pub fn create_storage(path: &str) -> SpatialResult<Arc<dyn StorageManager>> {
    use spatial_rtree::{DiskStorageConfig, DiskStorageManager};

    let config = DiskStorageConfig::new(path)
        .with_page_size(512)
        .with_overwrite(true);
    Ok(Arc::new(DiskStorageManager::open(&config)?))
}

#[cfg(not(feature = "disk"))]
pub fn create_storage(_path: &str) -> SpatialResult<Arc<dyn StorageManager>> {
    Ok(Arc::new(MemoryStorageManager::new()))
}

pub fn create_test_context() -> SpatialResult<TestContext> {
    create_test_context_with(test_config(RTreeVariant::RStar))
}

pub fn create_test_context_with(config: RTreeConfig) -> SpatialResult<TestContext> {
    let path = random_path();
    let storage = create_storage(&path)?;
    let tree = RTree::create(storage.clone(), config)?;
    Ok(TestContext::new(path, storage, tree))
}

/// Context over in-memory storage regardless of the enabled features.
pub fn create_memory_context_with(config: RTreeConfig) -> SpatialResult<TestContext> {
    let storage: Arc<dyn StorageManager> = Arc::new(MemoryStorageManager::new());
    let tree = RTree::create(storage.clone(), config)?;
    Ok(TestContext::new(String::new(), storage, tree))
}

pub fn cleanup(ctx: TestContext) -> SpatialResult<()> {
    ctx.tree().flush()?;
    let path = ctx.path().to_string();
    drop(ctx);

    if path.is_empty() {
        return Ok(());
    }
    for extension in ["idx", "dat"] {
        match fs::remove_file(format!("{}.{}", path, extension)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub fn boxed(low_x: f64, low_y: f64, high_x: f64, high_y: f64) -> Region {
    Region::new(vec![low_x, low_y], vec![high_x, high_y]).expect("valid region")
}

pub fn unit_box(x: f64, y: f64) -> Region {
    boxed(x, y, x + 1.0, y + 1.0)
}

/// Random boxes with sides up to `max_side` inside `[0, extent]^2`.
pub fn random_boxes<R: Rng>(rng: &mut R, count: usize, extent: f64, max_side: f64) -> Vec<Region> {
    (0..count)
        .map(|_| {
            let x = rng.random_range(0.0..extent);
            let y = rng.random_range(0.0..extent);
            let w = rng.random_range(0.0..max_side);
            let h = rng.random_range(0.0..max_side);
            boxed(x, y, x + w, y + h)
        })
        .collect()
}

/// Identifiers of the live entries whose box intersects `query`, sorted.
pub fn brute_force_intersection(entries: &[(DataId, Region)], query: &Region) -> Vec<DataId> {
    let mut ids: Vec<DataId> = entries
        .iter()
        .filter(|(_, region)| region.intersects(query))
        .map(|(id, _)| *id)
        .collect();
    ids.sort();
    ids
}

pub fn sorted(mut ids: Vec<DataId>) -> Vec<DataId> {
    ids.sort();
    ids
}
