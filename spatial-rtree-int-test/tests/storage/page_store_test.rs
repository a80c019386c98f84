use spatial_rtree::{
    DiskStorageConfig, DiskStorageManager, MemoryStorageManager, SpatialError, StorageManager,
    NEW_PAGE,
};
use spatial_rtree_int_test::test_util::{random_path, run_test, TestContext};
use std::fs;

fn round_trip(storage: &dyn StorageManager) {
    let bytes: Vec<u8> = (0..=255u8).cycle().take(1500).collect();

    let id = storage.store_byte_array(NEW_PAGE, &bytes).unwrap();
    assert_eq!(storage.load_byte_array(id).unwrap(), bytes);

    storage.delete_byte_array(id).unwrap();
    assert!(matches!(
        storage.load_byte_array(id),
        Err(SpatialError::InvalidPage(missing)) if missing == id
    ));
    assert!(matches!(
        storage.delete_byte_array(id),
        Err(SpatialError::InvalidPage(_))
    ));
}

fn remove_files(path: &str) {
    let _ = fs::remove_file(format!("{}.idx", path));
    let _ = fs::remove_file(format!("{}.dat", path));
}

#[test]
fn test_memory_store_load_delete() {
    round_trip(&MemoryStorageManager::new());
}

#[test]
fn test_disk_store_load_delete() {
    let path = random_path();
    {
        let config = DiskStorageConfig::new(&path).with_page_size(256);
        let storage = DiskStorageManager::open(&config).unwrap();
        round_trip(&storage);
    }
    remove_files(&path);
}

#[test]
fn test_disk_overwrite_keeps_identifier() {
    let path = random_path();
    {
        let config = DiskStorageConfig::new(&path).with_page_size(64);
        let storage = DiskStorageManager::open(&config).unwrap();

        let id = storage.store_byte_array(NEW_PAGE, &[1u8; 200]).unwrap();
        assert_eq!(storage.allocated_page_count(), 4);

        // Shrinking returns the surplus pages to the free set.
        assert_eq!(storage.store_byte_array(id, &[2u8; 10]).unwrap(), id);
        assert_eq!(storage.load_byte_array(id).unwrap(), vec![2u8; 10]);
        assert_eq!(storage.free_page_count(), 3);

        let other = storage.store_byte_array(NEW_PAGE, &[3u8; 100]).unwrap();
        assert_ne!(other, id);
        assert_eq!(storage.free_page_count(), 1);
        assert_eq!(storage.allocated_page_count(), 4);

        assert!(matches!(
            storage.store_byte_array(1000, b"nope"),
            Err(SpatialError::InvalidPage(1000))
        ));
    }
    remove_files(&path);
}

#[test]
fn test_disk_pages_survive_reopen() {
    let path = random_path();
    let (kept, dropped) = {
        let config = DiskStorageConfig::new(&path).with_page_size(128);
        let storage = DiskStorageManager::open(&config).unwrap();
        let kept = storage.store_byte_array(NEW_PAGE, b"kept page").unwrap();
        let dropped = storage.store_byte_array(NEW_PAGE, &[9u8; 300]).unwrap();
        storage.delete_byte_array(dropped).unwrap();
        storage.flush().unwrap();
        (kept, dropped)
    };

    {
        // A different page size is ignored for existing files.
        let config = DiskStorageConfig::new(&path).with_page_size(4096);
        let storage = DiskStorageManager::open(&config).unwrap();
        assert_eq!(storage.page_size(), 128);
        assert_eq!(storage.load_byte_array(kept).unwrap(), b"kept page".to_vec());
        assert!(storage.load_byte_array(dropped).is_err());
        assert_eq!(storage.free_page_count(), 3);
    }
    remove_files(&path);
}

#[test]
fn test_tree_pages_live_in_context_storage() {
    run_test(
        spatial_rtree_int_test::test_util::create_test_context,
        |ctx: TestContext| {
            let storage = ctx.storage();
            let header = storage.load_byte_array(ctx.tree().header_id())?;
            assert!(!header.is_empty());
            Ok(())
        },
        spatial_rtree_int_test::test_util::cleanup,
    )
}
