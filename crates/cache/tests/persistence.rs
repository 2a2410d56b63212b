use std::path::{Path, PathBuf};
use std::time::Duration;

use cache::{CacheError, CacheOptions, CacheRegistry};
use serde_json::{json, Value};
use tokio::time::sleep;
use uuid::Uuid;

fn tmp_file(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("json_cache_persist_{}_{}", tag, Uuid::new_v4())).join("nested").join("store.json")
}

fn cleanup(path: &Path) {
    if let Some(dir) = path.parent().and_then(Path::parent) {
        let _ = std::fs::remove_dir_all(dir);
    }
}

fn read_json(path: &Path) -> Result<Value, anyhow::Error> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[tokio::test]
async fn saved_state_survives_a_fresh_registry() -> Result<(), anyhow::Error> {
    let path = tmp_file("round_trip");

    let first = CacheRegistry::new();
    let cache = first.get_or_create(&path, CacheOptions::default())?;
    cache.set_item("a", 1)?;
    cache.save()?;

    let second = CacheRegistry::new();
    let reloaded = second.get_or_create(&path, CacheOptions::default())?;
    assert!(!reloaded.same_instance(&cache));
    assert_eq!(reloaded.get_item("a")?, Some(json!(1)));

    cleanup(&path);
    Ok(())
}

#[tokio::test]
async fn reset_reloads_from_disk() -> Result<(), anyhow::Error> {
    let path = tmp_file("reset");
    let registry = CacheRegistry::new();

    registry.get_or_create(&path, CacheOptions::default())?.set_item("kept", "yes")?;
    registry.get_or_create(&path, CacheOptions::default())?.save()?;
    registry.reset();

    let reloaded = registry.get_or_create(&path, CacheOptions::default())?;
    assert_eq!(reloaded.get_item("kept")?, Some(json!("yes")));
    cleanup(&path);
    Ok(())
}

#[tokio::test]
async fn burst_of_mutations_lands_once_after_the_window() -> Result<(), anyhow::Error> {
    let path = tmp_file("debounce");
    let registry = CacheRegistry::new();
    let cache = registry.get_or_create(&path, CacheOptions::default().with_wait(100))?;

    for i in 1..=5 {
        cache.set_item("count", i)?;
        sleep(Duration::from_millis(10)).await;
    }
    assert!(cache.is_write_pending());
    assert!(!path.exists(), "nothing is written while mutations keep coming");

    sleep(Duration::from_millis(60)).await;
    assert!(!path.exists(), "window restarts on every mutation");

    sleep(Duration::from_millis(300)).await;
    assert!(!cache.is_write_pending());
    assert_eq!(read_json(&path)?, json!({ "count": 5 }));

    cleanup(&path);
    Ok(())
}

#[tokio::test]
async fn debounced_write_uses_state_at_fire_time() -> Result<(), anyhow::Error> {
    let path = tmp_file("fire_time");
    let registry = CacheRegistry::new();
    let cache = registry.get_or_create(&path, CacheOptions::default().with_wait(50))?;

    cache.set_item("a", 1)?;
    cache.update_item("b", |v| *v = json!([1]))?;
    cache.clear().set_item("c", 3)?;

    sleep(Duration::from_millis(250)).await;
    assert_eq!(read_json(&path)?, json!({ "c": 3 }));
    cleanup(&path);
    Ok(())
}

#[tokio::test]
async fn background_write_failures_are_swallowed() -> Result<(), anyhow::Error> {
    let path = tmp_file("swallowed");
    let registry = CacheRegistry::new();
    let cache = registry.get_or_create(&path, CacheOptions::default().with_wait(20))?;

    // pull the directory out from under the cache
    cleanup(&path);
    cache.set_item("lost", true)?;
    sleep(Duration::from_millis(150)).await;

    assert!(!path.exists());
    assert_eq!(cache.get_item("lost")?, Some(json!(true)));
    assert!(matches!(cache.save(), Err(CacheError::Io { .. })), "synchronous save reports the failure");
    Ok(())
}

#[tokio::test]
async fn malformed_file_fails_construction() -> Result<(), anyhow::Error> {
    let path = tmp_file("malformed");
    std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
    std::fs::write(&path, "")?;

    let registry = CacheRegistry::new();
    let err = registry.get_or_create(&path, CacheOptions::default()).unwrap_err();
    assert!(matches!(err, CacheError::MalformedStoreFile { .. }));
    assert!(!registry.contains(&path), "failed construction registers nothing");

    cleanup(&path);
    Ok(())
}

#[tokio::test]
async fn existing_file_seeds_storage() -> Result<(), anyhow::Error> {
    let path = tmp_file("seeded");
    std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
    std::fs::write(&path, r#"{ "z": 1, "a": [true, null] }"#)?;

    let registry = CacheRegistry::new();
    let cache = registry.get_or_create(&path, CacheOptions::default())?;
    assert_eq!(cache.get_item("a")?, Some(json!([true, null])));

    cache.save()?;
    let written = std::fs::read_to_string(&path)?;
    assert!(written.find("\"z\"") < written.find("\"a\""), "key order survives a save");
    cleanup(&path);
    Ok(())
}

#[tokio::test]
async fn eject_guard_flushes_only_ejectable_caches() -> Result<(), anyhow::Error> {
    let kept = tmp_file("ejectable");
    let skipped = tmp_file("plain");
    let registry = CacheRegistry::new();

    let ejectable = registry.get_or_create(&kept, CacheOptions::default().with_ejectable(true).with_wait(60_000))?;
    let plain = registry.get_or_create(&skipped, CacheOptions::default().with_wait(60_000))?;
    ejectable.set_item("flushed", 1)?;
    plain.set_item("flushed", 1)?;

    {
        let _guard = registry.eject_guard();
    }

    assert_eq!(read_json(&kept)?, json!({ "flushed": 1 }));
    assert!(!skipped.exists());
    cleanup(&kept);
    cleanup(&skipped);
    Ok(())
}
