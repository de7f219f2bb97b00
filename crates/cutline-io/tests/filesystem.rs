//! Integration tests against a scratch directory under the system temp dir.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use cutline_io::{FsMaskCache, IoError, load_config, read_image, write_png};
use cutline_pipeline::types::RgbaImage;
use cutline_pipeline::{CuttingConfig, Mask, MaskCache, MaskExtractor, extract_cached};

/// A fresh directory unique to one test.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cutline-io-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn missing_config_file_yields_defaults() {
    let dir = scratch("missing-config");
    let config = load_config(&dir.join("nope.json")).unwrap();
    assert_eq!(config, CuttingConfig::default());
}

#[test]
fn partial_config_file_is_merged_over_defaults() {
    let dir = scratch("partial-config");
    let path = dir.join("cutting.json");
    std::fs::write(&path, r#"{ "print_offset_mm": 1.5, "keyring_hole": { "diameter_mm": 5.0 } }"#)
        .unwrap();
    let config = load_config(&path).unwrap();
    assert!((config.print_offset_mm - 1.5).abs() < f64::EPSILON);
    assert!((config.keyring_hole.diameter_mm - 5.0).abs() < f64::EPSILON);
    let defaults = CuttingConfig::default();
    assert!((config.cutting_offset_mm - defaults.cutting_offset_mm).abs() < f64::EPSILON);
    assert!(
        (config.keyring_hole.edge_distance_mm - defaults.keyring_hole.edge_distance_mm).abs()
            < f64::EPSILON
    );
}

#[test]
fn malformed_config_file_is_an_error() {
    let dir = scratch("bad-config");
    let path = dir.join("cutting.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(load_config(&path), Err(IoError::Json(_))));
}

#[test]
fn invalid_config_values_are_rejected() {
    let dir = scratch("invalid-config");
    let path = dir.join("cutting.json");
    std::fs::write(&path, r#"{ "cutting_offset_mm": -1.0 }"#).unwrap();
    assert!(matches!(load_config(&path), Err(IoError::Pipeline(_))));
}

#[test]
fn mask_cache_round_trips_through_disk() {
    let dir = scratch("mask-cache");
    let cache = FsMaskCache::new(dir.join("masks")).unwrap();
    let mask = Mask::from_fn(20, 10, |x, y| x > y);
    cache.save("upload/photo.png", &mask).unwrap();
    assert!(cache.entry_path("upload/photo.png").starts_with(cache.dir()));
    assert_eq!(cache.load("upload/photo.png"), Some(mask));
    assert!(cache.load("other.png").is_none());
}

#[test]
fn corrupt_cache_entry_is_a_miss() {
    let dir = scratch("corrupt-cache");
    let cache = FsMaskCache::new(&dir).unwrap();
    std::fs::write(cache.entry_path("broken"), b"not a png").unwrap();
    assert!(cache.load("broken").is_none());
}

#[test]
fn concurrent_writers_leave_a_complete_entry() {
    let dir = scratch("concurrent-cache");
    let cache = Arc::new(FsMaskCache::new(&dir).unwrap());
    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                let mask = Mask::from_fn(16, 16, |x, _| x < i + 1);
                cache.save("shared", &mask).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let loaded = cache.load("shared").unwrap();
    assert_eq!(loaded.width(), 16);
    let count = loaded.foreground_count();
    assert!(count % 16 == 0 && (16..=128).contains(&count));
    let leftovers = std::fs::read_dir(&dir)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn cached_extraction_uses_the_disk_cache() {
    let dir = scratch("cached-extraction");
    let image_path = dir.join("badge.png");
    let raster = RgbaImage::from_fn(40, 40, |x, y| {
        let alpha = if (8..32).contains(&x) && (8..32).contains(&y) {
            255
        } else {
            0
        };
        image::Rgba([90, 20, 160, alpha])
    });
    write_png(&image_path, &raster).unwrap();

    let source = read_image(&image_path).unwrap();
    let cache = FsMaskCache::new(dir.join("masks")).unwrap();
    let first = extract_cached(&MaskExtractor::default(), &cache, "badge.png", &source).unwrap();
    assert!(cache.entry_path("badge.png").exists());

    // An extractor with no strategies can only succeed from the cache.
    let second =
        extract_cached(&MaskExtractor::new(Vec::new()), &cache, "badge.png", &source).unwrap();
    assert_eq!(first.mask, second.mask);
    assert_eq!(first.strategy, "alpha");
    assert_eq!(second.strategy, "cached");
}
