//! # Profile Store Integration Tests
//!
//! End-to-end behaviour of add_profile / find_similar against a real storage directory.

use neurotwin::{Filters, NeuroTwinError, NewProfile, ProfileStore, StoreConfig};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> ProfileStore {
    ProfileStore::open(StoreConfig::in_dir(dir.path())).unwrap()
}

fn profile(name: &str, life_stage: &str) -> NewProfile {
    NewProfile::new(name, "female", life_stage, "25-40")
}

fn life_stage_filter(stage: &str) -> Filters {
    Filters::from([("life_stage".to_string(), stage.to_string())])
}

#[test]
fn test_append_then_find() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    store.add_profile(&[0.9, 0.1, 0.1, 0.1, 0.1], profile("Grace", "senior")).unwrap();

    let vector = [0.6, 0.5, 0.4, 0.7, 0.3];
    let added = store.add_profile(&vector, profile("Ada", "adult")).unwrap();
    assert_eq!(added.vector_id, 1);

    let matches = store.find_similar(&vector, 1, &Filters::new()).unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].distance, 0.0);
    assert_eq!(matches[0].record, added);
    assert_eq!(matches[0].record.display_name, "Ada");
    assert_eq!(matches[0].record.gender_label, "female");
    assert_eq!(matches[0].record.life_stage, "adult");
    assert_eq!(matches[0].record.age_range, "25-40");
}

#[test]
fn test_monotonic_ids_and_length_invariant() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);

    for i in 0..10 {
        let level = i as f64 / 10.0;
        let record = store
            .add_profile(&[level; 5], profile(&format!("user-{}", i), "adult"))
            .unwrap();
        assert_eq!(record.vector_id, i);

        let info = store.info().unwrap();
        assert_eq!(info.vector_count, info.record_count);
        assert_eq!(info.record_count, i as usize + 1);
    }

    let ids: Vec<u64> = store.records().unwrap().iter().map(|r| r.vector_id).collect();
    assert_eq!(ids, (0..10).collect::<Vec<u64>>());
}

#[test]
fn test_k_exceeds_size_returns_everything_ordered() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    store.add_profile(&[1.0, 1.0, 1.0, 1.0, 1.0], profile("far", "adult")).unwrap();
    store.add_profile(&[0.0, 0.0, 0.0, 0.0, 0.0], profile("near", "adult")).unwrap();
    store.add_profile(&[0.5, 0.5, 0.5, 0.5, 0.5], profile("middle", "adult")).unwrap();

    let matches = store.find_similar(&[0.1, 0.0, 0.0, 0.0, 0.0], 50, &Filters::new()).unwrap();

    let names: Vec<&str> = matches.iter().map(|m| m.record.display_name.as_str()).collect();
    assert_eq!(names, vec!["near", "middle", "far"]);
    for pair in matches.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[test]
fn test_filter_exclusion_keeps_distance_order() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    store.add_profile(&[0.3; 5], profile("adult-far", "adult")).unwrap();
    store.add_profile(&[0.0; 5], profile("teen-near", "teen")).unwrap();
    store.add_profile(&[0.1; 5], profile("adult-near", "adult")).unwrap();
    store.add_profile(&[0.2; 5], profile("teen-far", "teen")).unwrap();

    let matches = store.find_similar(&[0.0; 5], 10, &life_stage_filter("adult")).unwrap();

    let names: Vec<&str> = matches.iter().map(|m| m.record.display_name.as_str()).collect();
    assert_eq!(names, vec!["adult-near", "adult-far"]);
    assert!(matches.iter().all(|m| m.record.life_stage == "adult"));
}

#[test]
fn test_filters_are_anded() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    store.add_profile(&[0.1; 5], NewProfile::new("A", "male", "adult", "25-40")).unwrap();
    store.add_profile(&[0.2; 5], NewProfile::new("B", "female", "adult", "25-40")).unwrap();
    store.add_profile(&[0.3; 5], NewProfile::new("C", "female", "teen", "18-25")).unwrap();

    let filters = Filters::from([
        ("gender".to_string(), "female".to_string()),
        ("life_stage".to_string(), "adult".to_string()),
    ]);
    let matches = store.find_similar(&[0.0; 5], 10, &filters).unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].record.display_name, "B");
}

#[test]
fn test_filter_with_no_survivors() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    store.add_profile(&[0.1; 5], profile("Ada", "adult")).unwrap();

    let matches = store.find_similar(&[0.1; 5], 10, &life_stage_filter("child")).unwrap();
    assert!(matches.is_empty());
}

#[test]
fn test_empty_store_returns_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);

    for k in [1, 5, 1000] {
        let matches = store.find_similar(&[0.4, 0.2, 0.9, 0.1, 0.0], k, &Filters::new()).unwrap();
        assert!(matches.is_empty());
    }
}

#[test]
fn test_invalid_arguments() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    store.add_profile(&[0.1; 5], profile("Ada", "adult")).unwrap();

    let zero_k = store.find_similar(&[0.1; 5], 0, &Filters::new());
    assert!(matches!(zero_k.unwrap_err(), NeuroTwinError::InvalidArgument(_)));

    let empty_key = Filters::from([(String::new(), "adult".to_string())]);
    let result = store.find_similar(&[0.1; 5], 1, &empty_key);
    assert!(matches!(result.unwrap_err(), NeuroTwinError::InvalidArgument(_)));

    let short = store.add_profile(&[0.1; 3], profile("Grace", "senior"));
    assert!(matches!(
        short.unwrap_err(),
        NeuroTwinError::DimensionMismatch { expected: 5, actual: 3 }
    ));

    let nan = store.add_profile(&[0.1, 0.1, f64::NAN, 0.1, 0.1], profile("Grace", "senior"));
    assert!(matches!(nan.unwrap_err(), NeuroTwinError::InvalidArgument(_)));

    assert_eq!(store.len().unwrap(), 1);
    let info = store.info().unwrap();
    assert_eq!(info.vector_count, 1);
}

#[test]
fn test_shared_display_name_shares_user_id() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    let first = store.add_profile(&[0.1; 5], profile("Sam", "adult")).unwrap();
    let second = store.add_profile(&[0.9; 5], profile("Sam", "teen")).unwrap();

    assert_eq!(first.user_id, second.user_id);
    assert_ne!(first.vector_id, second.vector_id);
}
