//! FS: End-to-end memory-service scenarios (FS-09 through FS-12), run
//! against a file-backed database rather than the inline `facade::tests`
//! module's in-memory fixture, so the full initialize -> operate -> shutdown
//! lifecycle is exercised the way a real caller would drive it.

use memstore_core::MemStoreConfig;
use memstore_storage::{MemoryService, SearchOptions, SearchScope, Table};

fn service_at(path: &std::path::Path) -> MemoryService {
    let mut cfg = MemStoreConfig::default();
    cfg.database.url = format!("file:{}", path.display());
    cfg.database.max_connections = 4;
    cfg.vector.vector_dimensions = 3;
    let svc = MemoryService::new(cfg);
    svc.initialize().unwrap();
    svc
}

#[test]
fn fs_09_create_then_retrieve_rule_has_equal_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service_at(&dir.path().join("store.db"));

    let rule = svc
        .create_rule(
            "r1",
            "Always validate input",
            &["sec".to_string(), "validate".to_string()],
            1,
            None,
        )
        .unwrap();
    assert_eq!(rule.created_at, rule.updated_at);

    let fetched = svc.get_rule("r1").unwrap().unwrap();
    assert_eq!(fetched.content, "Always validate input");
    assert_eq!(fetched.created_at, fetched.updated_at);
}

#[test]
fn fs_10_update_bumps_updated_at_and_cache_reflects_it() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service_at(&dir.path().join("store.db"));

    let created = svc.create_rule("r1", "original", &[], 1, None).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let updated = svc
        .update_rule("r1", None, None, Some(2), None)
        .unwrap()
        .unwrap();

    assert_eq!(updated.tier, 2);
    assert!(updated.updated_at > created.created_at);

    let fetched = svc.get_rule("r1").unwrap().unwrap();
    assert_eq!(fetched.tier, 2, "cache must reflect the update, not the stale create");
}

#[test]
fn fs_11_semantic_search_top_hit_is_the_matching_rule() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service_at(&dir.path().join("store.db"));

    let e1 = vec![1.0, 0.0, 0.0];
    let e2 = vec![0.0, 1.0, 0.0];
    svc.create_rule_with_embedding("r1", "c1", &[], 1, None, &e1).unwrap();
    svc.create_rule_with_embedding("r2", "c2", &[], 1, None, &e2).unwrap();

    let opts = SearchOptions {
        limit: 10,
        threshold: 0.1,
        include_metadata: true,
    };
    let results = svc.semantic_search(&e1, &opts, &SearchScope::default()).unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].id, "r1");
    assert!((0.999..=1.001).contains(&results[0].similarity_score));
}

#[test]
fn fs_12_cross_table_search_surfaces_all_three_types() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service_at(&dir.path().join("store.db"));

    let e = vec![0.5, 0.5, 0.5];
    svc.create_rule_with_embedding("r1", "c", &[], 1, None, &e).unwrap();
    svc.create_project_doc_with_embedding("d1", "proj", "t", "c", None, &[], None, &e)
        .unwrap();
    svc.create_ref_with_embedding("x1", "name", "c", None, None, &e).unwrap();

    let opts = SearchOptions {
        limit: 3,
        threshold: 0.5,
        include_metadata: false,
    };
    let results = svc.semantic_search(&e, &opts, &SearchScope::default()).unwrap();

    assert_eq!(results.len(), 3);
    let types: std::collections::HashSet<_> = results.iter().map(|r| r.r#type).collect();
    assert_eq!(types.len(), 3);
    assert!(types.contains(Table::Rule.kind()));
    assert!(types.contains(Table::ProjectDoc.kind()));
    assert!(types.contains(Table::Ref.kind()));
    for r in &results {
        assert!((r.similarity_score - 1.0).abs() < 0.001);
    }
}
