use std::fs;
use tempfile::TempDir;

use caserag_core::error::Error;
use caserag_core::types::{CaseDocument, ChunkMeta, Family};
use caserag_embed::hashing_service;
use caserag_store::builder::build_case;
use caserag_store::merge::merge;
use caserag_store::store::{load_store, write_store};

fn case_doc(project: &str, id: &str, chunks_json: &str) -> CaseDocument {
    serde_json::from_str(&format!(
        r#"{{"antipattern_type": "CH", "project_name": "{}", "commit_number": "commit_1", "id": "{}", "chunks": {}}}"#,
        project, id, chunks_json
    ))
    .expect("case document")
}

/// Two CH cases sharing `superClass`/`subClass` CODE chunks and a
/// `parent_file_summary` TEXT chunk each.
fn build_two_case_corpus(cases_root: &std::path::Path) {
    let service = hashing_service(8, 6);
    for (group_id, project) in [(0i64, "alpha"), (1i64, "beta")] {
        let doc = case_doc(
            project,
            "1",
            r#"[
                {"file_path": "s.java", "chunk_type": "superClass", "ast_subtree": "class Super {}"},
                {"file_path": "c.java", "chunk_type": "subClass", "ast_subtree": "class Sub {}"},
                {"file_path": "s.java", "chunk_type": "parent_file_summary", "llm_description": "top of the hierarchy"}
            ]"#,
        );
        let dest = cases_root.join(doc.case_key().folder_path());
        build_case(&doc, group_id, &service, &dest).expect("build case");
    }
}

#[test]
fn merge_partitions_records_by_chunk_type() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("vectorstore");
    let target = tmp.path().join("merged");
    build_two_case_corpus(&source);

    let summary = merge(&source, &target).expect("merge");
    assert_eq!(summary.stores_merged, 4, "two cases, two categories each");
    assert_eq!(summary.records_pooled, 6);
    assert_eq!(summary.records_dropped, 0);

    let super_pool = load_store(&target.join("CODE/superClass")).expect("superClass pool");
    assert_eq!(super_pool.len(), 2, "one superClass chunk per case");
    let mut group_ids: Vec<i64> = super_pool.metadata.iter().map(|m| m.group_id).collect();
    group_ids.sort_unstable();
    assert_eq!(group_ids, vec![0, 1], "pool entries keep case identity");

    let text_pool = load_store(&target.join("TEXT/parent_file_summary")).expect("TEXT pool");
    assert_eq!(text_pool.len(), 2);
    assert_eq!(text_pool.dim(), Some(6));
}

#[test]
fn merge_drops_records_without_resolvable_chunk_type() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("vectorstore");
    let target = tmp.path().join("merged");

    let service = hashing_service(8, 6);
    let doc = case_doc(
        "alpha",
        "1",
        r#"[
            {"file_path": "s.java", "chunk_type": "superClass", "ast_subtree": "class Super {}"},
            {"file_path": "x.java", "ast_subtree": "class NoType {}"},
            {"file_path": "y.java", "chunk_type": "intermediateClass", "ast_subtree": "class WrongFamily {}"}
        ]"#,
    );
    build_case(&doc, 0, &service, &source.join(doc.case_key().folder_path())).expect("build");

    let summary = merge(&source, &target).expect("merge");
    assert_eq!(summary.records_pooled, 1);
    assert_eq!(
        summary.records_dropped, 2,
        "missing and out-of-vocabulary labels both drop"
    );
    assert!(target.join("CODE/superClass").is_dir());
    assert!(!target.join("CODE/intermediateClass").exists());
}

#[test]
fn merge_is_a_full_rebuild() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("vectorstore");
    let target = tmp.path().join("merged");
    build_two_case_corpus(&source);

    let first = merge(&source, &target).expect("first merge");

    // Plant a stale pool; a rebuild must not preserve it.
    let stale = target.join("CODE/child_method");
    write_store(
        &stale,
        &[vec![0.0f32; 8]],
        &[ChunkMeta {
            antipattern_type: Family::Ch,
            project_name: "stale".to_string(),
            commit_number: "c".to_string(),
            id: "9".to_string(),
            group_id: 42,
            chunk_type: Some("child_method".to_string()),
            level: 0,
            chunk_id: "child_method".to_string(),
            parent_chunk_id: None,
        }],
        8,
    )
    .unwrap();

    let second = merge(&source, &target).expect("second merge");
    assert_eq!(first.records_pooled, second.records_pooled);
    assert!(!stale.exists(), "stale pools are cleared by the rebuild");

    let pool = load_store(&target.join("CODE/subClass")).expect("pool");
    assert_eq!(pool.len(), 2, "per-type counts are stable across reruns");
}

#[test]
fn merge_skips_stores_with_mismatched_dimension() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("vectorstore");
    let target = tmp.path().join("merged");

    // Sorted discovery pins the dimension from the "alpha" store.
    let alpha = hashing_service(8, 6);
    let doc_a = case_doc("alpha", "1", r#"[{"file_path": "s.java", "chunk_type": "superClass", "ast_subtree": "class A {}"}]"#);
    build_case(&doc_a, 0, &alpha, &source.join(doc_a.case_key().folder_path())).expect("alpha");

    let beta = hashing_service(16, 6);
    let doc_b = case_doc("beta", "1", r#"[{"file_path": "s.java", "chunk_type": "superClass", "ast_subtree": "class B {}"}]"#);
    build_case(&doc_b, 1, &beta, &source.join(doc_b.case_key().folder_path())).expect("beta");

    let summary = merge(&source, &target).expect("merge");
    assert_eq!(summary.stores_skipped, 1);

    let pool = load_store(&target.join("CODE/superClass")).expect("pool");
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.dim(), Some(8), "pool keeps the pinned dimension");
}

#[test]
fn merge_missing_source_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = merge(&tmp.path().join("nope"), &tmp.path().join("merged")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
}

#[test]
fn merge_refuses_target_equal_to_source() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("vectorstore");
    build_two_case_corpus(&source);
    let err = merge(&source, &source).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
}
