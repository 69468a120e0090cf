use std::fs;
use tempfile::TempDir;

use caserag_core::error::Error;
use caserag_core::types::{CaseDocument, ChunkMeta, Family, QUERY_GROUP_ID};
use caserag_embed::hashing_service;
use caserag_store::builder::{build_case, build_corpus, build_query_case};
use caserag_store::store::{load_store, store_exists, write_store, METADATA_FILE, VECTORS_FILE};

fn meta(group_id: i64, chunk_type: &str) -> ChunkMeta {
    ChunkMeta {
        antipattern_type: Family::Ch,
        project_name: "kafka".to_string(),
        commit_number: "commit_1".to_string(),
        id: "7".to_string(),
        group_id,
        chunk_type: Some(chunk_type.to_string()),
        level: 0,
        chunk_id: chunk_type.to_string(),
        parent_chunk_id: None,
    }
}

#[test]
fn write_then_load_round_trips_both_artifacts() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("CODE");

    let vectors = vec![vec![1.0f32, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
    let metadata = vec![meta(0, "parent_method"), meta(0, "child_method")];
    write_store(&dest, &vectors, &metadata, 3).expect("write store");

    assert!(store_exists(&dest));
    let entries: Vec<_> = fs::read_dir(&dest).unwrap().collect();
    assert_eq!(entries.len(), 2, "exactly two artifacts");
    assert!(dest.join(VECTORS_FILE).is_file());
    assert!(dest.join(METADATA_FILE).is_file());

    let loaded = load_store(&dest).expect("load store");
    assert_eq!(loaded.vectors, vectors);
    assert_eq!(loaded.metadata, metadata);
    assert_eq!(loaded.dim(), Some(3));
}

#[test]
fn write_rejects_length_mismatch() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("CODE");

    let vectors = vec![vec![1.0f32, 0.0]];
    let metadata = vec![meta(0, "parent_method"), meta(0, "child_method")];
    let err = write_store(&dest, &vectors, &metadata, 2).unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "got {:?}", err);
    assert!(!dest.exists(), "nothing written on schema failure");
}

#[test]
fn write_rejects_wrong_dimension() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("TEXT");

    let vectors = vec![vec![1.0f32, 0.0, 0.0]];
    let metadata = vec![meta(0, "parent_file_summary")];
    let err = write_store(&dest, &vectors, &metadata, 4).unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "got {:?}", err);
}

#[test]
fn load_missing_store_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = load_store(&tmp.path().join("CODE")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
}

#[test]
fn load_rejects_desynced_artifacts() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("CODE");
    write_store(&dest, &[vec![1.0f32, 0.0]], &[meta(0, "parent_method")], 2).unwrap();

    // Truncate the metadata side-table behind the store's back.
    fs::write(dest.join(METADATA_FILE), "[]").unwrap();
    let err = load_store(&dest).unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "got {:?}", err);
}

#[test]
fn build_case_preserves_chunk_counts_per_category() {
    let tmp = TempDir::new().unwrap();
    let service = hashing_service(16, 8);

    let doc: CaseDocument = serde_json::from_str(
        r#"{
            "antipattern_type": "CH",
            "project_name": "kafka",
            "commit_number": "commit_1",
            "id": "7",
            "chunks": [
                {"file_path": "a.java", "chunk_type": "parent_method", "chunk_id": "pm", "level": 1, "ast_subtree": "(method a)"},
                {"file_path": "b.java", "chunk_type": "child_method", "ast_subtree": "(method b)"},
                {"file_path": "a.java", "chunk_type": "parent_method_summary", "llm_description": "delegates to child"}
            ]
        }"#,
    )
    .unwrap();

    let dest = tmp.path().join("CH/kafka/commit_1/7");
    let embedded = build_case(&doc, 4, &service, &dest).expect("build case");
    assert_eq!(embedded, 3, "every content-bearing chunk is embedded");

    let code = load_store(&dest.join("CODE")).expect("code store");
    assert_eq!(code.len(), 2);
    assert_eq!(code.dim(), Some(16));
    assert!(code.metadata.iter().all(|m| m.group_id == 4));
    // chunk_id falls back to the chunk-type label when the splitter
    // omitted it.
    assert_eq!(code.metadata[1].chunk_id, "child_method");

    let text = load_store(&dest.join("TEXT")).expect("text store");
    assert_eq!(text.len(), 1);
    assert_eq!(text.dim(), Some(8));
}

#[test]
fn build_corpus_assigns_sequential_group_ids_in_sorted_order() {
    let tmp = TempDir::new().unwrap();
    let cases = tmp.path().join("cases");
    let stores = tmp.path().join("vectorstore");
    let service = hashing_service(8, 8);

    for (project, id) in [("alpha", "1"), ("beta", "2")] {
        let dir = cases.join("CH").join(project).join("commit_1").join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("{}_{}_CH_chunk.json", project, id)),
            format!(
                r#"{{
                    "antipattern_type": "CH",
                    "project_name": "{}",
                    "commit_number": "commit_1",
                    "id": "{}",
                    "group_id": 99,
                    "chunks": [
                        {{"file_path": "x.java", "chunk_type": "superClass", "ast_subtree": "class A {{}}"}}
                    ]
                }}"#,
                project, id
            ),
        )
        .unwrap();
    }

    let summary = build_corpus(&cases, Family::Ch, &service, &stores).expect("build corpus");
    assert_eq!(summary.cases_built, 2);
    assert_eq!(summary.cases_failed, 0);
    assert_eq!(summary.chunks_embedded, 2);

    let first = load_store(&stores.join("CH/alpha/commit_1/1/CODE")).unwrap();
    let second = load_store(&stores.join("CH/beta/commit_1/2/CODE")).unwrap();
    assert_eq!(first.metadata[0].group_id, 0, "splitter ids are ignored");
    assert_eq!(second.metadata[0].group_id, 1);
}

#[test]
fn build_corpus_isolates_unreadable_documents() {
    let tmp = TempDir::new().unwrap();
    let cases = tmp.path().join("cases");
    let stores = tmp.path().join("vectorstore");
    let service = hashing_service(8, 8);

    let good = cases.join("CH/alpha/commit_1/1");
    fs::create_dir_all(&good).unwrap();
    fs::write(
        good.join("alpha_1_CH_chunk.json"),
        r#"{"antipattern_type": "CH", "project_name": "alpha", "commit_number": "commit_1", "id": "1",
            "chunks": [{"file_path": "x.java", "chunk_type": "subClass", "ast_subtree": "class B {}"}]}"#,
    )
    .unwrap();

    let bad = cases.join("CH/beta/commit_1/2");
    fs::create_dir_all(&bad).unwrap();
    fs::write(bad.join("beta_2_CH_chunk.json"), "{ not json").unwrap();

    let summary = build_corpus(&cases, Family::Ch, &service, &stores).expect("build corpus");
    assert_eq!(summary.cases_built, 1);
    assert_eq!(summary.cases_failed, 1);
    assert!(stores.join("CH/alpha/commit_1/1/CODE").is_dir());
}

#[test]
fn build_corpus_without_family_dir_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let service = hashing_service(8, 8);
    let err = build_corpus(tmp.path(), Family::Mh, &service, &tmp.path().join("out")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
}

#[test]
fn build_query_case_stores_under_the_case_folder() {
    let tmp = TempDir::new().unwrap();
    let case_dir = tmp.path().join("query");
    fs::create_dir_all(&case_dir).unwrap();
    fs::write(
        case_dir.join("query_chunk.json"),
        r#"{"antipattern_type": "AWD", "project_name": -1, "commit_number": -1, "id": -1, "group_id": -1,
            "chunks": [
                {"file_path": "c.java", "chunk_type": "clientClass", "ast_subtree": "class C {}"},
                {"file_path": "c.java", "chunk_type": "superType", "ast_subtree": "class S {}"}
            ]}"#,
    )
    .unwrap();

    let service = hashing_service(8, 8);
    let store_root = build_query_case(&case_dir, &service).expect("build query store");
    assert_eq!(store_root, case_dir.join("vectorstore"));

    let code = load_store(&store_root.join("CODE")).expect("query code store");
    assert_eq!(code.len(), 2);
    assert!(code.metadata.iter().all(|m| m.group_id == QUERY_GROUP_ID));
    assert!(
        !store_root.join("TEXT").exists(),
        "no TEXT content, no TEXT store"
    );
}
