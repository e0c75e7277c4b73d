use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CHUNKS: &str = r##"{"node_id":"n1","source_doc_id":"notes:rust/ownership.md","text":"# Ownership\nRust ownership rules and borrowing.","chunk_seq":0,"chunk_pos":0}
{"node_id":"n2","source_doc_id":"notes:rust/async.md","text":"# Async\nRust async with the Tokio runtime.","chunk_seq":0,"chunk_pos":0}
{"node_id":"n3","source_doc_id":"notes:garden.md","text":"# Garden\nTomatoes need sun and water.","chunk_seq":0,"chunk_pos":0}
"##;

#[allow(deprecated)]
fn catalog(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("catalog").expect("binary");
    cmd.current_dir(workdir)
        .env("RUST_ENV", "test")
        .env("APP_USE_FAKE_EMBEDDINGS", "1")
        .env("APP_EMBEDDING__DIM", "64")
        .env("APP_LLM__MLX_BASE_URL", "http://127.0.0.1:9/v1")
        .env("APP_LLM__OPENAI_API_KEY_ENV", "CATALOG_TEST_UNSET_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn indexed_workspace() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("chunks.jsonl"), CHUNKS).unwrap();
    catalog(dir.path())
        .args(["index", "chunks.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 3 chunks"));
    dir
}

#[test]
fn invalid_output_format_is_rejected() {
    let dir = tempdir().unwrap();
    catalog(dir.path())
        .args(["search", "methods", "anything", "--output", "xml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: Invalid output format: xml"));
}

#[test]
fn limit_outside_range_is_a_usage_error() {
    let dir = tempdir().unwrap();
    catalog(dir.path())
        .args(["search", "methods", "anything", "--limit", "0"])
        .assert()
        .failure();
}

#[test]
fn missing_golden_file_is_reported() {
    let dir = tempdir().unwrap();
    catalog(dir.path())
        .args(["eval", "golden", "-f", "missing.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: File not found: missing.json"));
}

#[test]
fn search_methods_reports_all_four_methods_as_json() {
    let dir = indexed_workspace();
    let output = catalog(dir.path())
        .args(["search", "methods", "ownership", "-o", "json", "-l", "2"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(body["query"], "ownership");
    assert_eq!(body["limit"], 2);
    assert_eq!(body["rerank_candidates"], 20);
    for method in ["fts", "vector", "hybrid", "hybrid_rerank"] {
        let payload = &body["methods"][method];
        assert!(payload.get("error").is_none(), "{method} failed: {payload}");
        assert!(payload["results"].as_array().unwrap().len() <= 2);
    }
    assert_eq!(body["methods"]["fts"]["results"][0]["path"], "rust/ownership.md");
    assert_eq!(body["methods"]["hybrid"]["results"][0]["dataset_name"], "notes");
    assert_eq!(body["methods"]["hybrid_rerank"]["rerank"], true);
}

#[test]
fn search_methods_table_lists_methods() {
    let dir = indexed_workspace();
    catalog(dir.path())
        .args(["search", "methods", "tomatoes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Search Method Comparison"))
        .stdout(predicate::str::contains("hybrid_rerank"))
        .stdout(predicate::str::contains("notes:garden.md"));
}

#[test]
fn golden_eval_checks_thresholds() {
    let dir = indexed_workspace();
    fs::write(
        dir.path().join("golden.json"),
        r#"{"queries": [{"query": "ownership", "expected_docs": ["rust/ownership.md"], "difficulty": "easy", "retriever_types": ["bm25"]}]}"#,
    )
    .unwrap();
    catalog(dir.path())
        .args(["eval", "golden", "-f", "golden.json", "-o", "table", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 1 golden queries from golden.json"))
        .stdout(predicate::str::contains("BM25"))
        .stdout(predicate::str::contains("All thresholds passed!"));
}

#[test]
fn golden_eval_fails_below_threshold() {
    let dir = indexed_workspace();
    fs::write(
        dir.path().join("golden.json"),
        r#"[{"query": "ownership", "expected_docs": ["nowhere.md"], "difficulty": "hard", "retriever_types": ["bm25"]}]"#,
    )
    .unwrap();
    catalog(dir.path())
        .args(["eval", "golden", "-f", "golden.json", "-c"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("bm25/hard/hit_at_1: 0.0% < 30.0%"));
}
