use catalog_core::config::{Config, SearchSettings};
use catalog_core::{Bm25Weights, QueryIntent};
use figment::providers::{Format, Toml};
use figment::Figment;
use pretty_assertions::assert_eq;

#[test]
fn defaults_apply_without_any_files() {
    let cfg = Config::from_figment(Figment::new()).unwrap();
    let search = cfg.search().unwrap();
    assert_eq!(search, SearchSettings::default());
    assert_eq!(search.rrf_k, 60.0);
    assert_eq!(search.fusion_top_k, 30);
    assert_eq!(search.rerank_timeout_ms, 20_000);
    assert_eq!(cfg.llm().unwrap().choice_batch_size, 5);
    assert_eq!(cfg.embedding().unwrap().identity().profile(), "candle:BAAI/bge-m3");
}

#[test]
fn toml_overrides_single_keys() {
    let toml = r#"
        [search]
        rrf_k = 40
        fusion_dedupe = true

        [data.datasets.notes]
        root = "/srv/notes"
    "#;
    let cfg = Config::from_figment(Figment::new().merge(Toml::string(toml))).unwrap();
    let search = cfg.search().unwrap();
    assert_eq!(search.rrf_k, 40.0);
    assert!(search.fusion_dedupe);
    assert_eq!(search.rrf_original_weight, 2.0);

    let roots = cfg.data().unwrap().dataset_roots(std::path::Path::new("/base"));
    assert_eq!(roots.get("notes").map(|p| p.display().to_string()), Some("/srv/notes".to_string()));
}

#[test]
fn invalid_provider_is_rejected() {
    let toml = "[search]\nrerank_provider = \"cohere\"\n";
    assert!(Config::from_figment(Figment::new().merge(Toml::string(toml))).is_err());
}

#[test]
fn heading_weight_follows_intent() {
    let s = SearchSettings::default();
    assert_eq!(s.bm25_weights(QueryIntent::Navigational), Bm25Weights::with_heading(0.8));
    assert_eq!(s.bm25_weights(QueryIntent::Informational), Bm25Weights::default());
}

#[test]
fn relative_data_paths_resolve_against_base() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = Config::from_figment(Figment::new()).unwrap();
    let data = cfg.data().unwrap();
    assert_eq!(data.tantivy_index_path(tmp.path()), tmp.path().join(".catalog/tantivy"));
}
