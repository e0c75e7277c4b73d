use anyhow::Result;
use clap::Args;
use serde::{Serialize, Serializer};
use tracing::error;

use catalog_core::types::{SearchCriteria, SearchMode, SearchResult};

use super::{bounded_count, check_output_format};
use crate::base_dir;
use crate::context::{build_search_service, load_config};

#[derive(Args)]
pub struct MethodsArgs {
    /// Search query to run across all methods
    pub query: String,

    /// Optional dataset filter
    #[arg(short, long)]
    pub dataset: Option<String>,

    /// Maximum number of results per method (1-100)
    #[arg(short, long, default_value_t = 10, value_parser = bounded_count)]
    pub limit: usize,

    /// Candidates passed to the LLM reranker for hybrid+rerank (1-100)
    #[arg(long, default_value_t = 20, value_parser = bounded_count)]
    pub rerank_candidates: usize,

    /// Output format: json or table
    #[arg(short, long, default_value = "table")]
    pub output: String,
}

#[derive(Serialize)]
struct MethodOutcome {
    mode: SearchMode,
    rerank: bool,
    timing_ms: Option<f64>,
    total_candidates: usize,
    results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct MethodsReport {
    query: String,
    dataset: Option<String>,
    limit: usize,
    rerank_candidates: usize,
    #[serde(serialize_with = "in_run_order")]
    methods: Vec<(&'static str, MethodOutcome)>,
}

fn in_run_order<S: Serializer>(methods: &[(&'static str, MethodOutcome)], s: S) -> Result<S::Ok, S::Error> {
    s.collect_map(methods.iter().map(|(name, outcome)| (name, outcome)))
}

fn plan(args: &MethodsArgs) -> Vec<(&'static str, SearchCriteria)> {
    let base = SearchCriteria::new(args.query.clone())
        .with_dataset(args.dataset.clone())
        .with_limit(args.limit);
    vec![
        ("fts", base.clone().with_mode(SearchMode::Fts)),
        ("vector", base.clone().with_mode(SearchMode::Vector)),
        ("hybrid", base.clone().with_mode(SearchMode::Hybrid)),
        ("hybrid_rerank", base.with_mode(SearchMode::Hybrid).with_rerank(args.rerank_candidates)),
    ]
}

pub async fn run_methods(args: MethodsArgs) -> Result<i32> {
    if !check_output_format(&args.output) {
        return Ok(1);
    }
    let config = load_config()?;
    let service = build_search_service(&config, &base_dir()).await?;

    let mut methods = Vec::new();
    for (name, criteria) in plan(&args) {
        let outcome = match service.search(&criteria).await {
            Ok(found) => MethodOutcome {
                mode: criteria.mode,
                rerank: criteria.rerank,
                timing_ms: Some(found.timing_ms),
                total_candidates: found.total_candidates,
                results: found.results,
                error: None,
            },
            Err(e) => {
                error!(method = name, query = %args.query, error = %e, "search method failed");
                MethodOutcome {
                    mode: criteria.mode,
                    rerank: criteria.rerank,
                    timing_ms: None,
                    total_candidates: 0,
                    results: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        methods.push((name, outcome));
    }

    let report = MethodsReport {
        query: args.query,
        dataset: args.dataset,
        limit: args.limit,
        rerank_candidates: args.rerank_candidates,
        methods,
    };
    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }
    Ok(0)
}

fn print_table(report: &MethodsReport) {
    println!("\nSearch Method Comparison");
    println!("{}", "=".repeat(90));
    println!("Query: {}", report.query);
    if let Some(dataset) = &report.dataset {
        println!("Dataset: {dataset}");
    }
    println!();

    println!("{:<16} {:<8} {:<8} {:>7} {:>12} {:>4}", "Method", "Mode", "Rerank", "Count", "Timing(ms)", "Status");
    println!("{}", "-".repeat(90));
    for (name, outcome) in &report.methods {
        let timing = outcome.timing_ms.map_or_else(|| "n/a".to_string(), |t| format!("{t:.1}"));
        let status = if outcome.error.is_some() { "ERR" } else { "OK" };
        println!(
            "{:<16} {:<8} {:<8} {:>7} {:>12} {:>4}",
            name,
            outcome.mode.as_str(),
            outcome.rerank,
            outcome.results.len(),
            timing,
            status
        );
    }

    println!("\nTop results by method");
    println!("{}", "-".repeat(90));
    for (name, outcome) in &report.methods {
        println!("\n{}", name.to_uppercase());
        if let Some(err) = &outcome.error {
            println!("  Error: {err}");
            continue;
        }
        for (idx, item) in outcome.results.iter().take(3).enumerate() {
            println!("  {:>2}. [{:.3}] {}:{}", idx + 1, item.score, item.dataset_name, item.path);
            if let Some(snippet) = &item.snippet {
                println!("      {}", snippet.header);
                for line in snippet.text.split('\n').take(2) {
                    println!("      | {line}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> MethodsArgs {
        MethodsArgs {
            query: "rrf".into(),
            dataset: Some("notes".into()),
            limit: 5,
            rerank_candidates: 30,
            output: "json".into(),
        }
    }

    #[test]
    fn plan_runs_four_methods_in_order() {
        let plan = plan(&args());
        let names: Vec<_> = plan.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["fts", "vector", "hybrid", "hybrid_rerank"]);
        assert!(plan.iter().all(|(_, c)| c.limit == 5 && c.dataset_name.as_deref() == Some("notes")));
        let (_, rerank) = &plan[3];
        assert!(rerank.rerank);
        assert_eq!(rerank.retrieval_limit(), 30);
        assert!(!plan[2].1.rerank);
    }

    #[test]
    fn report_keeps_method_order_in_json() {
        let outcome = |mode| MethodOutcome {
            mode,
            rerank: false,
            timing_ms: Some(1.0),
            total_candidates: 0,
            results: Vec::new(),
            error: None,
        };
        let report = MethodsReport {
            query: "q".into(),
            dataset: None,
            limit: 10,
            rerank_candidates: 20,
            methods: vec![("vector", outcome(SearchMode::Vector)), ("fts", outcome(SearchMode::Fts))],
        };
        let json = serde_json::to_string(&report).unwrap();
        let vector_at = json.find("\"vector\":").unwrap();
        let fts_at = json.find("\"fts\":").unwrap();
        assert!(vector_at < fts_at);
        assert!(!json.contains("\"error\""));
    }
}
