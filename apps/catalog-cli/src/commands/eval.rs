use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use catalog_hybrid::eval::{
    check_thresholds, eval_thresholds, evaluate_golden_queries, load_golden_queries, metric_name, percent,
    EvalReport, COUNT_KEY, K_VALUES,
};

use super::check_output_format;
use crate::base_dir;
use crate::context::{build_search_service, load_config};

#[derive(Args)]
pub struct GoldenArgs {
    /// Path to golden queries JSON file
    #[arg(short = 'f', long, default_value = "tests/fixtures/golden_queries.json")]
    pub queries_file: PathBuf,

    /// Output format: json or table
    #[arg(short, long, default_value = "json")]
    pub output: String,

    /// Check results against thresholds and exit with error if any fail
    #[arg(short, long)]
    pub check: bool,
}

pub async fn run_golden(args: GoldenArgs) -> Result<i32> {
    if !check_output_format(&args.output) {
        return Ok(1);
    }
    if !args.queries_file.exists() {
        eprintln!("Error: File not found: {}", args.queries_file.display());
        return Ok(1);
    }
    let queries = match load_golden_queries(&args.queries_file) {
        Ok(queries) => queries,
        Err(e) => {
            eprintln!("Error: Invalid golden queries file: {e:#}");
            return Ok(1);
        }
    };
    println!("Loaded {} golden queries from {}", queries.len(), args.queries_file.display());

    let config = load_config()?;
    let service = build_search_service(&config, &base_dir()).await?;
    let report = evaluate_golden_queries(&service, &queries, &K_VALUES).await?;

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }

    if args.check {
        let failures = check_thresholds(&report, &eval_thresholds());
        if !failures.is_empty() {
            eprintln!("\nThreshold failures:");
            for failure in &failures {
                eprintln!("  {failure}");
            }
            return Ok(1);
        }
        println!("\nAll thresholds passed!");
    }
    Ok(0)
}

fn print_table(report: &EvalReport) {
    println!("\nEvaluation Results");
    println!("{}", "=".repeat(80));
    for (retriever, difficulties) in report {
        println!("\n{}", retriever.to_uppercase());
        println!("{}", "-".repeat(60));
        println!("{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}", "Difficulty", "Hit@1", "Hit@3", "Hit@5", "Hit@10", "Count");
        println!("{}", "-".repeat(60));
        for (difficulty, metrics) in difficulties {
            let metric = |k: usize| percent(metrics.get(&metric_name(k)).copied().unwrap_or(0.0));
            let count = metrics.get(COUNT_KEY).copied().unwrap_or(0.0);
            println!(
                "{:<12} {:>7} {:>7} {:>7} {:>7} {:>8}",
                difficulty,
                metric(1),
                metric(3),
                metric(5),
                metric(10),
                count as u64
            );
        }
    }
}
