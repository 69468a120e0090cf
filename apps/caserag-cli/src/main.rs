mod cli;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use caserag_core::config::Config;
use caserag_core::types::Family;
use caserag_embed::{hashing_service, EmbeddingService};
use caserag_match::aggregate::{self, RankedCase};
use caserag_match::matcher;
use caserag_match::materialize::materialize;
use caserag_store::builder;
use caserag_store::merge;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;

    match cli.command {
        Commands::Embed {
            family,
            cases_dir,
            out_dir,
        } => cmd_embed(&config, &family, cases_dir, out_dir),
        Commands::Merge {
            stores_dir,
            out_dir,
        } => cmd_merge(&config, stores_dir, out_dir),
        Commands::Match {
            family,
            merged_dir,
            out_dir,
        } => cmd_match(&config, &family, merged_dir, out_dir),
        Commands::Rank {
            scores_dir,
            weights,
            top_k,
            include_files,
            cases_dir,
            out_dir,
        } => cmd_rank(
            &config,
            &scores_dir,
            weights,
            top_k,
            include_files,
            cases_dir,
            out_dir,
        ),
        Commands::Query {
            case_dir,
            family,
            merged_dir,
            weights,
            top_k,
            include_files,
            cases_dir,
            out_dir,
        } => cmd_query(
            &config,
            &case_dir,
            &family,
            merged_dir,
            weights,
            top_k,
            include_files,
            cases_dir,
            out_dir,
        ),
    }
}

/// Flag value if given, else the config key, else the baked-in default.
fn path_from(config: &Config, key: &str, default: &str, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| {
        config
            .get_path(key)
            .unwrap_or_else(|_| PathBuf::from(default))
    })
}

fn embedding_service(config: &Config) -> EmbeddingService {
    let code_dim: usize = config.get("embedding.code_dim").unwrap_or_else(|_| 256);
    let text_dim: usize = config.get("embedding.text_dim").unwrap_or_else(|_| 384);
    hashing_service(code_dim, text_dim)
}

fn top_k_from(config: &Config, flag: Option<usize>) -> usize {
    flag.unwrap_or_else(|| config.get("matching.top_k").unwrap_or_else(|_| 10))
}

fn print_ranking(ranked: &[RankedCase]) {
    println!("\nTop {} cases:", ranked.len());
    for (rank, case) in ranked.iter().enumerate() {
        println!(
            "{:>3}. group {:<5} score {:.4}  {}",
            rank + 1,
            case.group_id,
            case.score,
            case.folder_path
        );
    }
}

fn cmd_embed(
    config: &Config,
    family: &str,
    cases_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let family = Family::from_str(family)?;
    let cases_dir = path_from(config, "data.cases_dir", "../dev_data/cases", cases_dir);
    let out_dir = path_from(
        config,
        "data.vectorstore_dir",
        "../dev_data/vectorstore",
        out_dir,
    );
    println!("Embedding {} cases from {}", family, cases_dir.display());

    let service = embedding_service(config);
    let summary = builder::build_corpus(&cases_dir, family, &service, &out_dir)?;
    println!(
        "✅ Built stores for {} cases ({} chunks), {} failed",
        summary.cases_built, summary.chunks_embedded, summary.cases_failed
    );
    Ok(())
}

fn cmd_merge(
    config: &Config,
    stores_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let stores_dir = path_from(
        config,
        "data.vectorstore_dir",
        "../dev_data/vectorstore",
        stores_dir,
    );
    let out_dir = path_from(config, "data.merged_dir", "../dev_data/merged", out_dir);
    println!("Merging stores from {}", stores_dir.display());

    let summary = merge::merge(&stores_dir, &out_dir)?;
    println!(
        "✅ Pooled {} records from {} stores ({} stores skipped, {} records dropped)",
        summary.records_pooled, summary.stores_merged, summary.stores_skipped, summary.records_dropped
    );
    Ok(())
}

fn cmd_match(
    config: &Config,
    family: &str,
    merged_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let family = Family::from_str(family)?;
    let merged_dir = path_from(config, "data.merged_dir", "../dev_data/merged", merged_dir);
    let out_dir = path_from(config, "data.match_dir", "../dev_data/matches", out_dir);
    println!("Matching {} cases from {}", family, merged_dir.display());

    let summary = matcher::match_all(&merged_dir, family, &out_dir)?;
    println!(
        "✅ Matched {} cases: {} pair results written, {} failed",
        summary.cases, summary.pairs_written, summary.pairs_failed
    );
    Ok(())
}

fn cmd_rank(
    config: &Config,
    scores_dir: &Path,
    weights: Option<PathBuf>,
    top_k: Option<usize>,
    include_files: bool,
    cases_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let weight_file = path_from(config, "data.weights_file", "../dev_data/weights.json", weights);
    let top_k = top_k_from(config, top_k);
    let cases_dir = path_from(config, "data.cases_dir", "../dev_data/cases", cases_dir);
    let out_dir = path_from(config, "data.results_dir", "../dev_data/results", out_dir);

    let ranked = aggregate::aggregate_topk_from_dir(scores_dir, &weight_file, top_k)?;
    print_ranking(&ranked);

    let written = materialize(&ranked, &cases_dir, &out_dir, include_files)?;
    println!("✅ Results saved to {}", written.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_query(
    config: &Config,
    case_dir: &Path,
    family: &str,
    merged_dir: Option<PathBuf>,
    weights: Option<PathBuf>,
    top_k: Option<usize>,
    include_files: bool,
    cases_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let family = Family::from_str(family)?;
    let merged_dir = path_from(config, "data.merged_dir", "../dev_data/merged", merged_dir);
    let weight_file = path_from(config, "data.weights_file", "../dev_data/weights.json", weights);
    let top_k = top_k_from(config, top_k);
    let cases_dir = path_from(config, "data.cases_dir", "../dev_data/cases", cases_dir);
    let out_dir = out_dir.unwrap_or_else(|| case_dir.to_path_buf());

    println!("Embedding query case {}", case_dir.display());
    let service = embedding_service(config);
    let store_root = builder::build_query_case(case_dir, &service)?;

    let summary = matcher::match_query(&store_root, &merged_dir, family, &out_dir)?;
    println!("📊 Scored {} candidate cases", summary.pairs_written);

    let scores_dir = out_dir.join(matcher::MATCH_SCORES_DIR);
    let ranked = aggregate::aggregate_topk_from_dir(&scores_dir, &weight_file, top_k)?;
    print_ranking(&ranked);

    let written = materialize(&ranked, &cases_dir, &out_dir, include_files)?;
    println!("✅ Results saved to {}", written.display());
    Ok(())
}
