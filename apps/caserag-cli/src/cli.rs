use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "caserag",
    about = "Case similarity matching over chunked antipattern corpora",
    version
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(global = true, long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Embed one family's chunk documents into per-case vector stores
    Embed {
        /// Antipattern family to build
        #[arg(value_parser = ["CH", "MH", "AWD"])]
        family: String,

        /// Root of the chunked case documents
        #[arg(long)]
        cases_dir: Option<PathBuf>,

        /// Destination root for the per-case stores
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Pool per-case stores into one store per category and chunk type
    Merge {
        /// Root of the per-case stores
        #[arg(long)]
        stores_dir: Option<PathBuf>,

        /// Destination root for the merged store
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Match every case of a family against every other case
    Match {
        /// Antipattern family to match
        #[arg(value_parser = ["CH", "MH", "AWD"])]
        family: String,

        /// Root of the merged store
        #[arg(long)]
        merged_dir: Option<PathBuf>,

        /// Destination root for per-pair score files
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Rank one query's match scores and materialize the top-k
    Rank {
        /// Directory of per-candidate score files (a match_scores folder)
        scores_dir: PathBuf,

        /// Chunk-type weight file (flat JSON object)
        #[arg(long)]
        weights: Option<PathBuf>,

        /// Number of results to keep
        #[arg(long)]
        top_k: Option<usize>,

        /// Inline each kept case's files into the output document
        #[arg(long)]
        include_files: bool,

        /// Root the case folder paths resolve against
        #[arg(long)]
        cases_dir: Option<PathBuf>,

        /// Output directory for aggregated_results.json
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Embed an ad-hoc case, match it against the corpus and rank
    Query {
        /// Directory holding the query case's chunk document
        case_dir: PathBuf,

        /// Antipattern family to match against
        #[arg(value_parser = ["CH", "MH", "AWD"])]
        family: String,

        /// Root of the merged store
        #[arg(long)]
        merged_dir: Option<PathBuf>,

        /// Chunk-type weight file (flat JSON object)
        #[arg(long)]
        weights: Option<PathBuf>,

        /// Number of results to keep
        #[arg(long)]
        top_k: Option<usize>,

        /// Inline each kept case's files into the output document
        #[arg(long)]
        include_files: bool,

        /// Root the case folder paths resolve against
        #[arg(long)]
        cases_dir: Option<PathBuf>,

        /// Output directory (defaults to the case directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}
