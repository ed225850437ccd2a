//! Command-line interface for rust_arraysig

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_arraysig")]
#[command(version)]
#[command(about = "Microarray preprocessing, batch correction and group signatures")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline from a JSON configuration
    #[command(
        long_about = "Run the full pipeline from a JSON configuration\n\n\
            Normalizes every study (with caching), collapses probes to genes,\n\
            joins the studies on gene symbol, renames samples from the sample\n\
            table, runs ComBat over labeled samples with study as batch, writes\n\
            per-study and per-group slices, and builds one-vs-rest signatures\n\
            for the reference studies.",
        after_long_help = "\
Examples:
  rust_arraysig run --config pipeline.json
  rust_arraysig run --config pipeline.json -t 4 --verbose

Minimal configuration:
  {
    \"studies\": [
      {\"name\": \"GSE1\", \"raw\": \"raw/GSE1\", \"annotation\": \"GPL570.tsv\"},
      {\"name\": \"GSE2\", \"raw\": \"raw/GSE2.tsv\", \"annotation\": \"GPL96.tsv\"}
    ],
    \"metadata\": \"samples.tsv\",
    \"reference\": [{\"study\": \"GSE1\", \"top_k\": 50}]
  }"
    )]
    Run {
        /// Path to the pipeline configuration (JSON)
        #[arg(short, long,
            long_help = "Path to the pipeline configuration (JSON).\n\
                Relative paths inside the file are resolved against its directory.")]
        config: String,

        /// Number of threads (0 = auto) [default: 0]
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,
    },

    /// Normalize one study's raw intensities
    #[command(
        long_about = "Normalize one study's raw intensities.\n\n\
            Input is either a directory of two-column per-sample files or a\n\
            probe x sample matrix. Output is a probe x sample TSV.",
        after_long_help = "\
Examples:
  rust_arraysig normalize -r raw/GSE1 -o GSE1_normalized.tsv
  rust_arraysig normalize -r raw/GSE2.tsv -o GSE2_normalized.tsv -m quantile"
    )]
    Normalize {
        /// Directory of per-sample files or a matrix file
        #[arg(short, long)]
        raw: String,

        /// Output file path
        #[arg(short, long)]
        output: String,

        /// Normalization method [default: standardize]
        #[arg(short, long, default_value = "standardize",
            long_help = "Normalization method.\n\
                standardize: log2, then each sample to mean 0 and unit variance\n\
                quantile:    log2, then quantile normalization across samples\n\
                log2:        log2 only")]
        method: String,

        /// Input is already on log2 scale
        #[arg(long)]
        no_log: bool,
    },

    /// Build a group signature from an expression table
    #[command(
        long_about = "Build a group signature from an expression table.\n\n\
            Fits a one-vs-rest moderated linear model for every group of one\n\
            study, takes the top genes of each contrast by |logFC x log10(p)|\n\
            and writes their mean expression per group.",
        after_long_help = "\
Examples:
  rust_arraysig signature -x batch_corrected.tsv -m samples.tsv -s GSE1 -o GSE1_signature.txt
  rust_arraysig signature -x batch_corrected.tsv -m samples.tsv -s GSE1 -g group2 -k 100 -o sig.txt"
    )]
    Signature {
        /// Gene x sample expression table (columns are display names)
        #[arg(short = 'x', long)]
        matrix: String,

        /// Six-column sample table
        #[arg(short, long)]
        metadata: String,

        /// Study whose samples are used
        #[arg(short, long)]
        study: String,

        /// Group label column: group1 or group2 [default: group1]
        #[arg(short, long, default_value = "group1")]
        group_column: String,

        /// Genes taken per contrast [default: 50]
        #[arg(short = 'k', long, default_value = "50")]
        top_k: usize,

        /// Output file path
        #[arg(short, long)]
        output: String,
    },
}
