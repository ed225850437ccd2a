//! rust_arraysig command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use rust_arraysig::cli::{Cli, Commands};
use rust_arraysig::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["run", "normalize", "signature", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help" || a == "-h") {
            print_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("rust_arraysig {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Run { config, threads }) => run(&config, threads),
        Some(Commands::Normalize {
            raw,
            output,
            method,
            no_log,
        }) => run_normalize(&raw, &output, &method, !no_log),
        Some(Commands::Signature {
            matrix,
            metadata,
            study,
            group_column,
            top_k,
            output,
        }) => run_signature(&matrix, &metadata, &study, &group_column, top_k, &output),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_no_args() {
    println!("rust_arraysig v{}", VERSION);
    println!("Run `rust_arraysig -h` for usage.");
}

fn print_help() {
    println!("rust_arraysig v{}", VERSION);
    println!("Microarray preprocessing, batch correction and group signatures");
    println!();
    println!("Usage: rust_arraysig <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run        Run the full pipeline from a JSON configuration");
    println!("  normalize  Normalize one study's raw intensities");
    println!("  signature  Build a group signature from an expression table");
    println!();
    println!("Run `rust_arraysig <COMMAND> --help` for command-specific options.");
}

fn run(config_path: &str, threads: usize) -> Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }

    info!("Loading configuration from: {}", config_path);
    let config = PipelineConfig::from_file(config_path)?;
    let summary = run_pipeline(&config)?;

    info!(
        "Done: {} genes, {} labeled samples, {} signatures",
        summary.n_combined_genes,
        summary.n_labeled_samples,
        summary.signatures.len()
    );
    for sig in &summary.signatures {
        info!("  {}: {} genes -> {}", sig.study, sig.n_genes, sig.path.display());
    }
    Ok(())
}

fn run_normalize(raw_path: &str, output: &str, method: &str, log_transform: bool) -> Result<()> {
    let method: NormalizationMethod = method.parse()?;

    info!("Loading raw intensities from: {}", raw_path);
    let raw = read_raw(raw_path)?;
    info!("  {} probes, {} samples", raw.n_rows(), raw.n_cols());

    info!("Normalizing ({:?})", method);
    let normalized = normalize(&raw, method, log_transform)?;

    write_expression_matrix(output, &normalized)?;
    info!("Normalized values written to: {}", output);
    Ok(())
}

fn run_signature(
    matrix_path: &str,
    metadata_path: &str,
    study: &str,
    group_column: &str,
    top_k: usize,
    output: &str,
) -> Result<()> {
    let group_column: GroupColumn = group_column.parse()?;

    info!("Loading expression table from: {}", matrix_path);
    let matrix = read_expression_matrix(matrix_path)?;
    info!("Loading sample table from: {}", metadata_path);
    let samples = read_sample_table(metadata_path)?;

    let study_matrix = restrict_to_labeled(&slice_study(&matrix, &samples, study)?, &samples, group_column)?;
    let labels: Vec<String> = column_records(&study_matrix, &samples)?
        .iter()
        .filter_map(|r| r.group(group_column).map(str::to_string))
        .collect();

    let signature = build_signature(&study_matrix, &labels, &SignatureParams { top_k })?;
    for (de, selected) in signature.tables.iter().zip(signature.per_contrast.iter()) {
        info!(
            "  {}: {} selected, {} with adj.P.Val < 0.05",
            de.contrast,
            selected.len(),
            de.significant_genes(0.05).len()
        );
    }

    write_signature(output, &signature)?;
    info!("Signature ({} genes) written to: {}", signature.genes.len(), output);
    Ok(())
}
