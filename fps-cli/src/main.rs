//! FPS DAQ decoder CLI application.
//!
//! Decodes FPS raw event banks and pedestal tables to CSV or binary files.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fps_core::{output, AdcData, Bank, BankData, DirSource, FpsConfig, FpsDecoder};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Decoder for FPS detector DAQ banks.
///
/// INPUT may be a single bank file or an event directory laid out as
/// `<sfs-name>/secNN/rbNN/raw` and `<sfs-name>/secNN/pedrms`.
#[derive(Parser, Debug)]
#[command(name = "fps")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    location: Location,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct Location {
    /// Detector directory name inside an event directory
    #[arg(long, global = true, default_value = "fps")]
    sfs_name: String,

    /// Sector number
    #[arg(long, global = true, default_value_t = 1)]
    sector: u8,

    /// Readout board number
    #[arg(long, global = true, default_value_t = 1)]
    rdo: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode QT hits from a raw event
    Adc {
        /// Raw event file or event directory
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file path (.csv, .bin)
        ///
        /// The output format is determined by the file extension:
        /// - .csv: Comma-separated values (human-readable)
        /// - .bin: Binary format (efficient, for programmatic access)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Decode a pedestal/RMS table to CSV
    Pedrms {
        /// Pedestal file or event directory
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output CSV path
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Print the trigger token of a raw event
    Trigger {
        /// Raw event file or event directory
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = FpsConfig {
        sfs_name: cli.location.sfs_name.clone(),
        sector: cli.location.sector,
        rdo: cli.location.rdo,
    };
    let mut decoder = FpsDecoder::with_config(config);

    let progress = if cli.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );
        pb.set_message("Decoding...");
        pb
    };

    match &cli.command {
        Command::Adc { input, output } => {
            run_adc(&mut decoder, &progress, input, output, cli.quiet)
        }
        Command::Pedrms { input, output } => {
            run_pedrms(&mut decoder, &progress, input, output, cli.quiet)
        }
        Command::Trigger { input } => run_trigger(&mut decoder, &progress, input),
    }
}

/// Fetches a bank from a directory tree or decodes a single bank file.
fn load<'d>(decoder: &'d mut FpsDecoder, input: &Path, bank: Bank) -> Result<BankData<'d>> {
    let data = if input.is_dir() {
        let source = DirSource::new(input);
        decoder
            .get(&source, bank.as_str())
            .with_context(|| format!("Failed to decode {} bank in {:?}", bank, input))?
    } else {
        decoder
            .decode_file(bank, input)
            .with_context(|| format!("Failed to decode {:?} as {} bank", input, bank))?
    };

    data.with_context(|| format!("No {} bank present in {:?}", bank, input))
}

fn run_adc(
    decoder: &mut FpsDecoder,
    progress: &ProgressBar,
    input: &Path,
    output_path: &Path,
    quiet: bool,
) -> Result<()> {
    let start_time = Instant::now();
    progress.set_message(format!(
        "Decoding {:?}...",
        input.file_name().unwrap_or_default()
    ));

    let adc: &AdcData = match load(decoder, input, Bank::Adc)? {
        BankData::Adc(adc) => adc,
        _ => anyhow::bail!("Decoder returned an unexpected bank"),
    };

    progress.set_message(format!(
        "Writing to {:?}...",
        output_path.file_name().unwrap_or_default()
    ));
    output::write_hits(output_path, adc).context("Failed to write hit output")?;

    let total_duration = start_time.elapsed();
    progress.finish_with_message(format!(
        "Done! Decoded {} hits in {:.2}s",
        adc.hits.len(),
        total_duration.as_secs_f64()
    ));

    if !quiet {
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Input:        {:?}", input);
        eprintln!("  Output:       {:?}", output_path);
        eprintln!("  Event:        {}", adc.header.event_number);
        eprintln!("  Token:        {}", adc.header.token);
        eprintln!("  Time buckets: {}", adc.header.pre_post_count);
        eprintln!("  QTs:          {}", adc.header.qt_count);
        eprintln!("  Header skip:  {} words", adc.header_words);
        eprintln!("  Hits:         {}", adc.hits.len());
        eprintln!("  Duration:     {:.3}s", total_duration.as_secs_f64());
    }

    Ok(())
}

fn run_pedrms(
    decoder: &mut FpsDecoder,
    progress: &ProgressBar,
    input: &Path,
    output_path: &Path,
    quiet: bool,
) -> Result<()> {
    let table = match load(decoder, input, Bank::PedRms)? {
        BankData::PedRms(table) => table,
        _ => anyhow::bail!("Decoder returned an unexpected bank"),
    };

    output::write_pedestals_csv(output_path, table).context("Failed to write pedestal CSV")?;

    progress.finish_with_message(format!(
        "Done! Decoded {} pedestal records",
        table.records.len()
    ));

    if !quiet {
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Input:        {:?}", input);
        eprintln!("  Output:       {:?}", output_path);
        eprintln!("  QT records:   {}", table.records.len());
        eprintln!("  Bad versions: {}", table.warnings.len());
        for warning in &table.warnings {
            eprintln!(
                "    record {}: version {} (expected {})",
                warning.index, warning.found, warning.expected
            );
        }
    }

    Ok(())
}

fn run_trigger(decoder: &mut FpsDecoder, progress: &ProgressBar, input: &Path) -> Result<()> {
    let raw = match load(decoder, input, Bank::Raw)? {
        BankData::Raw(raw) => raw.to_vec(),
        _ => anyhow::bail!("Decoder returned an unexpected bank"),
    };
    progress.finish_and_clear();

    let words = decoder
        .extract_trigger(&raw, 1, 0)
        .context("Trigger extraction failed")?;

    for token in &words.tokens {
        println!(
            "trg={} daq={} rhic={} rhic_delta={} token={}",
            token.trigger_kind,
            token.daq_kind,
            token.rhic_clock,
            token.rhic_delta,
            token.token_value
        );
    }

    Ok(())
}
