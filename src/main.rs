//! serasure
//!
//! Simple Reed-Solomon coding example in GF(2^w).
//!
//! Sets up a classic Vandermonde-based generator matrix, encodes m
//! instances of k data shards with it, rotates the coding shards across
//! the instances, multiplies one of them by 2 and folds the result back.
//!
//! ```text
//! serasure k m w seed
//! ```

use std::io::{self, BufWriter, Write};

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use serasure::config::{CodecConfig, DriverConfig, MACHINE_WORD};
use serasure::ec::BatchDriver;
use serasure::error::Error;
use serasure::gf::FieldWidth;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Does a simple Reed-Solomon coding example in GF(2^w).
///
/// w must be 8, 16 or 32. k+m must be <= 2^w. It sets up a classic
/// Vandermonde-based generator matrix and encodes k devices of one machine
/// word each with it, for m instances.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Number of data shards
    #[arg(value_parser = parse_positive)]
    k: usize,

    /// Number of coding shards, also the number of instances
    #[arg(value_parser = parse_positive)]
    m: usize,

    /// Field width in bits (8, 16 or 32)
    #[arg(value_parser = parse_width)]
    w: FieldWidth,

    /// Seed for the synthetic data
    seed: u32,

    /// Bytes per stripe (multiple of w/8)
    #[arg(long, default_value_t = MACHINE_WORD)]
    stripe_size: usize,

    /// Leading bytes of rotated cell (0, 0) multiplied by 2
    #[arg(long, default_value_t = 4)]
    mutate_bytes: usize,

    /// Bytes copied per cell when folding the rotated grid back
    #[arg(long, default_value_t = MACHINE_WORD)]
    copy_span: usize,

    /// Erase this many random shards per instance and check the decode
    #[arg(long)]
    erasures: Option<usize>,

    /// Encode instances on separate threads
    #[arg(long)]
    parallel: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SERASURE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "SERASURE_LOG_JSON")]
    log_json: bool,
}

fn parse_positive(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_width(s: &str) -> std::result::Result<FieldWidth, String> {
    let bits: u32 = s.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
    FieldWidth::try_from(bits).map_err(|e| e.to_string())
}

impl Args {
    fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            codec: CodecConfig::new(self.k, self.m, self.w, self.stripe_size),
            seed: self.seed,
            mutate_bytes: self.mutate_bytes,
            copy_span: self.copy_span,
            erasures: self.erasures,
            parallel: self.parallel,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = args.driver_config();
    if let Err(e) = config.validate() {
        Args::command()
            .error(ErrorKind::ValueValidation, e.to_string())
            .exit();
    }

    info!(
        k = args.k,
        m = args.m,
        w = args.w.bits(),
        seed = args.seed,
        "Starting batch run"
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let outcome = BatchDriver::new(config)
        .run(&mut out)
        .context("batch run failed")?;
    out.flush().context("failed to write report")?;

    for failure in &outcome.failures {
        if failure.is_consistency_violation() {
            error!("Internal consistency failure: {}", failure);
        }
    }

    if !outcome.is_success() {
        let mismatches = outcome.copy_mismatches.len();
        let failures = outcome.failures.len();
        return Err(Error::Internal(format!(
            "{mismatches} copy-back mismatches, {failures} decode failures"
        )))
        .context("verification failed");
    }

    info!("Batch run complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}
