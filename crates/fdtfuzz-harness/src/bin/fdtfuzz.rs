//! CLI entrypoint for replaying fdtfuzz inputs outside libFuzzer.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fdtfuzz_core::RunReport;
use fdtfuzz_harness::runner::collect_inputs;
use fdtfuzz_harness::{DEFAULT_MAX_LEN, LogEmitter, LogLevel, ReplayRunner};
use fdtfuzz_membrane::{SanitizerVerifier, VerifierKind, verifier_kind};

/// Replay and triage tooling for the FDT fuzz driver.
#[derive(Debug, Parser)]
#[command(name = "fdtfuzz")]
#[command(about = "Replay devicetree blobs through the fdtfuzz driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run files (or every file under directories) through the driver.
    Replay {
        /// Input files or corpus directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Read at most this many bytes of each file.
        #[arg(long, default_value_t = DEFAULT_MAX_LEN)]
        max_len: usize,
        /// Verifier backend: `plain`, `sanitizer` or `shadow`.
        /// Defaults to `FDTFUZZ_VERIFIER`.
        #[arg(long)]
        verifier: Option<String>,
        /// Write one JSONL record per input to this path.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Run structural validation only and report why an input is skipped.
    Check {
        path: PathBuf,
        /// Read at most this many bytes of the file.
        #[arg(long, default_value_t = DEFAULT_MAX_LEN)]
        max_len: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            paths,
            max_len,
            verifier,
            log,
        } => {
            let kind = verifier
                .as_deref()
                .map_or_else(verifier_kind, VerifierKind::from_str_loose);
            let runner = ReplayRunner::new(kind).with_max_len(max_len);
            let mut emitter = match &log {
                Some(path) => Some(LogEmitter::to_file(path, "fdtfuzz", &run_id())?),
                None => None,
            };

            eprintln!("Replaying with the {} verifier", kind.as_str());
            if kind == VerifierKind::Sanitizer && !SanitizerVerifier::instrumented() {
                eprintln!("  no sanitizer interface linked, falling back to byte reads");
            }
            let inputs = collect_inputs(&paths)?;
            if let Some(emitter) = emitter.as_mut() {
                emitter.emit(LogLevel::Info, "replay_started")?;
                emitter.flush()?;
            }

            // Each input is named before it runs; its record is flushed
            // before the next one starts.
            let mut walked = 0usize;
            for path in &inputs {
                eprintln!("RUN  {}", path.display());
                let record = runner.replay_file(path)?;
                match &record.report {
                    RunReport::Walked(stats) => {
                        walked += 1;
                        eprintln!(
                            "PASS {} (nodes={}, properties={}, phandles={})",
                            record.path.display(),
                            stats.nodes,
                            stats.properties,
                            stats.phandles
                        );
                    }
                    RunReport::Skipped(reason) => {
                        eprintln!("SKIP {}: {reason}", record.path.display());
                    }
                }
                if let Some(emitter) = emitter.as_mut() {
                    let trace_id = emitter.next_trace_id();
                    emitter.emit_entry(record.to_log_entry(trace_id, kind))?;
                    emitter.flush()?;
                }
            }
            eprintln!(
                "Replayed {} inputs: {walked} walked, {} skipped",
                inputs.len(),
                inputs.len() - walked
            );
        }
        Command::Check { path, max_len } => {
            let runner = ReplayRunner::new(VerifierKind::Plain).with_max_len(max_len);
            match runner.check_file(&path)? {
                Ok(()) => println!("ok"),
                Err(err) => {
                    println!("{err}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn run_id() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("replay-{}-{secs}", std::process::id())
}
