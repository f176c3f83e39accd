use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use claimcast::aggregate::NUM_BUCKETS;
use claimcast::claims::LedgerSummary;
use claimcast::config::{self, ForecastConfig};
use claimcast::forecast;
use claimcast::types::cents_to_units;
use claimcast::{
    Callbacks, ClaimLedger, EventLoop, ForecastError, PaymentStatus, ProbabilityMap, RunHandle,
    RunOutcome,
    SimulationResult, WorkerRun,
};

struct Args {
    claims_path: Option<String>,
    probabilities_path: Option<String>,
    config_path: Option<String>,
    iterations: Option<usize>,
    chunk_size: Option<usize>,
    seed: Option<u64>,
    sweep: Option<Vec<f64>>,
    worker: bool,
    json: bool,
    quiet: bool,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        claims_path: None,
        probabilities_path: None,
        config_path: None,
        iterations: None,
        chunk_size: None,
        seed: None,
        sweep: None,
        worker: false,
        json: false,
        quiet: false,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--claims" => parsed.claims_path = Some(next_value(&args, &mut i, flag)?.to_string()),
            "--probabilities" => {
                parsed.probabilities_path = Some(next_value(&args, &mut i, flag)?.to_string())
            }
            "--config" => parsed.config_path = Some(next_value(&args, &mut i, flag)?.to_string()),
            "--iterations" => {
                parsed.iterations = Some(
                    next_value(&args, &mut i, flag)?
                        .parse()
                        .context("--iterations requires a non-negative integer")?,
                )
            }
            "--chunk" => {
                parsed.chunk_size = Some(
                    next_value(&args, &mut i, flag)?
                        .parse()
                        .context("--chunk requires a positive integer")?,
                )
            }
            "--seed" => {
                parsed.seed =
                    Some(next_value(&args, &mut i, flag)?.parse().context("--seed requires a u64")?)
            }
            "--sweep" => {
                let list = next_value(&args, &mut i, flag)?
                    .split(',')
                    .map(|p| p.trim().parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .context("--sweep requires comma-separated probabilities")?;
                parsed.sweep = Some(list);
            }
            "--worker" => parsed.worker = true,
            "--json" => parsed.json = true,
            "--quiet" => parsed.quiet = true,
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }
    Ok(parsed)
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    args.get(*i).map(String::as_str).with_context(|| format!("{flag} requires a value"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = parse_args()?;

    let mut config = match &args.config_path {
        Some(path) => ForecastConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {path}"))?,
        None => ForecastConfig::default(),
    };
    if let Some(n) = args.iterations {
        config.total_iterations = n;
    }
    if let Some(n) = args.chunk_size {
        config.chunk_size = n;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let ledger = match &args.claims_path {
        Some(path) => {
            let text =
                fs::read_to_string(path).with_context(|| format!("failed to read claims {path}"))?;
            ClaimLedger::from_json_str(&text)
                .with_context(|| format!("failed to parse claims {path}"))?
        }
        None => config::sample_ledger(),
    };

    let probabilities = match &args.probabilities_path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read probabilities {path}"))?;
            serde_json::from_str::<ProbabilityMap>(&text)
                .with_context(|| format!("failed to parse probabilities {path}"))?
        }
        None => ProbabilityMap::default(),
    };

    if let Some(levels) = &args.sweep {
        return run_sweep(&ledger, levels, &config, &args);
    }

    if !args.quiet && !args.json {
        print_summary(&ledger.summary()?);
        print_probabilities(&probabilities);
    }

    let ledger = Arc::new(ledger);
    let outcome = if args.worker {
        run_on_worker(ledger, probabilities, &config, args.quiet)?
    } else {
        run_on_event_loop(ledger, probabilities, &config, args.quiet)?
    };

    match outcome {
        RunOutcome::Completed(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result, config.total_iterations);
            }
            Ok(())
        }
        RunOutcome::Failed(error) => Err(error).context("forecast failed"),
        RunOutcome::Cancelled => bail!("forecast was cancelled"),
    }
}

/// Drive the run on this thread, redrawing a progress line between slices.
fn run_on_event_loop(
    ledger: Arc<ClaimLedger>,
    probabilities: ProbabilityMap,
    config: &ForecastConfig,
    quiet: bool,
) -> Result<RunOutcome> {
    let outcome: Rc<RefCell<Option<RunOutcome>>> = Rc::new(RefCell::new(None));
    let observer = {
        let (done, failed) = (outcome.clone(), outcome.clone());
        Callbacks {
            on_progress: move |fraction: f64| {
                if !quiet {
                    draw_progress(fraction);
                }
            },
            on_complete: move |result: SimulationResult| {
                *done.borrow_mut() = Some(RunOutcome::Completed(result));
            },
            on_failed: move |error: ForecastError| {
                *failed.borrow_mut() = Some(RunOutcome::Failed(error));
            },
        }
    };

    let mut event_loop = EventLoop::new();
    let handle = event_loop.start(ledger, probabilities, config, observer)?;
    let turns = event_loop.run_until_idle();
    if !quiet {
        eprintln!();
    }
    tracing::debug!(run = %handle.id(), turns, "event loop idle");

    let outcome = outcome.borrow_mut().take();
    Ok(outcome.unwrap_or_else(|| silent_outcome(&handle)))
}

/// A run that reported no terminal signal was cancelled, or its runner went
/// away without a word.
fn silent_outcome(handle: &RunHandle) -> RunOutcome {
    if handle.is_cancelled() {
        RunOutcome::Cancelled
    } else {
        RunOutcome::Failed(ForecastError::WorkerDisconnected)
    }
}

/// Offload the run and poll for messages like a UI thread would.
fn run_on_worker(
    ledger: Arc<ClaimLedger>,
    probabilities: ProbabilityMap,
    config: &ForecastConfig,
    quiet: bool,
) -> Result<RunOutcome> {
    let mut run = WorkerRun::spawn(ledger, probabilities, config)?;
    let outcome = RefCell::new(None);
    let mut observer = Callbacks {
        on_progress: |fraction: f64| {
            if !quiet {
                draw_progress(fraction);
            }
        },
        on_complete: |result: SimulationResult| {
            *outcome.borrow_mut() = Some(RunOutcome::Completed(result));
        },
        on_failed: |error: ForecastError| {
            *outcome.borrow_mut() = Some(RunOutcome::Failed(error));
        },
    };
    while !run.dispatch(&mut observer) {
        thread::sleep(Duration::from_millis(5));
    }
    drop(observer);
    if !quiet {
        eprintln!();
    }
    Ok(outcome.into_inner().unwrap_or_else(|| silent_outcome(&run.handle())))
}

fn run_sweep(ledger: &ClaimLedger, levels: &[f64], config: &ForecastConfig, args: &Args) -> Result<()> {
    let maps = levels
        .iter()
        .map(|&p| ProbabilityMap::uniform(p))
        .collect::<Result<Vec<_>, _>>()?;
    let results = forecast::sweep(ledger, &maps, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("\n=== Sweep (uniform probability, {} trials each) ===", config.total_iterations);
    println!(
        "{:>6} | {:>14} | {:>14} | {:>14} | {:>14}",
        "p", "Expected", "P10", "P50", "P90"
    );
    println!("{}", "-".repeat(6 + 4 * 17));
    for (p, r) in levels.iter().zip(&results) {
        println!(
            "{:>6.2} | {:>14.2} | {:>14.2} | {:>14.2} | {:>14.2}",
            p,
            cents_to_units(r.expected_revenue),
            cents_to_units(r.percentiles.p10 as f64),
            cents_to_units(r.percentiles.p50 as f64),
            cents_to_units(r.percentiles.p90 as f64),
        );
    }
    Ok(())
}

fn draw_progress(fraction: f64) {
    const WIDTH: usize = 40;
    let filled = (fraction * WIDTH as f64).round() as usize;
    eprint!("\r[{}{}] {:>5.1}%", "#".repeat(filled), " ".repeat(WIDTH - filled), fraction * 100.0);
    let _ = io::stderr().flush();
}

fn print_summary(s: &LedgerSummary) {
    println!("\n=== Ledger ===");
    println!("  Claims: {}   Total billed: {:.2}", s.total_claims, cents_to_units(s.total_amount as f64));
    println!("{:>10} | {:>6} | {:>14}", "Status", "Count", "Amount");
    println!("{}", "-".repeat(36));
    for (status, t) in &s.by_status {
        println!("{:>10} | {:>6} | {:>14.2}", status, t.count, cents_to_units(t.amount as f64));
    }
    println!("\n{:>14} | {:>6} | {:>14}", "Payer", "Count", "Amount");
    println!("{}", "-".repeat(40));
    for p in &s.by_payer {
        println!(
            "{:>14} | {:>6} | {:>14.2}",
            p.payer,
            p.totals.count,
            cents_to_units(p.totals.amount as f64)
        );
    }
}

fn print_probabilities(map: &ProbabilityMap) {
    println!("\n=== Payment probabilities ===");
    for status in PaymentStatus::ALL {
        match map.get(status) {
            Ok(p) => println!("  {status:<9} {:>5.1}%", p * 100.0),
            Err(_) => println!("  {status:<9}   n/a"),
        }
    }
}

fn print_result(r: &SimulationResult, trials: usize) {
    let units = |c: u64| cents_to_units(c as f64);
    println!("\n=== Revenue forecast ({trials} trials) ===");
    println!("  Expected: {:>14.2}", cents_to_units(r.expected_revenue));
    println!("  Min:      {:>14.2}", units(r.min_revenue));
    println!("  P10:      {:>14.2}", units(r.percentiles.p10));
    println!("  P25:      {:>14.2}", units(r.percentiles.p25));
    println!("  P50:      {:>14.2}", units(r.percentiles.p50));
    println!("  P75:      {:>14.2}", units(r.percentiles.p75));
    println!("  P90:      {:>14.2}", units(r.percentiles.p90));
    println!("  Max:      {:>14.2}", units(r.max_revenue));

    const BAR: f64 = 50.0;
    println!("\n--- Distribution ({NUM_BUCKETS} buckets, width {:.2}) ---", cents_to_units(r.bucket_width()));
    for (lower, freq) in r.buckets.iter().zip(&r.distribution) {
        println!(
            "{:>14.2} | {}",
            cents_to_units(*lower),
            "█".repeat((freq * BAR).round() as usize)
        );
    }
}
