//! Example: Build spectrogram caches for a dataset in parallel
//!
//! Usage:
//!   cargo run --release --example prepare_dataset -- [--jobs N] [--json] [--sr HZ] [--hop N]
//!       [--config FILE] <mix1> <inst1> <mix2> <inst2> ...
//!
//! Notes:
//! - Arguments after the flags are mixture/instrument pairs, in that order.
//! - Parallelism is across pairs; each pair is decoded and transformed on one worker.
//! - Cache files (`.npy`) are written next to each audio file and reused on later runs.
//!   Delete them by hand after changing the audio or the sample rate / hop length.

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use stratum_sep::{PreparationConfig, SpectrogramCache};

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1)
}

#[derive(Serialize)]
struct PairReport {
    mixture: String,
    instrument: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    shape: Option<[usize; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coefficient: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn next_value<T: std::str::FromStr>(args: &mut Vec<String>, flag: &str) -> Result<T, String> {
    if args.is_empty() {
        return Err(format!("{} requires a value", flag));
    }
    let raw = args.remove(0);
    raw.parse::<T>()
        .map_err(|_| format!("invalid value for {}: {}", flag, raw))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut json = false;
    let mut jobs: Option<usize> = None;
    let mut config = PreparationConfig::default();
    let mut paths: Vec<String> = Vec::new();

    while !args.is_empty() {
        let a = args.remove(0);
        match a.as_str() {
            "--json" => json = true,
            "--jobs" => jobs = Some(next_value::<usize>(&mut args, "--jobs")?.max(1)),
            "--sr" => config.sample_rate = next_value(&mut args, "--sr")?,
            "--hop" => config.hop_length = next_value(&mut args, "--hop")?,
            "--config" => {
                let path: PathBuf = next_value(&mut args, "--config")?;
                let text = std::fs::read_to_string(&path)?;
                config = serde_json::from_str(&text)?;
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: prepare_dataset [--jobs N] [--json] [--sr HZ] [--hop N] [--config FILE] \
                     <mix1> <inst1> ...\n\
                     \n\
                     --jobs N       Parallel workers (default: CPU-1)\n\
                     --json         Emit one JSON object per line (JSONL)\n\
                     --sr HZ        Target sample rate (default: 44100)\n\
                     --hop N        STFT hop length (default: 1024)\n\
                     --config FILE  PreparationConfig as JSON\n"
                );
                return Ok(());
            }
            _ => paths.push(a),
        }
    }

    if paths.is_empty() || paths.len() % 2 != 0 {
        eprintln!("ERROR: Provide mixture/instrument path pairs. Use --help for usage.");
        std::process::exit(2);
    }

    let pairs: Vec<(PathBuf, PathBuf)> = paths
        .chunks_exact(2)
        .map(|p| (PathBuf::from(&p[0]), PathBuf::from(&p[1])))
        .collect();

    let jobs = jobs.unwrap_or_else(default_jobs);
    eprintln!(
        "Preparing {} pairs, jobs={}, sr={}, hop={} (n_fft={})",
        pairs.len(),
        jobs,
        config.sample_rate,
        config.hop_length,
        config.n_fft()
    );

    let cache = SpectrogramCache::on_disk().with_silence(config.silence.clone());
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let t0 = Instant::now();
    let results =
        pool.install(|| cache.load_many(&pairs, config.sample_rate, config.hop_length));

    let reports: Vec<PairReport> = pairs
        .iter()
        .zip(results)
        .map(|((mixture, instrument), result)| {
            let mut report = PairReport {
                mixture: mixture.display().to_string(),
                instrument: instrument.display().to_string(),
                shape: None,
                coefficient: None,
                error: None,
            };
            match result {
                Ok(pair) => {
                    let (c, f, t) = pair.shape();
                    report.shape = Some([c, f, t]);
                    report.coefficient = Some(pair.coefficient);
                }
                Err(e) => report.error = Some(e.to_string()),
            }
            report
        })
        .collect();

    for (idx, report) in reports.iter().enumerate() {
        if json {
            println!("{}", serde_json::to_string(report)?);
            continue;
        }
        match (&report.shape, &report.error) {
            (Some(shape), _) => println!(
                "[{}/{}] {}: shape={:?} coefficient={:.4}",
                idx + 1,
                reports.len(),
                report.mixture,
                shape,
                report.coefficient.unwrap_or(0.0)
            ),
            (None, error) => println!(
                "[{}/{}] {}: ERROR: {}",
                idx + 1,
                reports.len(),
                report.mixture,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    let ok = reports.iter().filter(|r| r.error.is_none()).count();
    eprintln!(
        "Done: ok={}/{} wall={:.0}ms",
        ok,
        reports.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );

    Ok(())
}
