//! Example: Refine a predicted mask stored as `.npy`
//!
//! Usage:
//!   cargo run --example refine_mask -- <mask.npy> <reference.npy> <out.npy>
//!       [--min-range N] [--threshold T] [--fade N]
//!
//! `reference.npy` is usually the cached mixture magnitude produced by
//! `prepare_dataset`, divided by its normalization coefficient.

use std::env;
use std::path::PathBuf;

use ndarray::Ix3;
use stratum_sep::io::npy;
use stratum_sep::masking::{find_low_energy_runs, refine_in_place};
use stratum_sep::MaskRefineConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut config = MaskRefineConfig::default();
    let mut paths: Vec<PathBuf> = Vec::new();

    while !args.is_empty() {
        let a = args.remove(0);
        match a.as_str() {
            "--min-range" | "--threshold" | "--fade" => {
                if args.is_empty() {
                    return Err(format!("{} requires a value", a).into());
                }
                let value = args.remove(0);
                match a.as_str() {
                    "--min-range" => config.min_range = value.parse()?,
                    "--threshold" => config.threshold = value.parse()?,
                    _ => config.fade_width = value.parse()?,
                }
            }
            _ => paths.push(PathBuf::from(a)),
        }
    }

    if paths.len() != 3 {
        eprintln!("Usage: refine_mask <mask.npy> <reference.npy> <out.npy> [--min-range N] [--threshold T] [--fade N]");
        std::process::exit(2);
    }

    let mut mask = npy::load(&paths[0])?.into_dimensionality::<Ix3>()?;
    let reference = npy::load(&paths[1])?.into_dimensionality::<Ix3>()?;

    let runs = find_low_energy_runs(&reference, config.threshold, config.min_range)?;
    println!("Low-energy runs: {}", runs.len());
    for run in &runs {
        println!("  frames {}..{} ({} frames)", run.start, run.end, run.len());
    }

    refine_in_place(&mut mask, &reference, &config)?;
    npy::save(&paths[2], &mask)?;
    println!("Wrote {}", paths[2].display());

    Ok(())
}
