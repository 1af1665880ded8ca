//! Minimal CLI Bulletproofs range-proof verifier
//!
//! Reads a commitment and proof as JSON (either a file path via `--proof` or
//! stdin) and reports the verification result. Generators are derived
//! on-the-fly for `--bits` (default 32) unless `--generators` points at a
//! previously dumped generator set (see `ec::GeneratorSet::dump_to_json`).

#![forbid(unsafe_code)]

use std::{env, fs, io::Read as _};

use ics_attest_core::bulletproof::{RawRangeProof, VerifyOptions, Verifier};
use ics_attest_core::ec::GeneratorSet;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

#[derive(serde::Deserialize)]
struct ProofFile {
    commitment: String,
    proof: RawRangeProof,
    range_min: i64,
    range_max: i64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args: Vec<String> = env::args().collect();

    let bits: usize = parse_flag(&args, "--bits").and_then(|s| s.parse().ok()).unwrap_or(32);
    let debug = has_flag(&args, "--debug");

    let input = if let Some(path) = parse_flag(&args, "--proof") {
        fs::read_to_string(&path)?
    } else {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    };
    let file: ProofFile = serde_json::from_str(&input)?;

    let generators = match parse_flag(&args, "--generators") {
        Some(path) => {
            eprintln!("Loading generators from {path}...");
            GeneratorSet::load_from_json(std::path::Path::new(&path), bits)?
        }
        None => GeneratorSet::derive(bits),
    };

    let verifier = Verifier::with_generators(generators);
    let opts = VerifyOptions { debug, client_challenges: None, client_mode: None };

    let result = verifier.verify(&file.commitment, &file.proof, file.range_min, file.range_max, &opts);

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.verified {
        std::process::exit(1);
    }
    Ok(())
}
