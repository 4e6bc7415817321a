//! CLI host for the geometry prover
//!
//! Reads a problem (from a file, or inline via `-manual`), saturates it, and
//! prints the ordered proof with goal lines highlighted. Exits non-zero when
//! the problem remains unsolved.
//!
//! Flags:
//! - `-manual "<problem>"` — problem text on the command line instead of a file.
//! - `--max-iters N`       — bound on saturation passes (default 3).
//! - `--no-color`          — plain output (no ANSI highlighting).

#![forbid(unsafe_code)]

use std::{env, fs, process};

use tinygeo::{parse_problem, Problem, DEFAULT_MAX_ITERS};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  solve <problem-file> [--max-iters N] [--no-color]");
    eprintln!("  solve -manual \"<problem>\" [--max-iters N] [--no-color]");
    process::exit(2);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "tinygeo=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let color = !args.iter().any(|a| a == "--no-color");
    let max_iters = parse_flag(&args, "--max-iters")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_ITERS);

    let text = if let Some(problem_str) = parse_flag(&args, "-manual") {
        problem_str
    } else {
        // First free-standing argument is the problem file.
        let mut path: Option<String> = None;
        let mut it = args.iter();
        while let Some(a) = it.next() {
            match a.as_str() {
                "--max-iters" => {
                    let _ = it.next();
                }
                _ if a.starts_with('-') => {}
                _ => {
                    path = Some(a.clone());
                    break;
                }
            }
        }
        let Some(path) = path else { usage() };
        fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("read problem file {path}: {e}"))?
    };

    let parsed = parse_problem(&text).map_err(|e| anyhow::anyhow!("parse problem: {e}"))?;

    println!("Initial predicates:");
    for p in &parsed.premises {
        println!("  {p}");
    }
    println!("Goals:");
    for g in &parsed.goals {
        println!("  {g}");
    }
    println!();

    let mut problem = Problem::new(parsed.premises, parsed.goals, parsed.points)
        .map_err(|e| anyhow::anyhow!("construct problem: {e}"))?;

    problem.saturate(max_iters);

    match problem.render_proof(color) {
        Ok(proof) => {
            println!("{proof}");
            if color {
                println!("\x1b[32mSolved!\x1b[0m");
            } else {
                println!("Solved!");
            }
            Ok(())
        }
        Err(e) => {
            println!("{e}");
            if color {
                eprintln!("\x1b[31mCould not solve the problem.\x1b[0m");
            } else {
                eprintln!("Could not solve the problem.");
            }
            process::exit(1);
        }
    }
}
