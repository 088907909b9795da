//! Development automation tasks for the clientrt workspace.
//!
//! Run with: `cargo xtask <command>`
//!
//! This is a CLI tool for developers, so `println!` and `eprintln!` are
//! intentionally used for user-facing output rather than structured logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use std::{env, fs};

use anyhow::{anyhow, Context};

mod features;

const FIXTURES_DIR: &str = "crates/retry/tests/fixtures";

fn main() -> ExitCode {
    let task = env::args().nth(1);

    let result = match task.as_deref() {
        Some("ci") => run_ci(),
        Some("fmt") => run_fmt(),
        Some("clippy") => run_clippy(),
        Some("test") => run_test(),
        Some("conformance") => run_conformance(),
        Some("bench") => run_bench(),
        Some("deny") => run_deny(),
        Some("audit") => run_audit(),
        Some("test-features") => features::test_feature_matrix(),
        Some("help") | None => {
            print_help();
            Ok(())
        }
        Some(unknown) => {
            eprintln!("Unknown task: {unknown}");
            eprintln!();
            print_help();
            Err(anyhow::anyhow!("Unknown task"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Task failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("clientrt Development Tasks");
    println!();
    println!("USAGE:");
    println!("    cargo xtask <TASK>");
    println!();
    println!("TASKS:");
    println!("    ci             Run all CI checks (fmt, clippy, features, test, conformance, deny, audit)");
    println!("    fmt            Check Rust code formatting");
    println!("    clippy         Run Clippy lints");
    println!("    test           Run all tests");
    println!("    conformance    Run the YAML fixture conformance suite");
    println!("    bench          Run the retry benchmarks");
    println!("    test-features  Verify the clientrt-retry feature matrix compiles");
    println!("    deny           Check dependencies with cargo-deny");
    println!("    audit          Audit dependencies for security vulnerabilities");
    println!("    help           Show this help message");
}

/// Run all CI checks in sequence
fn run_ci() -> anyhow::Result<()> {
    println!("==> Running CI checks...\n");

    println!("==> Step 1/7: Checking Rust format...");
    run_fmt()?;

    println!("\n==> Step 2/7: Running Clippy...");
    run_clippy()?;

    println!("\n==> Step 3/7: Checking feature combinations...");
    features::test_feature_matrix()?;

    println!("\n==> Step 4/7: Running tests...");
    run_test()?;

    println!("\n==> Step 5/7: Running conformance fixtures...");
    run_conformance()?;

    println!("\n==> Step 6/7: Checking dependencies...");
    run_deny()?;

    println!("\n==> Step 7/7: Auditing dependencies...");
    run_audit()?;

    println!("\n✓ All CI checks passed!");
    Ok(())
}

/// Check Rust code formatting
fn run_fmt() -> anyhow::Result<()> {
    let status = Command::new("cargo").args(["fmt", "--all", "--", "--check"]).status()?;

    if !status.success() {
        anyhow::bail!("Format check failed. Run 'cargo fmt --all' to fix.");
    }

    Ok(())
}

/// Run Clippy lints
fn run_clippy() -> anyhow::Result<()> {
    let status = Command::new("cargo")
        .args(["clippy", "--workspace", "--all-targets", "--all-features", "--", "-D", "warnings"])
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("Clippy run failed. See output above."))
    }
}

/// Run all workspace tests
fn run_test() -> anyhow::Result<()> {
    let status = Command::new("cargo").args(["test", "--workspace", "--all-features"]).status()?;

    if !status.success() {
        anyhow::bail!("Tests failed");
    }

    Ok(())
}

/// Run the fixture-driven conformance suite
fn run_conformance() -> anyhow::Result<()> {
    let fixtures_dir = PathBuf::from(FIXTURES_DIR);
    if !fixtures_dir.exists() {
        anyhow::bail!("Fixtures directory not found at {}", fixtures_dir.display());
    }
    println!(
        "Found {} fixture files in {}",
        count_yaml_files(&fixtures_dir)?,
        fixtures_dir.display()
    );

    let status = Command::new("cargo")
        .args(["test", "-p", "clientrt-retry", "--features", "test-utils", "--test", "conformance"])
        .status()
        .context("Failed to run cargo test")?;

    if !status.success() {
        anyhow::bail!("Conformance fixtures failed");
    }

    println!("✓ Conformance fixtures passed");
    Ok(())
}

/// Count YAML fixture files in a directory
fn count_yaml_files(dir: &Path) -> anyhow::Result<usize> {
    let entries = fs::read_dir(dir).context("Failed to read fixtures directory")?;

    Ok(entries
        .filter_map(Result::ok)
        .filter(|e| {
            matches!(
                e.path().extension().and_then(std::ffi::OsStr::to_str),
                Some("yaml" | "yml")
            )
        })
        .count())
}

/// Run the criterion benchmarks
fn run_bench() -> anyhow::Result<()> {
    let status = Command::new("cargo")
        .args(["bench", "-p", "clientrt-retry", "--bench", "retry_bench"])
        .status()
        .context("Failed to run cargo bench")?;

    if !status.success() {
        anyhow::bail!("Benchmarks failed");
    }

    Ok(())
}

/// Check dependencies with cargo-deny
fn run_deny() -> anyhow::Result<()> {
    // Check if cargo-deny is installed
    let check_installed = Command::new("cargo").args(["deny", "--version"]).output();

    if check_installed.is_err() || !check_installed.as_ref().is_ok_and(|o| o.status.success()) {
        eprintln!("cargo-deny is not installed.");
        eprintln!("Install it with: cargo install cargo-deny");
        anyhow::bail!("cargo-deny not found");
    }

    let status = Command::new("cargo").args(["deny", "check"]).status()?;

    if !status.success() {
        anyhow::bail!("cargo-deny found issues");
    }

    Ok(())
}

/// Audit dependencies for security vulnerabilities
fn run_audit() -> anyhow::Result<()> {
    // Check if cargo-audit is installed
    let check_installed = Command::new("cargo").args(["audit", "--version"]).output();

    if check_installed.is_err() || !check_installed.as_ref().is_ok_and(|o| o.status.success()) {
        eprintln!("cargo-audit is not installed.");
        eprintln!("Install it with: cargo install cargo-audit");
        anyhow::bail!("cargo-audit not found");
    }

    let status = Command::new("cargo").args(["audit"]).status()?;

    if !status.success() {
        anyhow::bail!("cargo-audit found vulnerabilities");
    }

    Ok(())
}
