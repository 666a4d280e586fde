//! synthcheck: CLI entry point.
//!
//! Compares synthetic and real survey samples with the statistical
//! battery and reports a tiered verdict.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use synthcheck::engine::ComparisonEngine;
use synthcheck::types::{
    load_comparison_specs, load_samples, ComparisonResult, ComparisonSpec, TestResult, Tier,
};

#[derive(Parser)]
#[command(name = "synthcheck")]
#[command(about = "Statistical validation of synthetic survey responses against real responses")]
#[command(version)]
struct Cli {
    /// Synthetic sample file (JSON array or delimited text).
    #[arg(requires = "real")]
    synthetic: Option<PathBuf>,

    /// Real sample file (JSON array or delimited text).
    real: Option<PathBuf>,

    /// YAML spec of named comparisons.
    #[arg(long, conflicts_with = "synthetic")]
    spec: Option<PathBuf>,

    /// Run all comparisons in the spec.
    #[arg(long, requires = "spec")]
    all: bool,

    /// Write the sanitized JSON result tree to this path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress per-test lines.
    #[arg(short, long)]
    quiet: bool,
}

type NamedComparison = (String, Vec<f64>, Vec<f64>);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.spec.is_some() && !cli.all {
        println!("Use --all to run all comparisons in the spec");
        return Ok(());
    }

    let comparisons = gather_comparisons(&cli)?;
    if comparisons.is_empty() {
        anyhow::bail!("nothing to compare; pass SYNTHETIC and REAL files, or --spec with --all");
    }

    run_comparisons(&cli, &comparisons)
}

fn gather_comparisons(cli: &Cli) -> anyhow::Result<Vec<NamedComparison>> {
    if let Some(ref spec_path) = cli.spec {
        let content = fs::read_to_string(spec_path)
            .with_context(|| format!("failed to read spec file: {}", spec_path.display()))?;
        let specs = load_comparison_specs(&content)
            .with_context(|| format!("failed to parse spec file: {}", spec_path.display()))?;

        let base = spec_path.parent().unwrap_or_else(|| Path::new("."));
        let mut comparisons = Vec::new();
        for spec in specs {
            match resolve_spec(&spec, base) {
                Ok(comparison) => comparisons.push(comparison),
                Err(e) => {
                    eprintln!("Warning: skipping {}: {e:#}", spec.name);
                }
            }
        }
        return Ok(comparisons);
    }

    let (Some(synthetic_path), Some(real_path)) = (&cli.synthetic, &cli.real) else {
        return Ok(Vec::new());
    };
    let name = format!("{} vs {}", stem(synthetic_path), stem(real_path));
    Ok(vec![(
        name,
        load_samples(synthetic_path)?,
        load_samples(real_path)?,
    )])
}

fn resolve_spec(spec: &ComparisonSpec, base: &Path) -> anyhow::Result<NamedComparison> {
    let synthetic = side_samples(
        &spec.synthetic_values,
        spec.synthetic_file.as_deref(),
        base,
        "synthetic",
    )?;
    let real = side_samples(&spec.real_values, spec.real_file.as_deref(), base, "real")?;
    Ok((spec.name.clone(), synthetic, real))
}

fn side_samples(
    inline: &[f64],
    file: Option<&Path>,
    base: &Path,
    side: &str,
) -> anyhow::Result<Vec<f64>> {
    if !inline.is_empty() {
        return Ok(inline.to_vec());
    }
    file.map_or_else(
        || anyhow::bail!("no {side} samples (inline values or file) specified"),
        |path| load_samples(&base.join(path)),
    )
}

fn stem(path: &Path) -> String {
    path.file_stem().map_or_else(
        || path.display().to_string(),
        |s| s.to_string_lossy().into_owned(),
    )
}

fn run_comparisons(cli: &Cli, comparisons: &[NamedComparison]) -> anyhow::Result<()> {
    let engine = ComparisonEngine::new();
    let start = Instant::now();
    let mut results = Vec::new();

    println!("{}", "synthcheck".bold());
    println!("  Comparisons: {}", comparisons.len());
    println!();

    for (name, synthetic, real) in comparisons {
        let result = engine.compare_distributions(synthetic, real);
        print_comparison(name, &result, cli.quiet);
        results.push((name.clone(), result));
    }

    let elapsed = start.elapsed();

    if let Some(ref path) = cli.output {
        write_output(path, &results)?;
        println!("Wrote {}", path.display());
        println!();
    }

    // summary
    println!("{}", "=".repeat(60));

    let passed = results
        .iter()
        .filter(|(_, r)| matches!(r.overall_tier, Tier::Tier1 | Tier::Tier2))
        .count();
    let failed = results.len() - passed;

    if failed == 0 {
        println!(
            "  {} {} passed in {:.2}s",
            "PASS".green(),
            passed.to_string().green(),
            elapsed.as_secs_f64()
        );
    } else {
        println!(
            "  {} {} passed, {} failed in {:.2}s",
            "FAIL".red(),
            passed,
            failed.to_string().red(),
            elapsed.as_secs_f64()
        );
    }

    println!("{}", "=".repeat(60));

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_comparison(name: &str, result: &ComparisonResult, quiet: bool) {
    println!("{}", name.bold());

    if !quiet {
        for test in &result.tests {
            print_test(test);
        }
    }

    let accuracy = result
        .overall_accuracy
        .map_or_else(|| "n/a".to_string(), |a| format!("{:.1}%", a * 100.0));
    let tier = result.overall_tier.to_string();
    let tier = match result.overall_tier {
        Tier::Tier1 => tier.green(),
        Tier::Tier2 => tier.yellow(),
        Tier::Tier3 | Tier::Tier4 => tier.red(),
    };
    println!("  overall: {tier} (accuracy: {accuracy})");

    for recommendation in &result.recommendations {
        println!("  {}", recommendation.dimmed());
    }
    println!();
}

fn print_test(test: &TestResult) {
    match test {
        TestResult::Scored(scored) => {
            let label = format!(
                "{} {} (match {:.3})",
                scored.test, scored.tier, scored.match_score
            );
            match scored.tier {
                Tier::Tier1 => println!("  {} {label}", "✓".green()),
                Tier::Tier2 => println!("  {} {label}", "✓".yellow()),
                Tier::Tier3 | Tier::Tier4 => println!("  {} {label}", "✗".red()),
            }
        }
        TestResult::Failed(failed) => {
            println!("  {} {} (error)", "✗".red(), failed.test.to_string().red());
            println!("      {}", failed.error);
        }
    }
}

fn write_output(path: &Path, results: &[(String, ComparisonResult)]) -> anyhow::Result<()> {
    let value = if results.len() == 1 {
        results[0].1.to_sanitized_value()
    } else {
        serde_json::Value::Object(
            results
                .iter()
                .map(|(name, result)| (name.clone(), result.to_sanitized_value()))
                .collect(),
        )
    };

    let json = serde_json::to_string_pretty(&value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
