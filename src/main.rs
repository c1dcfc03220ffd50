//! AptiForge: student interest and aptitude detection CLI
//!
//! This is the main entrypoint that orchestrates loading, clustering,
//! labeling and the report outputs.

use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use aptiforge::{
    load_scores, predict_label, report, run_pipeline, viz, Args, LabeledScores,
};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "run failed");
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Every failure is reported as "cannot process this file: <reason>"
fn run(args: &Args) -> Result<()> {
    execute(args).context("cannot process this file")
}

fn execute(args: &Args) -> Result<()> {
    let predict_scores = args.parse_predict_scores()?;
    let labeled = build_labeled(args)?;

    match predict_scores {
        Some(scores) => run_prediction_mode(&labeled, &scores),
        None => run_full_report(args, &labeled),
    }
}

/// Load, normalize, cluster and label the input file
fn build_labeled(args: &Args) -> aptiforge::Result<LabeledScores> {
    let config = args.pipeline_config();
    let start_time = Instant::now();

    let data = load_scores(&args.input, &config)?;
    debug!(
        students = data.len(),
        subjects = ?data.subjects,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "input parsed"
    );

    let labeled = run_pipeline(data, &config)?;
    debug!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "pipeline finished"
    );
    Ok(labeled)
}

/// Place one new student into an existing cluster
fn run_prediction_mode(labeled: &LabeledScores, scores: &[f64]) -> Result<()> {
    println!("=== Prediction Mode ===");
    println!("Subjects: {}", labeled.data.subjects.join(", "));

    let (cluster, label) = predict_label(labeled, scores)?;
    let profile = &labeled.profiles[cluster];
    let percentage = profile.size as f64 / labeled.data.len() as f64 * 100.0;

    println!("\n✓ Predicted Cluster: {cluster}");
    println!("  Label: {label}");
    println!(
        "  Cluster size: {} students ({:.1}% of total), strongest in {}",
        profile.size, percentage, profile.dominant_subject
    );

    Ok(())
}

/// Table, chart, full export and the optional student document
fn run_full_report(args: &Args, labeled: &LabeledScores) -> Result<()> {
    // Resolve the student before writing anything
    let document = args
        .student
        .as_deref()
        .map(|name| report::student_document(labeled, name))
        .transpose()?;

    let rows = report::table_rows(labeled);
    if args.json {
        println!("{}", report::render_table_json(&rows)?);
    } else {
        println!("=== Clustering Result ===\n");
        print!("{}", report::render_table(&rows));
        viz::print_cluster_statistics(labeled);
    }

    let counts = report::label_distribution(labeled);
    viz::create_distribution_chart(&counts, &args.chart)
        .with_context(|| format!("cannot write chart to {}", args.chart.display()))?;

    report::write_export(labeled, &args.export)
        .with_context(|| format!("cannot write export to {}", args.export.display()))?;

    let document_path = match document {
        Some(document) => {
            let path = args.report_dir.join(&document.file_name);
            std::fs::write(&path, document.content)
                .with_context(|| format!("cannot write report to {}", path.display()))?;
            Some(path)
        }
        None => None,
    };

    if !args.json {
        println!("\n✓ Chart saved to: {}", args.chart.display());
        println!("✓ Labeled table saved to: {}", args.export.display());
        if let Some(path) = document_path {
            println!("✓ Student report saved to: {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Name,Math,Arts_Culture,Economics").unwrap();
        writeln!(file, "Ayu,95,3,2").unwrap();
        writeln!(file, "Bima,97,2,4").unwrap();
        writeln!(file, "Citra,3,98,1").unwrap();
        writeln!(file, "Dian,2,96,3").unwrap();
        writeln!(file, "Eka,4,2,97").unwrap();
        file
    }

    fn failure_message(extra: &[&str]) -> String {
        let input = create_test_csv();
        let out = tempdir().unwrap();
        let chart = out.path().join("chart.svg");
        let export = out.path().join("labeled.csv");

        let mut argv = vec![
            "aptiforge".to_string(),
            "--input".to_string(),
            input.path().display().to_string(),
            "--chart".to_string(),
            chart.display().to_string(),
            "--export".to_string(),
            export.display().to_string(),
        ];
        argv.extend(extra.iter().map(|a| a.to_string()));

        let err = run(&Args::parse_from(argv)).unwrap_err();
        assert!(!export.exists());
        format!("{err:#}")
    }

    #[test]
    fn test_bad_predict_value_is_reported() {
        let message = failure_message(&["--predict", "90,high,10"]);
        assert_eq!(message, "cannot process this file: invalid score value 'high'");
    }

    #[test]
    fn test_predict_width_mismatch_is_reported() {
        let message = failure_message(&["--predict", "90,10"]);
        assert_eq!(message, "cannot process this file: expected 3 score(s), got 2");
    }

    #[test]
    fn test_unknown_student_is_reported() {
        let message = failure_message(&["--student", "Zaki"]);
        assert_eq!(message, "cannot process this file: student 'Zaki' not found");
    }

    #[test]
    fn test_missing_input_column_is_reported() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Student,Math").unwrap();
        writeln!(file, "Ayu,90").unwrap();

        let args = Args::parse_from(["aptiforge", "--input", file.path().to_str().unwrap()]);
        let err = run(&args).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "cannot process this file: missing required column 'Name'"
        );
    }
}
