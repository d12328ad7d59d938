//! Reporting and export — JSON, CSV, and Markdown artifacts.
//!
//! - **JSON**: full cross-validation report and scan report
//! - **CSV**: detection table (window bars omitted) and confusion matrix
//! - **Markdown**: human-readable evaluation summary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::backtester::{CrossValidationReport, Detection, ScanReport, ThresholdRow};
use crate::metrics::ConfusionMatrix;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_report_json(report: &CrossValidationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize cross-validation report")
}

pub fn import_report_json(json: &str) -> Result<CrossValidationReport> {
    serde_json::from_str(json).context("failed to deserialize cross-validation report")
}

pub fn export_scan_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize scan report")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: start_index, end_index, start_time, end_time, label, confidence
pub fn export_detections_csv(detections: &[Detection]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "start_index",
        "end_index",
        "start_time",
        "end_time",
        "label",
        "confidence",
    ])?;
    for d in detections {
        wtr.write_record([
            d.start_index.to_string(),
            d.end_index.to_string(),
            d.start_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            d.end_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            d.label.to_string(),
            format!("{:.4}", d.confidence),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Header row is `true\predicted` followed by the labels; one row per true label.
pub fn export_confusion_csv(matrix: &ConfusionMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["true\\predicted".to_string()];
    header.extend(matrix.labels.iter().map(|l| l.to_string()));
    wtr.write_record(&header)?;
    for (label, row) in matrix.labels.iter().zip(&matrix.counts) {
        let mut record = vec![label.to_string()];
        record.extend(row.iter().map(|c| c.to_string()));
        wtr.write_record(&record)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `detections.csv` and `scan.json` under `output_dir`.
pub fn save_scan_artifacts(report: &ScanReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;
    std::fs::write(
        output_dir.join("detections.csv"),
        export_detections_csv(&report.detections)?,
    )?;
    std::fs::write(output_dir.join("scan.json"), export_scan_json(report)?)?;
    Ok(output_dir.to_path_buf())
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Markdown summary of a cross-validation run, optionally with the
/// confusion matrix and threshold sweep.
pub fn generate_report(
    report: &CrossValidationReport,
    confusion: Option<&ConfusionMatrix>,
    sweep: &[ThresholdRow],
) -> String {
    let mut md = String::with_capacity(2048);
    md.push_str("# Pattern Validation Report\n\n");

    md.push_str("## Setup\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Strategy | {} |\n", report.cv_strategy));
    md.push_str(&format!("| Templates | {} |\n", report.template_count));
    md.push_str(&format!("| Min Confidence | {:.2} |\n", report.min_confidence));
    if let Some(ref fp) = report.library_fingerprint {
        md.push_str(&format!("| Library Hash | {fp} |\n"));
    }
    md.push('\n');

    let m = &report.metrics;
    md.push_str("## Metrics\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Accuracy | {:.1}% |\n", m.accuracy * 100.0));
    md.push_str(&format!("| Macro Precision | {:.3} |\n", m.macro_precision));
    md.push_str(&format!("| Macro Recall | {:.3} |\n", m.macro_recall));
    md.push_str(&format!("| Macro F1 | {:.3} |\n", m.macro_f1));
    md.push_str(&format!("| Matched Rate | {:.1}% |\n", m.matched_rate * 100.0));
    md.push_str(&format!("| Avg Confidence | {:.3} |\n", m.avg_confidence));
    md.push_str(&format!("| Samples | {} |\n", m.total_samples));
    md.push('\n');

    if let Some(cm) = confusion {
        md.push_str("## Confusion Matrix\n\n");
        md.push_str("| true \\ predicted |");
        for label in &cm.labels {
            md.push_str(&format!(" {label} |"));
        }
        md.push_str("\n| --- |");
        md.push_str(&" --- |".repeat(cm.labels.len()));
        md.push('\n');
        for (label, row) in cm.labels.iter().zip(&cm.counts) {
            md.push_str(&format!("| {label} |"));
            for count in row {
                md.push_str(&format!(" {count} |"));
            }
            md.push('\n');
        }
        md.push('\n');
    }

    if !sweep.is_empty() {
        md.push_str("## Threshold Sweep\n\n");
        md.push_str("| Threshold | Accuracy | Precision | Recall | F1 | Matched |\n");
        md.push_str("| --- | --- | --- | --- | --- | --- |\n");
        for row in sweep {
            md.push_str(&format!(
                "| {:.2} | {:.3} | {:.3} | {:.3} | {:.3} | {:.1}% |\n",
                row.threshold,
                row.accuracy,
                row.precision,
                row.recall,
                row.f1,
                row.matched_rate * 100.0
            ));
        }
        md.push('\n');
    }

    md
}
