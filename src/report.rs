//! Plain-text console report.
use std::fmt::Write;

use crate::evaluation::{EvaluationOutcome, PredictionRecord};
use crate::genre::{GENRES, short_label};
use crate::metrics::{ConfusionMatrix, EvaluationMetrics, Misclassification};

const CELL_WIDTH: usize = 5;
const CELL_SEPARATOR: &str = "  ";

/// 推論前に出す見出し行（改行なし）。
#[must_use]
pub fn render_testing_set_size(total: usize) -> String {
    format!("Testing set size: {total}")
}

/// Renders everything printed after inference, in order.
///
/// Ratios and durations use the shortest round-trip form with at least one
/// decimal place (`1.0`, `0.5`).
#[must_use]
pub fn render(outcome: &EvaluationOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Time taken to complete {} samples: {:?}",
        outcome.records.len(),
        outcome.elapsed.as_secs_f64()
    );
    out.push_str(&render_predictions(&outcome.records));
    let _ = writeln!(out, "Accuracy: {:?}", outcome.metrics.summary.accuracy);
    out.push_str(&render_confusion_matrix(&outcome.metrics.confusion));
    out.push_str(&render_averages(&outcome.metrics));
    out.push_str(&render_misclassifications(
        &outcome.metrics.misclassifications,
    ));
    out
}

#[must_use]
pub fn render_predictions(records: &[PredictionRecord]) -> String {
    records.iter().fold(String::new(), |mut out, record| {
        let _ = writeln!(
            out,
            "Prediction: {}, completion: {}",
            record.predicted, record.expected
        );
        out
    })
}

/// 5文字に切り詰めたジャンル名を見出しにした固定幅の表。
#[must_use]
pub fn render_confusion_matrix(matrix: &ConfusionMatrix) -> String {
    let mut out = String::from("Confusion Matrix:\n");

    let header: Vec<String> = GENRES
        .iter()
        .map(|genre| format!("{:>CELL_WIDTH$}", short_label(genre)))
        .collect();
    let _ = writeln!(out, "       {}", header.join(CELL_SEPARATOR));

    for (row, genre) in GENRES.iter().enumerate() {
        let cells: Vec<String> = matrix
            .row(row)
            .iter()
            .map(|count| format!("{count:>CELL_WIDTH$}"))
            .collect();
        let _ = writeln!(
            out,
            "{:>CELL_WIDTH$} {}",
            short_label(genre),
            cells.join(CELL_SEPARATOR)
        );
    }
    out
}

#[must_use]
pub fn render_averages(metrics: &EvaluationMetrics) -> String {
    let summary = &metrics.summary;
    format!(
        "\n\n\nAverage precision: {:?}\nAverage recall: {:?}\nAverage F1 score: {:?}\n",
        summary.macro_precision, summary.macro_recall, summary.macro_f1
    )
}

#[must_use]
pub fn render_misclassifications(entries: &[Misclassification]) -> String {
    let mut out = String::from("\n\n\n");
    for entry in entries {
        let _ = writeln!(
            out,
            "{} most commonly misclassified as {}: {:.2}%",
            entry.expected,
            entry.predicted,
            entry.share * 100.0
        );
    }
    out
}
