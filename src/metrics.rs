//! 混同行列と分類メトリクス。
//!
//! 行が正解ジャンル、列が予測ジャンル。集合外のラベル（空の予測を含む）は
//! 行列には数えないが、正解率では不正解として扱う。
#![allow(clippy::cast_precision_loss)]

use ndarray::{Array2, Axis};

use crate::genre::{self, GENRE_COUNT, GENRES};

/// Square count table over [`GENRES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Array2<u64>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfusionMatrix {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: Array2::zeros((GENRE_COUNT, GENRE_COUNT)),
        }
    }

    /// Builds a matrix from parallel label slices.
    #[must_use]
    pub fn from_pairs<E, P>(expected: &[E], predicted: &[P]) -> Self
    where
        E: AsRef<str>,
        P: AsRef<str>,
    {
        let mut matrix = Self::new();
        for (truth, prediction) in expected.iter().zip(predicted) {
            matrix.record(truth.as_ref(), prediction.as_ref());
        }
        matrix
    }

    /// ペアを1件数える。どちらかが集合外なら数えずに `false` を返す。
    pub fn record(&mut self, expected: &str, predicted: &str) -> bool {
        match (genre::index_of(expected), genre::index_of(predicted)) {
            (Some(row), Some(col)) => {
                self.counts[[row, col]] += 1;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn count(&self, row: usize, col: usize) -> u64 {
        self.counts[[row, col]]
    }

    #[must_use]
    pub fn row(&self, row: usize) -> Vec<u64> {
        self.counts.row(row).to_vec()
    }

    #[must_use]
    pub fn row_sum(&self, row: usize) -> u64 {
        self.counts.row(row).sum()
    }

    #[must_use]
    pub fn column_sum(&self, col: usize) -> u64 {
        self.counts.column(col).sum()
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    /// Per-class scores.
    ///
    /// Precision divides the diagonal by the row sum and recall by the
    /// column sum, matching the reporting convention of the original
    /// evaluation runs. Empty denominators yield 0.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let row_sums = self.counts.sum_axis(Axis(1));
        let column_sums = self.counts.sum_axis(Axis(0));

        GENRES
            .iter()
            .enumerate()
            .map(|(idx, genre)| {
                let hits = self.counts[[idx, idx]] as f64;
                let precision = ratio(hits, row_sums[idx] as f64);
                let recall = ratio(hits, column_sums[idx] as f64);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    genre,
                    precision,
                    recall,
                    f1,
                    support: row_sums[idx],
                }
            })
            .collect()
    }

    /// 各正解ジャンルについて、最も多く誤分類された先を列挙する。
    ///
    /// 対角成分は行のコピー上で除外するため、行列自体は変更しない。
    /// 同数の場合はすべて返す。誤分類が無い行は出力しない。
    #[must_use]
    pub fn most_common_misclassifications(&self) -> Vec<Misclassification> {
        let mut report = Vec::new();
        for (idx, genre) in GENRES.iter().enumerate() {
            let mut row = self.row(idx);
            let row_sum: u64 = row.iter().sum();
            row[idx] = 0;

            let max = row.iter().copied().max().unwrap_or(0);
            if max == 0 {
                continue;
            }

            for (col, &value) in row.iter().enumerate() {
                if value == max {
                    report.push(Misclassification {
                        expected: genre,
                        predicted: GENRES[col],
                        count: max,
                        share: max as f64 / row_sum as f64,
                    });
                }
            }
        }
        report
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Precision/recall/F1 for one genre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub genre: &'static str,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// 行列に数えられた正解サンプル数
    pub support: u64,
}

/// "X most commonly misclassified as Y" entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Misclassification {
    pub expected: &'static str,
    pub predicted: &'static str,
    pub count: u64,
    /// 行の合計（正解を含む）に対する割合
    pub share: f64,
}

/// 分類メトリクス。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassificationMetrics {
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub accuracy: f64,
}

/// Everything derived from one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationMetrics {
    pub summary: ClassificationMetrics,
    pub per_class: Vec<ClassMetrics>,
    pub confusion: ConfusionMatrix,
    pub misclassifications: Vec<Misclassification>,
    pub total_samples: usize,
    pub correct_samples: usize,
    /// 集合外ラベルのため行列に入らなかった件数
    pub unmatched_samples: usize,
}

/// 正解ラベルと予測ラベルを逐次登録する集計器。
#[derive(Debug, Default)]
pub struct MetricsCalculator {
    confusion: ConfusionMatrix,
    total_samples: usize,
    correct_samples: usize,
    unmatched_samples: usize,
}

impl MetricsCalculator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 1サンプル分の正解と予測を登録する。
    ///
    /// 空の予測は正解になり得ない。
    pub fn push(&mut self, expected: &str, predicted: &str) {
        self.total_samples += 1;
        if !predicted.is_empty() && expected == predicted {
            self.correct_samples += 1;
        }
        if !self.confusion.record(expected, predicted) {
            self.unmatched_samples += 1;
        }
    }

    #[must_use]
    pub fn finalize(self) -> EvaluationMetrics {
        let per_class = self.confusion.class_metrics();
        let classes = per_class.len() as f64;

        let mean = |value: fn(&ClassMetrics) -> f64| -> f64 {
            ratio(per_class.iter().map(value).sum(), classes)
        };

        let total_support: u64 = per_class.iter().map(|class| class.support).sum();
        let weighted_f1 = ratio(
            per_class
                .iter()
                .map(|class| class.f1 * class.support as f64)
                .sum(),
            total_support as f64,
        );

        let summary = ClassificationMetrics {
            macro_precision: mean(|class| class.precision),
            macro_recall: mean(|class| class.recall),
            macro_f1: mean(|class| class.f1),
            weighted_f1,
            accuracy: ratio(self.correct_samples as f64, self.total_samples as f64),
        };
        let misclassifications = self.confusion.most_common_misclassifications();

        EvaluationMetrics {
            summary,
            per_class,
            confusion: self.confusion,
            misclassifications,
            total_samples: self.total_samples,
            correct_samples: self.correct_samples,
            unmatched_samples: self.unmatched_samples,
        }
    }
}
