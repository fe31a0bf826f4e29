use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{info, instrument};

use crate::config::Config;
use crate::dataset::{self, Sample};
use crate::inference::{GenerationParams, TextGenerator};
use crate::metrics::{EvaluationMetrics, MetricsCalculator};
use crate::parser;
use crate::prompt::PromptBuilder;
use crate::report;

/// One sample's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRecord {
    pub expected: String,
    /// 空文字列はジャンルを読み取れなかったことを示す
    pub predicted: String,
    pub generated: String,
}

impl PredictionRecord {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        !self.predicted.is_empty() && self.predicted == self.expected
    }
}

/// Result of a full evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub records: Vec<PredictionRecord>,
    pub metrics: EvaluationMetrics,
    /// 推論にかかった時間
    pub elapsed: Duration,
}

/// Sampling and prompting settings for a run.
#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    pub model: String,
    pub shuffle_seed: u64,
    pub sample_limit: usize,
    pub generation: GenerationParams,
}

impl EvaluationSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model().to_string(),
            shuffle_seed: config.shuffle_seed(),
            sample_limit: config.sample_limit().get(),
            generation: GenerationParams::from_config(config),
        }
    }
}

/// Loads the configured dataset and evaluates it.
///
/// The testing set size is written to `out` before inference starts.
///
/// # Errors
/// Dataset failures, an empty dataset, or a failed generation call.
pub async fn run<G, W>(config: &Config, generator: &G, out: &mut W) -> Result<EvaluationOutcome>
where
    G: TextGenerator + ?Sized,
    W: Write + ?Sized,
{
    let samples = dataset::load_samples(config.dataset_path())
        .context("failed to load evaluation dataset")?;
    evaluate_samples(samples, &EvaluationSettings::from_config(config), generator, out).await
}

/// データセットをシャッフル・件数制限し、全プロンプトをまとめて順に推論して評価する。
///
/// 推論を始める前に `Testing set size: N` を `out` へ書き出す。
///
/// # Errors
/// サンプルが空の場合、出力への書き込みや推論呼び出しが失敗した場合。
#[instrument(skip_all, fields(model = %settings.model, limit = settings.sample_limit))]
pub async fn evaluate_samples<G, W>(
    samples: Vec<Sample>,
    settings: &EvaluationSettings,
    generator: &G,
    out: &mut W,
) -> Result<EvaluationOutcome>
where
    G: TextGenerator + ?Sized,
    W: Write + ?Sized,
{
    if samples.is_empty() {
        bail!("evaluation requires at least one sample");
    }

    let samples = dataset::shuffle_and_limit(samples, settings.shuffle_seed, settings.sample_limit);
    let builder = PromptBuilder::for_model(&settings.model);
    let total = samples.len();

    writeln!(out, "{}", report::render_testing_set_size(total))
        .and_then(|()| out.flush())
        .context("failed to write testing set size")?;
    info!(total, "starting genre evaluation");

    let prompts: Vec<String> = samples
        .iter()
        .map(|sample| builder.render_sample(sample))
        .collect();

    let start = Instant::now();
    let generated = generator
        .generate_all(&prompts, &settings.generation)
        .await?;
    let elapsed = start.elapsed();

    if generated.len() != total {
        bail!(
            "generator returned {} outputs for {total} prompts",
            generated.len()
        );
    }

    let mut calculator = MetricsCalculator::new();
    let records: Vec<PredictionRecord> = samples
        .into_iter()
        .zip(generated)
        .map(|(sample, generated)| {
            let predicted = parser::parse_genre(&generated);
            calculator.push(&sample.genre, &predicted);
            PredictionRecord {
                expected: sample.genre,
                predicted,
                generated,
            }
        })
        .collect();

    let metrics = calculator.finalize();
    info!(
        samples = metrics.total_samples,
        correct = metrics.correct_samples,
        unparsed = records.iter().filter(|record| record.predicted.is_empty()).count(),
        accuracy = metrics.summary.accuracy,
        macro_f1 = metrics.summary.macro_f1,
        weighted_f1 = metrics.summary.weighted_f1,
        elapsed_secs = elapsed.as_secs_f64(),
        "genre evaluation finished"
    );

    Ok(EvaluationOutcome {
        records,
        metrics,
        elapsed,
    })
}
