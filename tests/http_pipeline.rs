// 環境変数の設定 → データセット読み込み → HTTP 推論 → レポートまでを通しで確認する。
// 環境変数を書き換えるため、このファイルにはテストを1つだけ置く。
use std::io::Write;

use genre_eval::config::Config;
use genre_eval::evaluation;
use genre_eval::inference::HttpTextGenerator;
use genre_eval::report;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn run_evaluates_dataset_against_http_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_string_contains("Title: Night Shift"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "generated_text": "<s>[INST] ... [/INST] Horror."
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_string_contains("Title: Laugh Track"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "generated_text": "<s>[INST] ... [/INST] I'm not sure, maybe drama/comedy"
        })))
        .mount(&server)
        .await;

    let mut dataset = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(dataset, "1 ::: Night Shift ::: horror ::: A nurse hears noises.").expect("write");
    writeln!(dataset, "2 ::: Laugh Track ::: comedy ::: A sitcom writer panics.").expect("write");

    // SAFETY: this test binary contains a single test, so nothing else reads the environment.
    unsafe {
        std::env::set_var("GENRE_EVAL_DATASET", dataset.path());
        std::env::set_var("GENRE_EVAL_INFERENCE_URL", server.uri());
        std::env::set_var("GENRE_EVAL_MAX_RETRIES", "0");
    }

    let config = Config::from_env().expect("config loads");
    let generator = HttpTextGenerator::from_config(&config).expect("client builds");
    let mut stdout = Vec::new();
    let outcome = evaluation::run(&config, &generator, &mut stdout)
        .await
        .expect("evaluation succeeds");

    assert_eq!(String::from_utf8_lossy(&stdout), "Testing set size: 2\n");

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.metrics.correct_samples, 1);
    assert!((outcome.metrics.summary.accuracy - 0.5).abs() < 1e-12);

    let rendered = report::render(&outcome);
    assert!(rendered.contains("Accuracy: 0.5\n"));
    assert!(rendered.contains("Prediction: horror, completion: horror\n"));
    assert!(rendered.contains("Prediction: drama, completion: comedy\n"));
    assert!(rendered.contains("comedy most commonly misclassified as drama: 100.00%\n"));
}
