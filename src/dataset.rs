//! Line-oriented genre dataset loader.
//!
//! Each line looks like `id ::: title ::: genre ::: description`.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info};

/// Literal separator between dataset fields.
pub const FIELD_DELIMITER: &str = " ::: ";

const TITLE_FIELD: usize = 1;
const GENRE_FIELD: usize = 2;
const DESCRIPTION_FIELD: usize = 3;

/// One labelled movie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub title: String,
    pub description: String,
    pub genre: String,
}

impl Sample {
    /// モデルに渡すユーザーメッセージ本文。
    #[must_use]
    pub fn user_message(&self) -> String {
        format!("Title: {}\nDescription: {}", self.title, self.description)
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: expected at least {expected} \" ::: \"-separated fields, found {found}")]
    MissingFields {
        line: usize,
        expected: usize,
        found: usize,
    },
}

/// 1行をサンプルへ変換する。`line_number` は1始まり。
///
/// # Errors
/// フィールド数が足りない場合は [`DatasetError::MissingFields`] を返す。
pub fn parse_line(line: &str, line_number: usize) -> Result<Sample, DatasetError> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() <= DESCRIPTION_FIELD {
        return Err(DatasetError::MissingFields {
            line: line_number,
            expected: DESCRIPTION_FIELD + 1,
            found: fields.len(),
        });
    }

    let clean = |value: &str| value.trim_end_matches(['\r', '\n']).to_string();
    Ok(Sample {
        title: clean(fields[TITLE_FIELD]),
        genre: clean(fields[GENRE_FIELD]).trim().to_string(),
        description: clean(fields[DESCRIPTION_FIELD]),
    })
}

/// Reads every non-blank line of `reader` into samples.
///
/// # Errors
/// Returns the first malformed line or read failure.
pub fn read_samples<R: BufRead>(reader: R, path: &Path) -> Result<Vec<Sample>, DatasetError> {
    let mut samples = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            debug!(line = idx + 1, "skipping blank dataset line");
            continue;
        }
        samples.push(parse_line(&line, idx + 1)?);
    }
    Ok(samples)
}

/// Opens and parses the dataset file.
///
/// # Errors
/// I/O failures and malformed lines are reported as [`DatasetError`].
pub fn load_samples(path: &Path) -> Result<Vec<Sample>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let samples = read_samples(BufReader::new(file), path)?;
    info!(path = %path.display(), samples = samples.len(), "dataset loaded");
    Ok(samples)
}

/// シード固定でシャッフルし、先頭 `limit` 件に絞る。
#[must_use]
pub fn shuffle_and_limit(mut samples: Vec<Sample>, seed: u64, limit: usize) -> Vec<Sample> {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);
    samples.truncate(limit);
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample(idx: usize) -> Sample {
        Sample {
            title: format!("Title {idx}"),
            description: format!("Description {idx}"),
            genre: "drama".to_string(),
        }
    }

    #[test]
    fn parse_line_maps_fields_by_position() {
        let sample =
            parse_line("1 ::: Some Title ::: comedy ::: A funny movie ::: extra\n", 1)
                .expect("line should parse");
        assert_eq!(sample.title, "Some Title");
        assert_eq!(sample.genre, "comedy");
        assert_eq!(sample.description, "A funny movie");
    }

    #[test]
    fn parse_line_trims_trailing_newline_from_description() {
        let sample = parse_line("7 ::: Jaws (1975) ::: horror ::: A shark.\r\n", 1)
            .expect("line should parse");
        assert_eq!(sample.description, "A shark.");
        assert_eq!(sample.user_message(), "Title: Jaws (1975)\nDescription: A shark.");
    }

    #[test]
    fn parse_line_rejects_short_lines() {
        let error = parse_line("1 ::: Title ::: drama", 42).expect_err("too few fields");
        assert!(matches!(
            error,
            DatasetError::MissingFields {
                line: 42,
                expected: 4,
                found: 3
            }
        ));
    }

    #[test]
    fn load_samples_skips_blank_lines_and_reports_line_numbers() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "1 ::: A ::: drama ::: first").expect("write");
        writeln!(file).expect("write");
        writeln!(file, "2 ::: B ::: war").expect("write");

        let error = load_samples(file.path()).expect_err("third line is malformed");
        assert!(matches!(error, DatasetError::MissingFields { line: 3, .. }));
    }

    #[test]
    fn load_samples_reads_all_rows() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "1 ::: A ::: drama ::: first").expect("write");
        writeln!(file, "2 ::: B ::: war ::: second").expect("write");

        let samples = load_samples(file.path()).expect("dataset loads");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].genre, "war");
    }

    #[test]
    fn load_samples_reports_missing_file() {
        let error = load_samples(Path::new("/nonexistent/genre/data.txt"))
            .expect_err("missing file");
        assert!(matches!(error, DatasetError::Io { .. }));
    }

    #[test]
    fn shuffle_is_deterministic_for_a_seed() {
        let samples: Vec<Sample> = (0..50).map(sample).collect();
        let first = shuffle_and_limit(samples.clone(), 1993, 50);
        let second = shuffle_and_limit(samples.clone(), 1993, 50);
        assert_eq!(first, second);
        assert_ne!(first, samples);
    }

    #[test]
    fn shuffle_truncates_to_limit() {
        let samples: Vec<Sample> = (0..10).map(sample).collect();
        assert_eq!(shuffle_and_limit(samples.clone(), 1, 3).len(), 3);
        assert_eq!(shuffle_and_limit(samples, 1, 100).len(), 10);
    }
}
