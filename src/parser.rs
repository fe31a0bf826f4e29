//! Free-text model output → genre label.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::genre;

/// Marker closing the instruction block of a Llama-2 chat prompt.
pub const INSTRUCTION_END_MARKER: &str = "[/INST]";

/// Prediction used when no genre word can be found.
pub const UNKNOWN_PREDICTION: &str = "";

static TOKEN_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ /\n]+").expect("compile token separator pattern"));

/// 生成テキストの回答部分を返す。マーカーが無ければ全文を回答とみなす。
#[must_use]
pub fn response_section(generated: &str) -> &str {
    generated
        .find(INSTRUCTION_END_MARKER)
        .map_or(generated, |pos| {
            &generated[pos + INSTRUCTION_END_MARKER.len()..]
        })
}

/// Extracts the first recognised genre from generated text.
///
/// The answer after [`INSTRUCTION_END_MARKER`] is lowercased and split on
/// spaces, slashes and newlines; each token is stripped of surrounding
/// whitespace and ASCII punctuation and compared against [`genre::GENRES`].
/// Returns [`UNKNOWN_PREDICTION`] when nothing matches.
#[must_use]
pub fn parse_genre(generated: &str) -> String {
    let response = response_section(generated).to_lowercase();
    TOKEN_SEPARATORS
        .split(&response)
        .map(normalize_token)
        .find(|token| genre::is_genre(token))
        .map_or_else(|| UNKNOWN_PREDICTION.to_string(), str::to_string)
}

fn normalize_token(token: &str) -> &str {
    token.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<s>[INST] Title: X [/INST] Comedy.", "comedy")]
    #[case("<s>[INST] ... [/INST] I'm not sure, maybe drama/comedy", "drama")]
    #[case("[/INST] HORROR!", "horror")]
    #[case("[/INST] \"Sci-Fi\"", "sci-fi")]
    #[case("[/INST]\nreality-tv\n", "reality-tv")]
    #[case("[/INST] Genre: (thriller), documentary;", "documentary")]
    #[case("[/INST]Western", "western")]
    fn parses_first_known_genre(#[case] generated: &str, #[case] expected: &str) {
        assert_eq!(parse_genre(generated), expected);
    }

    #[rstest]
    #[case("[/INST] I cannot classify this movie.")]
    #[case("[/INST] ")]
    #[case("")]
    #[case("[/INST] thriller")]
    fn unknown_output_yields_empty_prediction(#[case] generated: &str) {
        assert_eq!(parse_genre(generated), UNKNOWN_PREDICTION);
    }

    #[test]
    fn prompt_words_before_marker_are_ignored() {
        let generated = "[INST] Title: Drama Queen\nDescription: a comedy [/INST] horror";
        assert_eq!(parse_genre(generated), "horror");
    }

    #[test]
    fn missing_marker_uses_whole_text() {
        assert_eq!(parse_genre("Action, probably."), "action");
    }

    #[test]
    fn only_first_marker_is_used() {
        assert_eq!(parse_genre("[/INST] war [/INST] drama"), "war");
    }
}
