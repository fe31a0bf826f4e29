//! Chat prompt construction for the genre classifier.
use crate::dataset::Sample;
use crate::genre::GENRES;

const SYSTEM_PROMPT: &str = concat!(
    "You are a classification robot. Your job is to provide genres for movies based on their titles and descriptions.",
    "The user will provide you with a title and a description, and you should simply provide a genre that fits the movie. Do not include any text other than the genre.",
);

/// Models whose identifier contains this marker were fine-tuned with the
/// genre list appended to the system prompt.
const GENRE_LIST_MODEL_MARKER: &str = "list";

/// Builds Llama-2 chat prompts matching the fine-tuning format.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
}

impl PromptBuilder {
    /// モデル識別子からシステムプロンプトを決定する。
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        let mut system = SYSTEM_PROMPT.to_string();
        if model.contains(GENRE_LIST_MODEL_MARKER) {
            system.push_str("The genre classes are: ");
            system.push_str(&GENRES.join(", "));
            system.push('.');
        }
        Self { system }
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system
    }

    /// Formats a single user turn into the chat template.
    #[must_use]
    pub fn render(&self, user: &str) -> String {
        format!(
            "<s>[INST] <<SYS>>\n{}\n<</SYS>>\n\n{} [/INST]",
            self.system, user
        )
    }

    #[must_use]
    pub fn render_sample(&self, sample: &Sample) -> String {
        self.render(&sample.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{INSTRUCTION_END_MARKER, parse_genre};

    #[test]
    fn default_model_omits_genre_list() {
        let builder = PromptBuilder::for_model("./models/genre-llama-demo");
        assert!(!builder.system_prompt().contains("The genre classes are"));
        assert!(builder.system_prompt().ends_with("other than the genre."));
    }

    #[test]
    fn list_model_appends_genre_list() {
        let builder = PromptBuilder::for_model("./models/genre-llama-list");
        assert!(
            builder
                .system_prompt()
                .ends_with("The genre classes are: sport, news, game-show, horror, fantasy, western, romance, family, adult, documentary, drama, war, action, history, musical, reality-tv, talk-show, crime, comedy, animation, short, sci-fi, biography, music, adventure, mystery.")
        );
    }

    #[test]
    fn rendered_prompt_ends_with_instruction_marker() {
        let builder = PromptBuilder::for_model("demo");
        let sample = Sample {
            title: "Drama Club".to_string(),
            description: "A comedy about a drama club.".to_string(),
            genre: "comedy".to_string(),
        };
        let prompt = builder.render_sample(&sample);
        assert!(prompt.starts_with("<s>[INST] <<SYS>>\n"));
        assert!(prompt.ends_with(INSTRUCTION_END_MARKER));
        assert!(prompt.contains("Title: Drama Club\nDescription: A comedy about a drama club."));
        // 回答が空なら、プロンプト中のジャンル語は拾わない
        assert_eq!(parse_genre(&prompt), "");
    }
}
