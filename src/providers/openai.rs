// src/providers/openai.rs
//! OpenAI chat-completions implementation of [`AiService`].
//!
//! One structured call per item returns title, translation, primary
//! location, and both classification flags as labelled lines that are
//! parsed with anchored regexes. Titles are clamped to 3–6 Arabic words.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{AiAnalysis, AiService, Classification};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are a translator and news analyst for Arabic-language regional news.";

const PROMPT_TEMPLATE: &str = r#"Analyze the Arabic news text below.

1. Translate it to clear, professional English. Translate every sentence
   completely; do not summarize. Remove any leftover hashtags, links,
   promotional phrases, or platform references.
2. Create a concise Arabic headline of EXACTLY 3-6 words describing the
   main event.
3. Name the primary location where the event occurred, as "City, Country".
   Use "Unknown" if no location is identifiable.
4. Decide whether the text is an advertisement or promotional content.
5. Decide whether the text is relevant regional news (as opposed to
   unrelated chatter).

Format your response EXACTLY as:

TITLE: <arabic headline, 3-6 words>
TRANSLATION: <full english translation>
LOCATION: <primary location or Unknown>
IS_AD: <true/false>
IS_RELEVANT: <true/false>"#;

static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^TITLE:\s*(.+)$").unwrap());
static RE_TRANSLATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)TRANSLATION:\s*(.*?)(?:\n(?:LOCATION|IS_AD|IS_RELEVANT):|$)").unwrap()
});
static RE_LOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^LOCATION:\s*(.+)$").unwrap());
static RE_IS_AD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^IS_AD:\s*(true|false)").unwrap());
static RE_IS_RELEVANT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^IS_RELEVANT:\s*(true|false)").unwrap());

pub struct OpenAiAnalyzer {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiAnalyzer {
    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model: model_override.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait::async_trait]
impl AiService for OpenAiAnalyzer {
    async fn analyze(&self, text: &str) -> Result<AiAnalysis> {
        if self.api_key.is_empty() {
            return Err(anyhow!("OPENAI_API_KEY not configured"));
        }
        let prompt = format!("{PROMPT_TEMPLATE}\n\nArabic text:\n{text}");
        let req = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.3,
            max_tokens: 1200,
        };
        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("openai returned {status}"));
        }
        let body: ChatResponse = resp.json().await.context("parsing openai body")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();
        Ok(parse_analysis(content))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Parse the labelled-line response. Forgiving by design: a malformed
/// response degrades to defaults rather than failing the item.
pub fn parse_analysis(raw: &str) -> AiAnalysis {
    let title = RE_TITLE
        .captures(raw)
        .map(|c| clamp_title(c[1].trim()))
        .unwrap_or_else(|| crate::transform::fallback::DEFAULT_TITLE.to_string());

    let translation = RE_TRANSLATION
        .captures(raw)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| raw.trim().to_string());

    let primary_location = RE_LOCATION
        .captures(raw)
        .map(|c| c[1].trim().trim_matches(['"', '\'']).to_string())
        .filter(|loc| {
            !loc.is_empty()
                && !matches!(
                    loc.to_lowercase().as_str(),
                    "unknown" | "unclear" | "not specified" | "n/a" | "none"
                )
        });

    let is_ad = RE_IS_AD
        .captures(raw)
        .is_some_and(|c| c[1].eq_ignore_ascii_case("true"));
    // Missing relevance line defaults to relevant.
    let is_off_topic = RE_IS_RELEVANT
        .captures(raw)
        .is_some_and(|c| c[1].eq_ignore_ascii_case("false"));

    AiAnalysis {
        title,
        translation,
        primary_location,
        classification: Classification { is_ad, is_off_topic },
    }
}

/// Enforce the 3–6 word headline contract: truncate long titles, pad short
/// ones the way an editor would.
fn clamp_title(title: &str) -> String {
    let title = title.trim_matches(['"', '\'']);
    let words: Vec<&str> = title.split_whitespace().collect();
    match words.len() {
        0 => crate::transform::fallback::DEFAULT_TITLE.to_string(),
        1 => format!("عاجل {}", words[0]),
        2 => format!("{} اليوم", words.join(" ")),
        3..=6 => words.join(" "),
        _ => words[..6].join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "TITLE: انفجار في دمشق\nTRANSLATION: An explosion was reported in Damascus this morning.\nLOCATION: Damascus, Syria\nIS_AD: false\nIS_RELEVANT: true";

    #[test]
    fn parses_well_formed_response() {
        let a = parse_analysis(SAMPLE);
        assert_eq!(a.title, "انفجار في دمشق");
        assert_eq!(
            a.translation,
            "An explosion was reported in Damascus this morning."
        );
        assert_eq!(a.primary_location.as_deref(), Some("Damascus, Syria"));
        assert!(!a.classification.is_ad);
        assert!(!a.classification.is_off_topic);
    }

    #[test]
    fn multiline_translation_stops_at_next_label() {
        let raw = "TITLE: قصف على حلب\nTRANSLATION: Line one.\nLine two.\nLOCATION: Aleppo, Syria\nIS_AD: false\nIS_RELEVANT: true";
        let a = parse_analysis(raw);
        assert_eq!(a.translation, "Line one.\nLine two.");
    }

    #[test]
    fn ad_and_irrelevant_flags() {
        let raw = "TITLE: إعلان ترويجي هنا\nTRANSLATION: Buy now.\nLOCATION: Unknown\nIS_AD: true\nIS_RELEVANT: false";
        let a = parse_analysis(raw);
        assert!(a.classification.is_ad);
        assert!(a.classification.is_off_topic);
        assert!(a.primary_location.is_none());
    }

    #[test]
    fn malformed_response_degrades_to_defaults() {
        let a = parse_analysis("something unstructured");
        assert_eq!(a.title, crate::transform::fallback::DEFAULT_TITLE);
        assert_eq!(a.translation, "something unstructured");
        assert!(!a.classification.is_ad);
        assert!(!a.classification.is_off_topic);
    }

    #[test]
    fn title_clamping() {
        assert_eq!(clamp_title("واحد"), "عاجل واحد");
        assert_eq!(clamp_title("كلمتان فقط"), "كلمتان فقط اليوم");
        assert_eq!(
            clamp_title("واحد اثنان ثلاثة أربعة خمسة ستة سبعة ثمانية"),
            "واحد اثنان ثلاثة أربعة خمسة ستة"
        );
    }
}
