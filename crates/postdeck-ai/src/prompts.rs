//! Prompt construction and response parsing for caption drafting and
//! comment sentiment.

use serde::{Deserialize, Serialize};

/// Inputs for a caption draft.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptionRequest {
    pub topic: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Platform-specific length guidance baked into the caption prompt.
/// Twitter/X is the only hard cap that matters in practice.
fn platform_guidance(platform: &str) -> &'static str {
    match platform {
        "twitter" | "x" => "Keep it under 280 characters.",
        "instagram" => "Up to 3 short paragraphs is fine; lead with a hook.",
        "tiktok" => "Keep it short and punchy, one or two sentences.",
        "linkedin" => "A professional tone, up to 2 paragraphs.",
        _ => "Keep it concise, under 500 characters.",
    }
}

pub const CAPTION_SYSTEM: &str = "You are a social media copywriter. \
Write a single caption, no preamble, no surrounding quotes, no alternatives.";

/// Builds the user prompt for a caption draft.
#[must_use]
pub fn caption_prompt(req: &CaptionRequest) -> String {
    let mut prompt = format!("Write a social media caption about: {}\n", req.topic);
    if let Some(tone) = req.tone.as_deref() {
        prompt.push_str(&format!("Tone: {tone}\n"));
    }
    if let Some(platform) = req.platform.as_deref() {
        prompt.push_str(&format!(
            "Target platform: {platform}. {}\n",
            platform_guidance(platform)
        ));
    }
    if !req.hashtags.is_empty() {
        prompt.push_str(&format!(
            "Include these hashtags at the end: {}\n",
            req.hashtags.join(" ")
        ));
    }
    prompt
}

pub const SENTIMENT_SYSTEM: &str = "You classify the overall sentiment of social \
media comments. Respond with JSON only, exactly: \
{\"label\": \"positive\"|\"neutral\"|\"negative\", \"score\": <number in [-1, 1]>}";

/// Builds the user prompt for a sentiment classification over a comment batch.
#[must_use]
pub fn sentiment_prompt(comments: &[&str]) -> String {
    let mut prompt = String::from(
        "Classify the overall sentiment of the following comments on a social media post:\n\n",
    );
    for (i, comment) in comments.iter().enumerate() {
        prompt.push_str(&format!("{}. {comment}\n", i + 1));
    }
    prompt
}

/// Overall sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

/// A parsed sentiment classification.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SentimentVerdict {
    pub label: SentimentLabel,
    pub score: f32,
}

impl SentimentVerdict {
    const NEUTRAL: Self = Self {
        label: SentimentLabel::Neutral,
        score: 0.0,
    };
}

#[derive(Deserialize)]
struct RawVerdict {
    label: String,
    #[serde(default)]
    score: Option<f32>,
}

/// Parses the model's sentiment response.
///
/// Models wrap JSON in code fences or prose often enough that strict parsing
/// is a losing game: this scans for the first `{...}` object, accepts a
/// missing score, and falls back to neutral when nothing parseable is found.
/// The score is clamped to `[-1, 1]`.
#[must_use]
pub fn parse_sentiment(response: &str) -> SentimentVerdict {
    let Some(json) = extract_json_object(response) else {
        return SentimentVerdict::NEUTRAL;
    };
    let Ok(raw) = serde_json::from_str::<RawVerdict>(json) else {
        return SentimentVerdict::NEUTRAL;
    };
    let label = match raw.label.trim().to_lowercase().as_str() {
        "positive" => SentimentLabel::Positive,
        "negative" => SentimentLabel::Negative,
        "neutral" => SentimentLabel::Neutral,
        _ => return SentimentVerdict::NEUTRAL,
    };
    let score = raw
        .score
        .unwrap_or(match label {
            SentimentLabel::Positive => 0.5,
            SentimentLabel::Neutral => 0.0,
            SentimentLabel::Negative => -0.5,
        })
        .clamp(-1.0, 1.0);
    SentimentVerdict { label, score }
}

/// Returns the slice spanning the first balanced `{...}` in `text`, if any.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_prompt_includes_all_parts() {
        let req = CaptionRequest {
            topic: "new cold brew launch".to_owned(),
            tone: Some("playful".to_owned()),
            platform: Some("twitter".to_owned()),
            hashtags: vec!["#coldbrew".to_owned(), "#coffee".to_owned()],
        };
        let prompt = caption_prompt(&req);
        assert!(prompt.contains("new cold brew launch"));
        assert!(prompt.contains("Tone: playful"));
        assert!(prompt.contains("280 characters"));
        assert!(prompt.contains("#coldbrew #coffee"));
    }

    #[test]
    fn caption_prompt_omits_absent_parts() {
        let req = CaptionRequest {
            topic: "weekly special".to_owned(),
            tone: None,
            platform: None,
            hashtags: vec![],
        };
        let prompt = caption_prompt(&req);
        assert!(prompt.contains("weekly special"));
        assert!(!prompt.contains("Tone:"));
        assert!(!prompt.contains("hashtags"));
    }

    #[test]
    fn sentiment_prompt_numbers_comments() {
        let prompt = sentiment_prompt(&["love it", "not for me"]);
        assert!(prompt.contains("1. love it"));
        assert!(prompt.contains("2. not for me"));
    }

    #[test]
    fn parses_clean_json() {
        let v = parse_sentiment(r#"{"label": "positive", "score": 0.8}"#);
        assert_eq!(v.label, SentimentLabel::Positive);
        assert!((v.score - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn parses_json_inside_code_fence() {
        let v = parse_sentiment("```json\n{\"label\": \"negative\", \"score\": -0.6}\n```");
        assert_eq!(v.label, SentimentLabel::Negative);
        assert!((v.score + 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_score_defaults_by_label() {
        let v = parse_sentiment(r#"{"label": "negative"}"#);
        assert_eq!(v.label, SentimentLabel::Negative);
        assert!((v.score + 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_range_score_is_clamped() {
        let v = parse_sentiment(r#"{"label": "positive", "score": 3.5}"#);
        assert!((v.score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unknown_label_falls_back_to_neutral() {
        let v = parse_sentiment(r#"{"label": "ecstatic", "score": 0.9}"#);
        assert_eq!(v.label, SentimentLabel::Neutral);
        assert!(v.score.abs() < f32::EPSILON);
    }

    #[test]
    fn garbage_falls_back_to_neutral() {
        let v = parse_sentiment("The sentiment is mostly positive, I think.");
        assert_eq!(v.label, SentimentLabel::Neutral);
        assert!(v.score.abs() < f32::EPSILON);
    }

    #[test]
    fn empty_input_falls_back_to_neutral() {
        let v = parse_sentiment("");
        assert_eq!(v.label, SentimentLabel::Neutral);
    }
}
