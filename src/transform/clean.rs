// src/transform/clean.rs
//! Text cleaning pipeline for raw feed posts.
//!
//! Fixed step order: source attributions (Arabic and English) → platform
//! forward/subscribe artifacts → URLs and channel links → hashtags → media
//! reference codes → emoji/pictographs → whitespace collapse. Every step
//! is pure text→text and the whole pipeline is idempotent.
//!
//! If the result drops below [`MIN_CLEANED_LEN`], the cleaning is redone on
//! the *original* text with only URL + hashtag removal, so short legitimate
//! posts are not discarded by over-aggressive cleaning.

use once_cell::sync::Lazy;
use regex::Regex;

/// Cleaned text shorter than this triggers the minimal redo.
pub const MIN_CLEANED_LEN: usize = 10;

static RE_SOURCES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Arabic attribution lines: "المصدر: ...", "نقلاً عن ...", etc.
        Regex::new(r"(?m)^\s*(?:المصدر|مصدر|نقلا عن|نقلاً عن|بحسب|حسب|وفقا ل|وفقاً ل|المرجع)\s*:?.*$")
            .unwrap(),
        Regex::new(r"(?m)(?:قناة|شبكة|وكالة|موقع|صفحة)\s+[\p{Arabic}][\p{Arabic}\s]*").unwrap(),
        // English attribution lines.
        Regex::new(r"(?mi)^\s*(?:source|via|from|credit)\s*:.*$").unwrap(),
        Regex::new(r"(?mi)(?:according\s+to|reported\s+by|courtesy\s+of)\b.*$").unwrap(),
        // @mentions.
        Regex::new(r"@\w+").unwrap(),
    ]
});

static RE_FORWARDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?mi)^\s*forwarded\s+from\b.*$").unwrap(),
        Regex::new(r"(?m)محول من.*$").unwrap(),
        Regex::new(r"(?mi)^\s*join\b.*channel.*$").unwrap(),
        Regex::new(r"(?m)انضم.*قناة.*$").unwrap(),
        Regex::new(r"(?mi)^\s*subscribe\b.*$").unwrap(),
        Regex::new(r"(?m)^\s*اشترك.*$").unwrap(),
    ]
});

static RE_URLS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)https?://\S+").unwrap(),
        Regex::new(r"(?i)\b(?:t|telegram)\.me/\S+").unwrap(),
        Regex::new(r"(?i)\b[\w-]+\.(?:com|org|net|gov|edu|info|co|me|tv|news)\b").unwrap(),
    ]
});

static RE_HASHTAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[\p{L}\p{N}_]+").unwrap());

static RE_MEDIA_REFS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Platform media codes trailing a line, e.g. "-16DSuWU". Must be
        // preceded by whitespace so hyphenated words are left alone.
        Regex::new(r"(?m)(?:^|\s)-[A-Za-z0-9]{6,}$").unwrap(),
        Regex::new(r"(?i)\b(?:video|media|clip|فيديو|مقطع)[\s:]+[A-Za-z0-9_-]{6,}").unwrap(),
    ]
});

static RE_EMOJI: Lazy<Regex> = Lazy::new(|| {
    // Pictograph blocks plus stray arrows/bullets/checkmarks that show up
    // as formatting artifacts in feed posts.
    Regex::new(concat!(
        "[",
        "\u{1F300}-\u{1FAFF}",
        "\u{2600}-\u{27BF}",
        "\u{2B00}-\u{2BFF}",
        "\u{2190}-\u{21FF}",
        "\u{FE0F}\u{200D}",
        "\u{25AA}\u{25AB}\u{2022}\u{25E6}\u{2023}\u{2043}",
        "]+",
    ))
    .unwrap()
});

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

fn strip_all(text: &str, patterns: &[Regex]) -> String {
    let mut out = text.to_string();
    for re in patterns {
        out = re.replace_all(&out, "").into_owned();
    }
    out
}

pub fn strip_sources(text: &str) -> String {
    strip_all(text, &RE_SOURCES)
}

pub fn strip_forward_artifacts(text: &str) -> String {
    strip_all(text, &RE_FORWARDS)
}

pub fn strip_urls(text: &str) -> String {
    strip_all(text, &RE_URLS)
}

pub fn strip_hashtags(text: &str) -> String {
    RE_HASHTAGS.replace_all(text, "").into_owned()
}

pub fn strip_media_refs(text: &str) -> String {
    strip_all(text, &RE_MEDIA_REFS)
}

pub fn strip_emoji(text: &str) -> String {
    RE_EMOJI.replace_all(text, "").into_owned()
}

/// Collapse runs of spaces, trim each line, and drop empty lines.
pub fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| RE_SPACES.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the full cleaning pipeline.
pub fn clean_content(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let mut out = strip_sources(text);
    out = strip_forward_artifacts(&out);
    out = strip_urls(&out);
    out = strip_hashtags(&out);
    out = strip_media_refs(&out);
    out = strip_emoji(&out);
    let out = collapse_whitespace(&out);

    if out.chars().count() < MIN_CLEANED_LEN {
        // Over-aggressive cleaning on a short post; keep the content and
        // only drop links and hashtags.
        let minimal = strip_hashtags(&strip_urls(text));
        return collapse_whitespace(&minimal);
    }
    out
}
