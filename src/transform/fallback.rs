// src/transform/fallback.rs
//! Rule-based fallbacks used when the AI path is unavailable.
//!
//! Translation degrades to a bilingual vocabulary substitution; titles
//! degrade to priority-keyword extraction. Degraded output still ships —
//! publishing beats blocking on a down dependency.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default title when nothing useful can be extracted.
pub const DEFAULT_TITLE: &str = "أخبار سورية";

/// Arabic → English substitution pairs, multi-word phrases first so they
/// win over their constituent words.
static VOCABULARY: &[(&str, &str)] = &[
    ("خبر عاجل", "Breaking News"),
    ("آخر الأخبار", "Latest News"),
    ("ريف دمشق", "Damascus countryside"),
    ("ريف حلب", "Aleppo countryside"),
    ("ريف حمص", "Homs countryside"),
    ("ريف إدلب", "Idlib countryside"),
    ("دير الزور", "Deir ez-Zor"),
    ("تشير التقارير", "reports indicate"),
    ("أفادت مصادر", "sources reported"),
    ("حسب المصادر", "according to sources"),
    ("عاجل", "Breaking"),
    ("انفجار", "explosion"),
    ("قصف", "bombing"),
    ("اشتباكات", "clashes"),
    ("هجوم", "attack"),
    ("غارة", "airstrike"),
    ("قتل", "killed"),
    ("جرح", "wounded"),
    ("إصابات", "casualties"),
    ("ضحايا", "victims"),
    ("شهداء", "martyrs"),
    ("مقتل", "death of"),
    ("دمشق", "Damascus"),
    ("حلب", "Aleppo"),
    ("حمص", "Homs"),
    ("حماة", "Hama"),
    ("إدلب", "Idlib"),
    ("درعا", "Daraa"),
    ("اللاذقية", "Latakia"),
    ("طرطوس", "Tartus"),
    ("الرقة", "Raqqa"),
    ("القامشلي", "Qamishli"),
    ("الحسكة", "Hasakah"),
    ("السويداء", "Sweida"),
    ("القنيطرة", "Quneitra"),
    ("محافظة", "governorate"),
    ("مدينة", "city"),
    ("قرية", "village"),
    ("بلدة", "town"),
    ("منطقة", "area"),
    ("حي", "neighborhood"),
    ("شمال", "north"),
    ("جنوب", "south"),
    ("شرق", "east"),
    ("غرب", "west"),
    ("وسط", "center"),
    ("الجيش", "army"),
    ("القوات", "forces"),
    ("الشرطة", "police"),
    ("الأمن", "security"),
    ("المعارضة", "opposition"),
    ("النظام", "regime"),
    ("اليوم", "today"),
    ("أمس", "yesterday"),
    ("الآن", "now"),
    ("صباح", "morning"),
    ("مساء", "evening"),
    ("فجر", "dawn"),
];

/// Event/place words promoted to the front of extracted titles.
static PRIORITY_WORDS: &[&str] = &[
    "عاجل", "انفجار", "قصف", "غارة", "اشتباكات", "هجوم", "دمشق", "حلب", "حمص", "إدلب", "درعا",
];

static STOP_WORDS: &[&str] = &[
    "في", "من", "إلى", "على", "عن", "مع", "بعد", "قبل", "أن", "التوقيت", "الموقع", "الساعة",
];

static RE_NON_ARABIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{Arabic}\s]").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace whole-word occurrences of `from` with `to`. Plain
/// `str::replace` would rewrite fragments inside longer Arabic words.
fn replace_word(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(from) {
        let end = idx + from.len();
        out.push_str(&rest[..idx]);
        let before_ok = out.chars().last().map_or(true, |c| !is_word_char(c));
        let after_ok = rest[end..].chars().next().map_or(true, |c| !is_word_char(c));
        if before_ok && after_ok {
            out.push_str(to);
        } else {
            out.push_str(from);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// Vocabulary-substitution translation of Arabic text.
pub fn translate(text: &str) -> String {
    let mut out = text.to_string();
    for (arabic, english) in VOCABULARY {
        out = replace_word(&out, arabic, english);
    }
    out
}

/// Extract a 3–6 word Arabic title: priority keywords first, then other
/// meaningful words, skipping stop words.
pub fn extract_title(text: &str) -> String {
    let arabic_only = RE_NON_ARABIC.replace_all(text, " ");
    let cleaned = RE_WS.replace_all(&arabic_only, " ");
    let words: Vec<&str> = cleaned.split_whitespace().collect();

    let mut picked: Vec<&str> = Vec::new();
    for &w in &words {
        if PRIORITY_WORDS.contains(&w) && !picked.contains(&w) {
            picked.push(w);
        }
    }
    for &w in &words {
        if picked.len() >= 6 {
            break;
        }
        if w.chars().count() > 2 && !STOP_WORDS.contains(&w) && !picked.contains(&w) {
            picked.push(w);
        }
    }
    // Pad from remaining words if still too short.
    if picked.len() < 3 {
        for &w in &words {
            if picked.len() >= 3 {
                break;
            }
            if !STOP_WORDS.contains(&w) && !picked.contains(&w) {
                picked.push(w);
            }
        }
    }

    if picked.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        picked[..picked.len().min(6)].join(" ")
    }
}
