use regex::Regex;
use std::sync::LazyLock;

/// Last-resort search term when neither the model reply nor the user text
/// yields anything usable.
pub const DEFAULT_KEYWORD: &str = "DIY用品";

/// Cap on keywords derived verbatim from user text.
const FALLBACK_MAX_CHARS: usize = 20;

/// Spans quoted in corner brackets, double quotes, or square brackets —
/// the conventions the completion prompt asks the model to use.
static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"「(.+?)」|"(.+?)"|\[(.+?)\]"#).expect("Failed to compile bracketed span regex")
});

/// An explicit labeled field, e.g. `検索キーワード: 水性塗料`.
static LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:検索キーワード|search keyword)\s*[:：]\s*(.+)")
        .expect("Failed to compile labeled field regex")
});

/// Product-category vocabulary checked by containment. More specific terms
/// come first so they win over their substrings (水性塗料 before 塗料).
const VOCABULARY: &[&str] = &[
    "水性塗料",
    "油性塗料",
    "電動ドリル",
    "マスキングテープ",
    "防水シート",
    "突っ張り棒",
    "壁紙シール",
    "塗料",
    "ペンキ",
    "壁紙",
    "接着剤",
    "ドライバー",
    "のこぎり",
    "やすり",
    "ニス",
    "蝶番",
    "ネジ",
    "工具",
    "収納棚",
    "カーテン",
];

/// Derive a short search term from `source` (typically the model reply),
/// falling back to `fallback` (the raw user text). The result is always
/// non-empty: rules are tried in order and a whitespace-only match falls
/// through to the next rule.
pub fn extract_keyword(source: &str, fallback: &str) -> String {
    if let Some(keyword) = bracketed_span(source) {
        return keyword;
    }
    if let Some(keyword) = labeled_field(source) {
        return keyword;
    }
    if let Some(keyword) = vocabulary_match(source) {
        return keyword;
    }
    fallback_keyword(fallback)
}

fn bracketed_span(text: &str) -> Option<String> {
    for caps in BRACKETED.captures_iter(text) {
        let span = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))?;
        let trimmed = span.as_str().trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

fn labeled_field(text: &str) -> Option<String> {
    let caps = LABELED.captures(text)?;
    let trimmed = caps.get(1)?.as_str().trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn vocabulary_match(text: &str) -> Option<String> {
    VOCABULARY
        .iter()
        .find(|term| text.contains(*term))
        .map(ToString::to_string)
}

fn fallback_keyword(fallback: &str) -> String {
    let trimmed = fallback.trim();
    if trimmed.is_empty() {
        return DEFAULT_KEYWORD.to_string();
    }
    // First whitespace-separated token; Japanese text typically has none,
    // so cap the length instead.
    let token = trimmed.split_whitespace().next().unwrap_or(trimmed);
    token.chars().take(FALLBACK_MAX_CHARS).collect()
}
