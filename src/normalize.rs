use regex::Regex;
use std::sync::OnceLock;

/// Replacement for every ISO timestamp found in tool output.
pub const TIMESTAMP_PLACEHOLDER: &str = "x";

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 2014-11-18T21:32:39.000Z
    RE.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z").expect("timestamp regex")
    })
}

fn line_ending_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r+\n").expect("line ending regex"))
}

/// Canonical form of captured output: timestamps, line endings, path
/// separators and surrounding whitespace no longer depend on the host.
pub fn normalize(text: &str) -> String {
    let text = timestamp_regex().replace_all(text, TIMESTAMP_PLACEHOLDER);
    let text = line_ending_regex().replace_all(&text, "\n");
    let text = text.replace('\\', "/");
    text.trim().to_string()
}
