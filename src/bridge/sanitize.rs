//! Lossy cleanup of LLM output for the host's string syntax
//!
//! The host scripting language chokes on markup punctuation, raw newlines
//! and unbalanced quotes, so replies are flattened before they cross the
//! bridge. Markup spans are dropped whole rather than unwrapped: once the
//! character pass has eaten the markers, a half-matched span would
//! otherwise leak its inner text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Hard cap on a sanitized reply
pub const MAX_REPLY_CHARS: usize = 10_000;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*[^*]+\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*[^*]+\*").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]+`").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").unwrap());

static QUOTE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r#""+"#).unwrap());
static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n]+").unwrap());
static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\]\\*#`{}|]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static PERIOD_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").unwrap());

/// Make `text` safe to hand back to the host. Total and idempotent.
pub fn sanitize(text: &str) -> String {
    // Markup spans go first, markers-and-all.
    let text = BOLD.replace_all(text, "");
    let text = ITALIC.replace_all(&text, "");
    let text = INLINE_CODE.replace_all(&text, "");
    let text = HEADING.replace_all(&text, "");
    let text = LINK.replace_all(&text, "");

    // Host string format. Runs of quotes collapse to one doubled quote so
    // a second pass leaves the text unchanged.
    let text = QUOTE_RUN.replace_all(&text, "\"\"");
    let text = LINE_BREAKS.replace_all(&text, " ");
    let text = UNSAFE_CHARS.replace_all(&text, "");

    let text = WHITESPACE.replace_all(&text, " ");
    let text = PERIOD_RUN.replace_all(&text, ".");

    // Truncate before trimming: a cut landing right after a space would
    // otherwise leave a trailing space for a second pass to remove.
    let text: String = text.chars().take(MAX_REPLY_CHARS).collect();
    text.trim().to_string()
}
