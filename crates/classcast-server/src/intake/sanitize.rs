use once_cell::sync::Lazy;
use regex::Regex;

const MAX_NAME_BYTES: usize = 200;
const FALLBACK_NAME: &str = "file";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// On-disk form of a client-supplied filename.
///
/// Keeps only the last path component, drops control and reserved
/// characters, strips leading dots and turns whitespace runs into `_`.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .filter(|c| !matches!(c, '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>'))
        .collect();

    let cleaned = WHITESPACE.replace_all(cleaned.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.');

    let mut name = String::with_capacity(cleaned.len().min(MAX_NAME_BYTES));
    for c in cleaned.chars() {
        if name.len() + c.len_utf8() > MAX_NAME_BYTES {
            break;
        }
        name.push(c);
    }

    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}
