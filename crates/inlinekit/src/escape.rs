//! Escaping of text embedded in dynamically built patterns

/// Characters with special meaning inside a pattern
const SPECIAL_CHARS: &[char] = &[
    '.', '*', '+', '?', '^', '$', '{', '}', '(', ')', '|', '[', ']', '\\', '/',
];

/// Escape every pattern metacharacter in `input` with a backslash
///
/// The result matches `input` literally when compiled with [`regex::Regex`].
pub fn escape_special_chars(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + input.len() / 4);
    for c in input.chars() {
        if SPECIAL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
