/// Average words carried by one model token.
pub const WORDS_PER_TOKEN: f64 = 0.75;

/// Counts whitespace-separated words.
#[inline]
#[must_use]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimates the token length of a text with `words` words: `ceil(words / 0.75)`.
///
/// Computed in integers as `ceil(4 * words / 3)` so exact multiples never round up.
#[inline]
#[must_use]
pub const fn estimate_tokens(words: usize) -> usize {
    words.saturating_mul(4).saturating_add(2) / 3
}

/// Formats a count with thousands separators ("12345" → "12,345").
#[must_use]
pub fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
