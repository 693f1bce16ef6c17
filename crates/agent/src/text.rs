//! Small text helpers shared by the prompt builder and the dispatcher.

/// Truncate `s` to at most `max_chars` characters, never splitting a
/// UTF-8 code point. Returns the input unchanged when it already fits.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Like [`truncate_chars`], appending `...` when something was cut.
pub fn ellipsize(s: &str, max_chars: usize) -> String {
    let cut = truncate_chars(s, max_chars);
    if cut.len() < s.len() {
        format!("{cut}...")
    } else {
        s.to_string()
    }
}
