//! Char-aware shortening of page text for log fields.
//!
//! Every function returns the input unchanged when it already fits in `max`
//! chars; otherwise the result is exactly `max` chars, one of them `…`.

const MARK: char = '…';

/// Keeps the head: `"abcdefgh"` -> `"abcd…"`.
pub fn ending(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let mut out: String = s.chars().take(max - 1).collect();
    out.push(MARK);
    out
}

/// Keeps the tail: `"abcdefgh"` -> `"…efgh"`.
pub fn starting(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let mut out = String::from(MARK);
    out.extend(s.chars().skip(count - (max - 1)));
    out
}

/// Keeps both ends, the head getting the extra char on odd splits:
/// `"abcdefgh"` -> `"abc…gh"` for `max == 6`.
pub fn centering(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let keep = max - 1;
    let head = keep.div_ceil(2);
    let tail = keep / 2;

    let mut out: String = s.chars().take(head).collect();
    out.push(MARK);
    out.extend(s.chars().skip(count - tail));
    out
}
