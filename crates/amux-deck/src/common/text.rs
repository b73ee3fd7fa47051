//! Text helpers for one-line summaries.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Truncates a string to `max_width` display columns, unicode-aware.
///
/// Wide characters (CJK, emoji) count by their terminal width. The result
/// ends with an ellipsis when anything was cut.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width <= 1 {
        return "…".to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Collapses a multi-line string onto one line for summary display.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
