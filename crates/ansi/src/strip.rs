//! Escape-free plain text for search and copy.

use crate::scan::{scan_escape, Scan, ESC};

/// Removes every recognised escape sequence and normalises line endings.
///
/// `\r\n` and lone `\r` both become `\n`. Control characters other than
/// newline and tab are dropped, invalid UTF-8 becomes U+FFFD, and an
/// unterminated trailing sequence is dropped.
pub fn strip_ansi(input: &[u8]) -> String {
    let mut text = Vec::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        if input[pos] == ESC {
            match scan_escape(&input[pos..]) {
                Scan::Complete { len, .. } | Scan::Malformed { len } => pos += len,
                Scan::Incomplete => break,
            }
            continue;
        }

        let end = input[pos..]
            .iter()
            .position(|&b| b == ESC)
            .map_or(input.len(), |offset| pos + offset);
        text.extend_from_slice(&input[pos..end]);
        pos = end;
    }

    normalize(&String::from_utf8_lossy(&text))
}

fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\n' | '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
