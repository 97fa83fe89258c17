//! Escape sequence recognition shared by the decoder and the stripper.

pub(crate) const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Longest CSI sequence accepted before it is treated as malformed.
const MAX_CSI_LEN: usize = 512;

/// Longest string sequence (OSC, DCS, ...) accepted before it is treated as
/// malformed.
pub(crate) const MAX_STRING_LEN: usize = 8 * 1024;

/// A fully recognised escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Escape<'a> {
    /// `ESC [` parameters, intermediates and a final byte.
    Csi {
        params: &'a [u8],
        intermediates: &'a [u8],
        final_byte: u8,
    },
    /// OSC/DCS/SOS/PM/APC, terminated by BEL or `ESC \`.
    String,
    /// Any other escape (`ESC (B`, `ESC =`, `ESC 7`, ...).
    Other,
}

impl Escape<'_> {
    /// The parameter bytes if this is an SGR sequence.
    pub(crate) fn sgr_params(&self) -> Option<&[u8]> {
        match self {
            Escape::Csi {
                params,
                intermediates,
                final_byte: b'm',
            } if intermediates.is_empty() && !has_private_marker(params) => Some(*params),
            _ => None,
        }
    }
}

fn has_private_marker(params: &[u8]) -> bool {
    matches!(params.first(), Some(b'<' | b'=' | b'>' | b'?'))
}

/// Result of scanning at an `ESC` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan<'a> {
    /// A sequence of `len` bytes was recognised.
    Complete { len: usize, escape: Escape<'a> },
    /// The input ends before the sequence does.
    Incomplete,
    /// The first `len` bytes are a broken sequence and should be skipped.
    Malformed { len: usize },
}

/// Scans the escape sequence starting at `input[0]`, which must be `ESC`.
pub(crate) fn scan_escape(input: &[u8]) -> Scan<'_> {
    debug_assert_eq!(input.first(), Some(&ESC));

    let Some(&kind) = input.get(1) else {
        return Scan::Incomplete;
    };

    match kind {
        b'[' => scan_csi(input),
        b']' | b'P' | b'X' | b'^' | b'_' => scan_string(input),
        _ => scan_other(input),
    }
}

fn scan_csi(input: &[u8]) -> Scan<'_> {
    let start = 2;
    let mut i = start;

    while i < input.len() && i <= MAX_CSI_LEN && (0x30..=0x3f).contains(&input[i]) {
        i += 1;
    }
    let params_end = i;

    while i < input.len() && i <= MAX_CSI_LEN && (0x20..=0x2f).contains(&input[i]) {
        i += 1;
    }
    let intermediates_end = i;

    if i > MAX_CSI_LEN {
        return Scan::Malformed { len: i };
    }

    match input.get(i) {
        None => Scan::Incomplete,
        Some(&b) if (0x40..=0x7e).contains(&b) => Scan::Complete {
            len: i + 1,
            escape: Escape::Csi {
                params: &input[start..params_end],
                intermediates: &input[params_end..intermediates_end],
                final_byte: b,
            },
        },
        // The offending byte is left for the caller to handle as text.
        Some(_) => Scan::Malformed { len: i },
    }
}

fn scan_string(input: &[u8]) -> Scan<'_> {
    let mut i = 2;
    while i < input.len() {
        if i > MAX_STRING_LEN {
            return Scan::Malformed { len: i };
        }
        match input[i] {
            BEL => {
                return Scan::Complete {
                    len: i + 1,
                    escape: Escape::String,
                }
            }
            ESC => {
                return match input.get(i + 1) {
                    None => Scan::Incomplete,
                    Some(b'\\') => Scan::Complete {
                        len: i + 2,
                        escape: Escape::String,
                    },
                    // A new escape aborts the string.
                    Some(_) => Scan::Malformed { len: i },
                };
            }
            _ => i += 1,
        }
    }
    Scan::Incomplete
}

fn scan_other(input: &[u8]) -> Scan<'_> {
    let mut i = 1;
    while i < input.len() && (0x20..=0x2f).contains(&input[i]) {
        i += 1;
    }

    match input.get(i) {
        None => Scan::Incomplete,
        Some(&b) if (0x30..=0x7e).contains(&b) => Scan::Complete {
            len: i + 1,
            escape: Escape::Other,
        },
        Some(_) => Scan::Malformed { len: i },
    }
}
