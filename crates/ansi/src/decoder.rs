//! Incremental ANSI decoder producing styled runs.

use crate::color::{Palette, Rgb};
use crate::scan::{scan_escape, Scan, ESC};
use crate::sgr::{RunStyle, SgrAttributes};

/// Upper bound on tokens (text spans and escape sequences) handled by one
/// `append` call. Anything left over is kept for the next call.
const MAX_TOKENS_PER_CALL: usize = 1 << 20;

/// A span of text drawn with a single style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub text: String,
    pub foreground: Rgb,
    pub background: Option<Rgb>,
    pub bold: bool,
    pub underline: bool,
}

impl StyledRun {
    fn new(text: &str, style: RunStyle) -> Self {
        Self {
            text: text.to_string(),
            foreground: style.foreground,
            background: style.background,
            bold: style.bold,
            underline: style.underline,
        }
    }

    /// The style this run is drawn with.
    pub fn style(&self) -> RunStyle {
        RunStyle {
            foreground: self.foreground,
            background: self.background,
            bold: self.bold,
            underline: self.underline,
        }
    }
}

/// Stateful decoder turning a chunked byte stream into [`StyledRun`]s.
///
/// Escape sequences and UTF-8 code points may be split across `append`
/// calls; the unconsumed tail is carried over, so decoding a stream in pieces
/// yields the same runs as decoding it at once. Malformed input never fails:
/// broken sequences are skipped and invalid bytes become U+FFFD.
///
/// Each session owns its own decoder; the attribute state is not shareable.
#[derive(Debug, Clone, Default)]
pub struct AnsiDecoder {
    palette: Palette,
    attrs: SgrAttributes,
    carry: Vec<u8>,
    runs: Vec<StyledRun>,
}

impl AnsiDecoder {
    /// Creates a decoder using the xterm default palette.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with a custom palette.
    pub fn with_palette(palette: Palette) -> Self {
        Self {
            palette,
            ..Self::default()
        }
    }

    /// The palette used to resolve colours.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// The attributes that apply to the next decoded text.
    pub fn attributes(&self) -> SgrAttributes {
        self.attrs
    }

    /// Every run decoded so far.
    pub fn runs(&self) -> &[StyledRun] {
        &self.runs
    }

    /// The decoded text without styling.
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Bytes held back waiting for the rest of a sequence or code point.
    pub fn pending_len(&self) -> usize {
        self.carry.len()
    }

    /// Drops the accumulated runs. Attributes and carried bytes are kept,
    /// so a clear in the middle of the stream does not lose styling.
    pub fn clear(&mut self) {
        self.runs = Vec::new();
    }

    /// Returns the decoder to its initial state.
    pub fn reset(&mut self) {
        self.clear();
        self.attrs.reset();
        self.carry.clear();
    }

    /// Decodes `bytes` and returns the runs produced by this call.
    ///
    /// The returned runs are also folded into [`runs`](Self::runs), merging
    /// with the previous last run when the two render identically.
    pub fn append(&mut self, bytes: &[u8]) -> Vec<StyledRun> {
        let mut input = std::mem::take(&mut self.carry);
        input.extend_from_slice(bytes);

        let mut builder = RunBuilder::new(self.runs.last().map(StyledRun::style));
        let mut pending = String::new();
        let mut pos = 0;
        let mut tokens = 0;

        while pos < input.len() {
            if tokens == MAX_TOKENS_PER_CALL {
                tracing::warn!(
                    remaining = input.len() - pos,
                    "Decoder token limit reached, deferring remaining input"
                );
                break;
            }
            tokens += 1;

            if input[pos] == ESC {
                match scan_escape(&input[pos..]) {
                    Scan::Complete { len, escape } => {
                        if let Some(params) = escape.sgr_params() {
                            builder.push(&pending, self.attrs.style(&self.palette));
                            pending.clear();
                            self.attrs.apply(params, &self.palette);
                        }
                        pos += len;
                    }
                    Scan::Incomplete => break,
                    Scan::Malformed { len } => pos += len,
                }
                continue;
            }

            let end = input[pos..]
                .iter()
                .position(|&b| b == ESC)
                .map_or(input.len(), |offset| pos + offset);
            let at_input_end = end == input.len();
            let consumed = decode_text(&input[pos..end], at_input_end, &mut pending);
            pos += consumed;
            if pos < end {
                // A code point is split at the end of the input.
                break;
            }
        }

        builder.push(&pending, self.attrs.style(&self.palette));
        self.carry = input.split_off(pos);

        for run in &builder.runs {
            match self.runs.last_mut() {
                Some(last) if last.style() == run.style() => last.text.push_str(&run.text),
                _ => self.runs.push(run.clone()),
            }
        }
        builder.runs
    }
}

/// Collects runs, coalescing text that renders identically.
struct RunBuilder {
    runs: Vec<StyledRun>,
    last: Option<RunStyle>,
}

impl RunBuilder {
    fn new(last: Option<RunStyle>) -> Self {
        Self {
            runs: Vec::new(),
            last,
        }
    }

    fn push(&mut self, text: &str, style: RunStyle) {
        if text.is_empty() {
            return;
        }

        // Leading whitespace joins the previous run when neither style paints
        // a background or underline: it looks the same either way.
        let mut rest = text;
        if let Some(last) = self.last {
            if last != style && last.is_blank_neutral() && style.is_blank_neutral() {
                let split = text
                    .char_indices()
                    .find(|(_, c)| !c.is_whitespace())
                    .map_or(text.len(), |(i, _)| i);
                let (lead, tail) = text.split_at(split);
                self.push_styled(lead, last);
                rest = tail;
            }
        }
        self.push_styled(rest, style);
    }

    fn push_styled(&mut self, text: &str, style: RunStyle) {
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(run) if run.style() == style => run.text.push_str(text),
            _ => self.runs.push(StyledRun::new(text, style)),
        }
        self.last = Some(style);
    }
}

/// Decodes UTF-8 text into `out`, dropping control characters other than
/// newline, carriage return and tab. Returns the number of bytes consumed,
/// which is less than `bytes.len()` only when a code point is cut off at the
/// end of the input.
fn decode_text(bytes: &[u8], at_input_end: bool, out: &mut String) -> usize {
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(text) => {
                push_printable(text, out);
                return bytes.len();
            }
            Err(e) => {
                let valid = e.valid_up_to();
                push_printable(std::str::from_utf8(&rest[..valid]).unwrap_or_default(), out);
                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &rest[valid + bad..];
                    }
                    None if at_input_end => {
                        return bytes.len() - (rest.len() - valid);
                    }
                    None => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        return bytes.len();
                    }
                }
            }
        }
    }
}

fn push_printable(text: &str, out: &mut String) {
    out.extend(
        text.chars()
            .filter(|&c| matches!(c, '\n' | '\r' | '\t') || !c.is_control()),
    );
}
