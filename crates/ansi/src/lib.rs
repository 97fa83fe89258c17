//! # sshterm ANSI decoding
//!
//! This crate turns the raw output of a remote shell into styled text.
//!
//! ## Overview
//!
//! - **Decoder**: [`AnsiDecoder`] is an incremental, chunk-safe decoder that
//!   applies SGR (colour/style) sequences and yields [`StyledRun`]s
//! - **Attributes**: [`SgrAttributes`] accumulates bold, underline, reverse
//!   and colours across calls
//! - **Colours**: [`Palette`] and the xterm 256-colour mapping
//! - **Stripping**: [`strip_ansi`] produces plain text for search and copy
//!
//! Only colour and style are interpreted. Cursor movement, erase and mode
//! sequences are recognised and discarded, so the output is a linear,
//! append-only transcript rather than a screen.
//!
//! ## Example Usage
//!
//! ```rust
//! use ansi::AnsiDecoder;
//!
//! let mut decoder = AnsiDecoder::new();
//! decoder.append(b"\x1b[3");
//! decoder.append(b"1mHi");
//!
//! let runs = decoder.runs();
//! assert_eq!(runs.len(), 1);
//! assert_eq!(runs[0].text, "Hi");
//! ```

pub mod color;
pub mod decoder;
mod scan;
pub mod sgr;
pub mod strip;

pub use color::{Palette, Rgb, XTERM_ANSI_COLORS};
pub use decoder::{AnsiDecoder, StyledRun};
pub use sgr::{RunStyle, SgrAttributes};
pub use strip::strip_ansi;
