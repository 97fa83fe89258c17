//! Select Graphic Rendition state.

use crate::color::{Palette, Rgb};

/// Rendering attributes accumulated from SGR sequences.
///
/// Colours are stored as set by the stream (`None` means "default"); reverse
/// video is applied only when a run's style is computed, so a later reset or
/// `27` restores the original colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SgrAttributes {
    pub foreground: Option<Rgb>,
    pub background: Option<Rgb>,
    pub bold: bool,
    pub underline: bool,
    pub reverse: bool,
}

/// The resolved style of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStyle {
    pub foreground: Rgb,
    pub background: Option<Rgb>,
    pub bold: bool,
    pub underline: bool,
}

impl RunStyle {
    /// True when whitespace drawn in this style looks the same as whitespace
    /// drawn in any other style with the same property.
    pub(crate) fn is_blank_neutral(&self) -> bool {
        self.background.is_none() && !self.underline
    }
}

impl SgrAttributes {
    /// Restores default colours and clears every flag.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Resolves the attributes into a concrete run style.
    pub fn style(&self, palette: &Palette) -> RunStyle {
        let fg = self.foreground.unwrap_or(palette.foreground);
        let (foreground, background) = if self.reverse {
            (self.background.unwrap_or(palette.background), Some(fg))
        } else {
            (fg, self.background)
        };

        RunStyle {
            foreground,
            background,
            bold: self.bold,
            underline: self.underline,
        }
    }

    /// Applies the parameter bytes of a CSI `m` sequence.
    ///
    /// An empty parameter list is a reset. Unknown codes and malformed
    /// extended-colour parameters are ignored.
    pub fn apply(&mut self, params: &[u8], palette: &Palette) {
        let groups = parse_groups(params);
        if groups.is_empty() {
            self.reset();
            return;
        }

        let mut i = 0;
        while i < groups.len() {
            let group = &groups[i];
            let code = group[0];
            i += 1;

            match code {
                0 => self.reset(),
                1 => self.bold = true,
                22 => self.bold = false,
                4 => self.underline = true,
                24 => self.underline = false,
                7 => self.reverse = true,
                27 => self.reverse = false,
                30..=37 => self.foreground = Some(palette.ansi[(code - 30) as usize]),
                39 => self.foreground = None,
                40..=47 => self.background = Some(palette.ansi[(code - 40) as usize]),
                49 => self.background = None,
                90..=97 => self.foreground = Some(palette.ansi[(code - 90 + 8) as usize]),
                100..=107 => self.background = Some(palette.ansi[(code - 100 + 8) as usize]),
                38 | 48 => {
                    let color = if group.len() > 1 {
                        extended_from_subparams(&group[1..], palette)
                    } else {
                        let (color, used) = extended_from_params(&groups[i..], palette);
                        i += used;
                        color
                    };
                    if let Some(color) = color {
                        if code == 38 {
                            self.foreground = Some(color);
                        } else {
                            self.background = Some(color);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Splits SGR parameters on `;` into groups of `:`-separated sub-parameters.
/// Empty fields read as zero; oversized values saturate.
fn parse_groups(params: &[u8]) -> Vec<Vec<u16>> {
    if params.is_empty() {
        return Vec::new();
    }

    params
        .split(|&b| b == b';')
        .map(|group| group.split(|&b| b == b':').map(parse_number).collect())
        .collect()
}

fn parse_number(field: &[u8]) -> u16 {
    field
        .iter()
        .filter(|b| b.is_ascii_digit())
        .fold(0u16, |acc, b| acc.saturating_mul(10).saturating_add((b - b'0') as u16))
}

/// `38;5;n` / `38;2;r;g;b` form. Returns the colour and how many following
/// groups were consumed.
fn extended_from_params(rest: &[Vec<u16>], palette: &Palette) -> (Option<Rgb>, usize) {
    let Some(kind) = rest.first().map(|g| g[0]) else {
        return (None, 0);
    };

    match kind {
        5 => match rest.get(1) {
            Some(g) => (to_u8(g[0]).map(|n| palette.indexed(n)), 2),
            None => (None, 1),
        },
        2 => {
            if rest.len() < 4 {
                return (None, rest.len());
            }
            let rgb = rgb_from(rest[1][0], rest[2][0], rest[3][0]);
            (rgb, 4)
        }
        _ => (None, 1),
    }
}

/// `38:5:n` / `38:2:[cs]:r:g:b` form.
fn extended_from_subparams(sub: &[u16], palette: &Palette) -> Option<Rgb> {
    match sub.first()? {
        5 => to_u8(*sub.get(1)?).map(|n| palette.indexed(n)),
        2 => {
            let channels = if sub.len() >= 5 { &sub[sub.len() - 3..] } else { &sub[1..] };
            if channels.len() < 3 {
                return None;
            }
            rgb_from(channels[0], channels[1], channels[2])
        }
        _ => None,
    }
}

fn rgb_from(r: u16, g: u16, b: u16) -> Option<Rgb> {
    Some(Rgb::new(to_u8(r)?, to_u8(g)?, to_u8(b)?))
}

fn to_u8(v: u16) -> Option<u8> {
    u8::try_from(v).ok()
}
