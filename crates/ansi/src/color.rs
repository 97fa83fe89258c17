//! Colour types and the xterm 256-colour mapping.

/// A 24-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Creates a colour from its components.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// xterm's default 16-colour table: 8 standard colours followed by their
/// bright variants.
pub const XTERM_ANSI_COLORS: [Rgb; 16] = [
    Rgb::new(0, 0, 0),
    Rgb::new(205, 0, 0),
    Rgb::new(0, 205, 0),
    Rgb::new(205, 205, 0),
    Rgb::new(0, 0, 238),
    Rgb::new(205, 0, 205),
    Rgb::new(0, 205, 205),
    Rgb::new(229, 229, 229),
    Rgb::new(127, 127, 127),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(92, 92, 255),
    Rgb::new(255, 0, 255),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 255, 255),
];

/// Default colours used when no SGR colour is active.
///
/// `background` is what reverse video paints as foreground when no explicit
/// background is set; runs themselves carry `None` for "default background".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub foreground: Rgb,
    pub background: Rgb,
    pub ansi: [Rgb; 16],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            foreground: XTERM_ANSI_COLORS[7],
            background: XTERM_ANSI_COLORS[0],
            ansi: XTERM_ANSI_COLORS,
        }
    }
}

impl Palette {
    /// Resolves a 256-colour index.
    ///
    /// - 0-15: the palette's 16-colour table
    /// - 16-231: 6x6x6 colour cube
    /// - 232-255: 24-step grayscale ramp
    pub fn indexed(&self, index: u8) -> Rgb {
        match index {
            0..=15 => self.ansi[index as usize],
            16..=231 => {
                let i = index - 16;
                Rgb::new(cube_level(i / 36), cube_level((i / 6) % 6), cube_level(i % 6))
            }
            232..=255 => {
                let gray = 8 + 10 * (index - 232);
                Rgb::new(gray, gray, gray)
            }
        }
    }
}

/// Maps a cube coordinate (0-5) to its channel intensity.
fn cube_level(v: u8) -> u8 {
    if v == 0 {
        0
    } else {
        55 + 40 * v
    }
}
