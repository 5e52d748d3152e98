use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    fn luminance(self) -> f64 {
        (self.0 as f64 * 299.0 + self.1 as f64 * 587.0 + self.2 as f64 * 114.0) / 1000.0
    }
}

/// `high` is used above the center, `low` below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub high: Rgb,
    pub low: Rgb,
    pub neutral: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellColor {
    pub background: Rgb,
    pub foreground: Rgb,
}

pub const MISSING_BACKGROUND: Rgb = Rgb(0xfa, 0xfa, 0xfa);
pub const MISSING_FOREGROUND: Rgb = Rgb(0xad, 0xb5, 0xbd);
pub const DARK_TEXT: Rgb = Rgb(0x21, 0x25, 0x29);
pub const LIGHT_TEXT: Rgb = Rgb(0xff, 0xff, 0xff);

pub fn cell_color(value: Option<f64>, center: f64, palette: &Palette, intensity: f64) -> CellColor {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return CellColor {
            background: MISSING_BACKGROUND,
            foreground: MISSING_FOREGROUND,
        };
    };
    if center == 0.0 {
        return contrast(palette.neutral);
    }

    let dev = (v - center) / center;
    let n = dev.clamp(-1.0, 1.0) * intensity;
    let background = if n >= 0.0 {
        lerp_rgb(palette.neutral, palette.high, n)
    } else {
        lerp_rgb(palette.neutral, palette.low, n.abs())
    };
    contrast(background)
}

fn contrast(background: Rgb) -> CellColor {
    let foreground = if background.luminance() > 128.0 {
        DARK_TEXT
    } else {
        LIGHT_TEXT
    };
    CellColor {
        background,
        foreground,
    }
}

// Intensities above 1 extrapolate past the palette colour; channels saturate.
fn lerp_rgb(a: Rgb, b: Rgb, f: f64) -> Rgb {
    Rgb(lerp(a.0, b.0, f), lerp(a.1, b.1, f), lerp(a.2, b.2, f))
}

fn lerp(a: u8, b: u8, f: f64) -> u8 {
    let v = (a as f64 + (b as f64 - a as f64) * f).round();
    v.clamp(0.0, 255.0) as u8
}
