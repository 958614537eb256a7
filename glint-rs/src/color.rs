//! Packed colors and the 16-colour legacy palette.
//!
//! A [`Color`] packs alpha and RGB into one `u32` (`0xAARRGGBB`).  The
//! legacy palette is addressed by index `0..16`, in the order of the
//! single-character legacy codes `0`–`9`, `a`–`f`.

use std::fmt;
use std::sync::OnceLock;

/// An ARGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const fn from_argb(argb: u32) -> Self {
        Self(argb)
    }

    /// Opaque colour from a `0xRRGGBB` value.
    pub const fn from_rgb(rgb: u32) -> Self {
        Self(0xff00_0000 | (rgb & 0x00ff_ffff))
    }

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::from_rgb(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    #[inline]
    pub fn argb(self) -> u32 {
        self.0
    }

    /// The colour without its alpha channel.
    #[inline]
    pub fn rgb(self) -> u32 {
        self.0 & 0x00ff_ffff
    }

    #[inline]
    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub fn blue(self) -> u8 {
        self.0 as u8
    }

    pub fn with_alpha(self, alpha: u8) -> Self {
        Self(((alpha as u32) << 24) | self.rgb())
    }

    /// Legacy palette colour at `index` (`0..16`).
    pub fn legacy(index: u8) -> Option<Self> {
        PALETTE.get(index as usize).map(|e| e.color)
    }

    /// Parse a colour.
    ///
    /// Accepts a two-character legacy code (`&c`, `§c`), a 6- or 8-digit hex
    /// value with optional `#` (8 digits read as `AARRGGBB`), or a palette
    /// name, case-insensitively.  Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars();
        if let (Some('&' | '§'), Some(code), None) = (chars.next(), chars.next(), chars.next()) {
            return legacy_index(code).and_then(Self::legacy);
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.chars().all(|c| c.is_ascii_hexdigit()) {
            match hex.len() {
                6 => return u32::from_str_radix(hex, 16).ok().map(Self::from_rgb),
                8 => return u32::from_str_radix(hex, 16).ok().map(Self::from_argb),
                _ => {}
            }
        }

        let name = s.to_ascii_lowercase();
        let name = match name.as_str() {
            "grey" => "gray",
            "dark_grey" => "dark_gray",
            other => other,
        };
        PALETTE.iter().find(|e| e.name == name).map(|e| e.color)
    }

    /// Index of the closest legacy palette entry by CIE-Lab distance.
    pub fn nearest_legacy(self) -> u8 {
        if let Some(i) = PALETTE.iter().position(|e| e.color.rgb() == self.rgb()) {
            return i as u8;
        }
        let target = Lab::from_color(self);
        let mut best = (0u8, f64::INFINITY);
        for (i, lab) in palette_lab().iter().enumerate() {
            let d = target.distance_sq(lab);
            if d < best.1 {
                best = (i as u8, d);
            }
        }
        best.0
    }

    /// `#RRGGBB`, alpha omitted.
    pub fn to_hex(self) -> String {
        format!("#{:06X}", self.rgb())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match PALETTE.iter().find(|e| e.color == *self) {
            Some(e) => f.write_str(e.name),
            None => f.write_str(&self.to_hex()),
        }
    }
}

/// Map a legacy code character to its palette index.
pub fn legacy_index(code: char) -> Option<u8> {
    code.to_digit(16).map(|d| d as u8)
}

// ── Palette ───────────────────────────────────────────────────────────────────

pub struct PaletteEntry {
    pub name: &'static str,
    pub code: char,
    pub color: Color,
}

const fn entry(name: &'static str, code: char, rgb: u32) -> PaletteEntry {
    PaletteEntry {
        name,
        code,
        color: Color::from_rgb(rgb),
    }
}

/// The 16 legacy colours, indexed by their code digit.
pub const PALETTE: [PaletteEntry; 16] = [
    entry("black", '0', 0x000000),
    entry("dark_blue", '1', 0x0000AA),
    entry("dark_green", '2', 0x00AA00),
    entry("dark_aqua", '3', 0x00AAAA),
    entry("dark_red", '4', 0xAA0000),
    entry("dark_purple", '5', 0xAA00AA),
    entry("gold", '6', 0xFFAA00),
    entry("gray", '7', 0xAAAAAA),
    entry("dark_gray", '8', 0x555555),
    entry("blue", '9', 0x5555FF),
    entry("green", 'a', 0x55FF55),
    entry("aqua", 'b', 0x55FFFF),
    entry("red", 'c', 0xFF5555),
    entry("light_purple", 'd', 0xFF55FF),
    entry("yellow", 'e', 0xFFFF55),
    entry("white", 'f', 0xFFFFFF),
];

/// Palette indices by name.
pub mod legacy {
    pub const BLACK: u8 = 0;
    pub const DARK_BLUE: u8 = 1;
    pub const DARK_GREEN: u8 = 2;
    pub const DARK_AQUA: u8 = 3;
    pub const DARK_RED: u8 = 4;
    pub const DARK_PURPLE: u8 = 5;
    pub const GOLD: u8 = 6;
    pub const GRAY: u8 = 7;
    pub const DARK_GRAY: u8 = 8;
    pub const BLUE: u8 = 9;
    pub const GREEN: u8 = 10;
    pub const AQUA: u8 = 11;
    pub const RED: u8 = 12;
    pub const LIGHT_PURPLE: u8 = 13;
    pub const YELLOW: u8 = 14;
    pub const WHITE: u8 = 15;
}

// ── CIE-Lab ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Lab {
    l: f64,
    a: f64,
    b: f64,
}

// D50 reference white.
const WHITE_X: f64 = 0.964_22;
const WHITE_Y: f64 = 1.0;
const WHITE_Z: f64 = 0.825_21;

impl Lab {
    fn from_color(c: Color) -> Self {
        let r = srgb_to_linear(c.red());
        let g = srgb_to_linear(c.green());
        let b = srgb_to_linear(c.blue());

        // sRGB -> XYZ, Bradford-adapted to D50.
        let x = 0.436_074_7 * r + 0.385_064_9 * g + 0.143_080_4 * b;
        let y = 0.222_504_5 * r + 0.716_878_6 * g + 0.060_616_9 * b;
        let z = 0.013_932_2 * r + 0.097_104_5 * g + 0.714_173_3 * b;

        let fx = lab_f(x / WHITE_X);
        let fy = lab_f(y / WHITE_Y);
        let fz = lab_f(z / WHITE_Z);
        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }

    fn distance_sq(&self, other: &Lab) -> f64 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        dl * dl + da * da + db * db
    }
}

fn srgb_to_linear(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    const EPSILON: f64 = 216.0 / 24389.0;
    const KAPPA: f64 = 24389.0 / 27.0;
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

fn palette_lab() -> &'static [Lab; 16] {
    static LAB: OnceLock<[Lab; 16]> = OnceLock::new();
    LAB.get_or_init(|| std::array::from_fn(|i| Lab::from_color(PALETTE[i].color)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels() {
        let c = Color::from_argb(0x80_12_34_56);
        assert_eq!((c.alpha(), c.red(), c.green(), c.blue()), (0x80, 0x12, 0x34, 0x56));
        assert_eq!(c.rgb(), 0x123456);
        assert_eq!(c.with_alpha(0xff).argb(), 0xff12_3456);
    }

    #[test]
    fn parse_legacy_codes() {
        assert_eq!(Color::parse("&c"), Some(Color::from_rgb(0xFF5555)));
        assert_eq!(Color::parse("§6"), Some(Color::from_rgb(0xFFAA00)));
        assert_eq!(Color::parse("&C"), Color::parse("&c"));
        assert_eq!(Color::parse("&z"), None);
    }

    #[test]
    fn parse_hex() {
        assert_eq!(Color::parse("#00ff00"), Some(Color::from_rgb(0x00FF00)));
        assert_eq!(Color::parse("ABCDEF"), Some(Color::from_rgb(0xABCDEF)));
        assert_eq!(Color::parse("#80112233"), Some(Color::from_argb(0x8011_2233)));
        assert_eq!(Color::parse("#12345"), None);
    }

    #[test]
    fn parse_names_and_aliases() {
        assert_eq!(Color::parse("Gold"), Color::legacy(legacy::GOLD));
        assert_eq!(Color::parse("grey"), Color::legacy(legacy::GRAY));
        assert_eq!(Color::parse("DARK_GREY"), Color::legacy(legacy::DARK_GRAY));
        assert_eq!(Color::parse("chartreuse"), None);
        assert_eq!(Color::parse(""), None);
    }

    #[test]
    fn exact_palette_match() {
        for (i, e) in PALETTE.iter().enumerate() {
            assert_eq!(e.color.nearest_legacy(), i as u8, "{}", e.name);
            assert_eq!(legacy_index(e.code), Some(i as u8));
        }
    }

    #[test]
    fn nearest_match() {
        assert_eq!(Color::from_rgb(0x101010).nearest_legacy(), legacy::BLACK);
        assert_eq!(Color::from_rgb(0xFF5050).nearest_legacy(), legacy::RED);
        assert_eq!(Color::from_rgb(0xF0F0F0).nearest_legacy(), legacy::WHITE);
        assert_eq!(Color::from_rgb(0x0000B0).nearest_legacy(), legacy::DARK_BLUE);
    }

    #[test]
    fn nearest_is_deterministic() {
        let c = Color::from_rgb(0x7A3FC2);
        let first = c.nearest_legacy();
        for _ in 0..10 {
            assert_eq!(c.nearest_legacy(), first);
        }
    }

    #[test]
    fn display() {
        assert_eq!(Color::from_rgb(0xFFAA00).to_string(), "gold");
        assert_eq!(Color::from_rgb(0x123456).to_string(), "#123456");
    }
}
