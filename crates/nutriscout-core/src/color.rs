use serde::{Deserialize, Serialize};

/// Display color. Everything we hand out comes from the fixed palette below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const GREEN: Rgb = Rgb::new(0x4C, 0xAF, 0x50);
    pub const LIGHT_GREEN: Rgb = Rgb::new(0x8B, 0xC3, 0x4A);
    pub const YELLOW: Rgb = Rgb::new(0xFF, 0xEB, 0x3B);
    pub const ORANGE: Rgb = Rgb::new(0xFF, 0x98, 0x00);
    pub const RED: Rgb = Rgb::new(0xF4, 0x43, 0x36);
    pub const GREY: Rgb = Rgb::new(0x9E, 0x9E, 0x9E);

    // Official Nutri-Score badge colors
    pub const NUTRI_A: Rgb = Rgb::new(0x03, 0x81, 0x41);
    pub const NUTRI_B: Rgb = Rgb::new(0x85, 0xBB, 0x2F);
    pub const NUTRI_C: Rgb = Rgb::new(0xFE, 0xCB, 0x02);
    pub const NUTRI_D: Rgb = Rgb::new(0xEE, 0x81, 0x00);
    pub const NUTRI_E: Rgb = Rgb::new(0xE6, 0x3E, 0x11);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or `#AARRGGBB` (alpha is dropped). Bare hex without
    /// the `#` is rejected.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let rgb = match digits.len() {
            6 => digits,
            8 => &digits[2..],
            _ => return None,
        };

        let channel = |i: usize| u8::from_str_radix(&rgb[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
