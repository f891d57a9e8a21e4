// Glyph widths of the PDF standard fonts, in 1/1000 text-space units,
// indexed by WinAnsiEncoding code. Widths come from the Adobe core AFM files.
use serde::Serialize;

use crate::positioning::{FontFamily, FontWeight};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    Courier,
    CourierBold,
}

const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0x30
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 0x50
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 0x60
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 0x70
];

const HELVETICA_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 0xA0
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 0xB0
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 0xC0
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 0xD0
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // 0xE0
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // 0xF0
];

const HELVETICA_BOLD_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 0xA0
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 0xB0
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 0xC0
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 0xD0
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278, // 0xE0
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556, // 0xF0
];

const COURIER_WIDTH: u16 = 600;

impl StandardFont {
    pub fn select(family: FontFamily, weight: FontWeight) -> Self {
        match (family, weight) {
            (FontFamily::SansSerif, FontWeight::Regular) => Self::Helvetica,
            (FontFamily::SansSerif, FontWeight::Bold) => Self::HelveticaBold,
            (FontFamily::Monospace, FontWeight::Regular) => Self::Courier,
            (FontFamily::Monospace, FontWeight::Bold) => Self::CourierBold,
        }
    }

    /// The `/BaseFont` name every conforming reader knows without embedding.
    pub fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
        }
    }

    /// Magnitude of the AFM descender.
    pub fn descent(self) -> f32 {
        match self {
            Self::Helvetica | Self::HelveticaBold => 207.0,
            Self::Courier | Self::CourierBold => 157.0,
        }
    }

    pub fn glyph_width(self, code: u8) -> u16 {
        let bold = match self {
            Self::Courier | Self::CourierBold => return COURIER_WIDTH,
            Self::Helvetica => false,
            Self::HelveticaBold => true,
        };
        match code {
            0x20..=0x7E => {
                let table = if bold { &HELVETICA_BOLD_ASCII } else { &HELVETICA_ASCII };
                table[(code - 0x20) as usize]
            }
            0xA0..=0xFF => {
                let table = if bold { &HELVETICA_BOLD_LATIN1 } else { &HELVETICA_LATIN1 };
                table[(code - 0xA0) as usize]
            }
            0x80 => 556,
            0x91 | 0x92 => if bold { 278 } else { 222 },
            0x93 | 0x94 => if bold { 500 } else { 333 },
            0x96 => 556,
            0x97 => 1000,
            _ => 0,
        }
    }

    /// Width of `text` at `size`, in the same units as `size`.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let units: u32 = encode_win_ansi(text)
            .into_iter()
            .map(|code| u32::from(self.glyph_width(code)))
            .sum();
        units as f32 * size / 1000.0
    }
}

/// Maps text to WinAnsiEncoding. Characters outside the code page become `?`,
/// line breaks and tabs become spaces since the name is drawn on one line.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => b' ',
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '\u{20AC}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        })
        .collect()
}
