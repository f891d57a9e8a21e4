use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components scaled to the 0..=1 range used by the `rg` operator.
    pub fn components(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

/// Accepts `black`, `white`, `red`, `green`, `blue` (any case) and `#RRGGBB`.
/// Everything else is black.
pub fn parse_color(raw: &str) -> Rgb {
    let value = raw.trim().to_lowercase();
    match value.as_str() {
        "black" => return Rgb::BLACK,
        "white" => return Rgb::new(255, 255, 255),
        "red" => return Rgb::new(255, 0, 0),
        "green" => return Rgb::new(0, 255, 0),
        "blue" => return Rgb::new(0, 0, 255),
        _ => {}
    }

    let Some(hex) = value.strip_prefix('#') else {
        return Rgb::BLACK;
    };
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Rgb::BLACK;
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
    Rgb::new(channel(0), channel(2), channel(4))
}
