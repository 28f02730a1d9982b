use colored::Color;

pub const PRIMARY: Color = Color::TrueColor {
    r: 120,
    g: 200,
    b: 255,
};
pub const ACCENT: Color = Color::TrueColor {
    r: 255,
    g: 200,
    b: 90,
};
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;

pub const IPV4_ADDR: Color = Color::TrueColor {
    r: 140,
    g: 230,
    b: 140,
};
pub const HOSTNAME: Color = Color::BrightCyan;
pub const PORT: Color = Color::BrightYellow;
pub const SERVICE: Color = Color::TrueColor {
    r: 200,
    g: 160,
    b: 255,
};
pub const SILENT_HOP: Color = Color::BrightBlack;

pub const FAST: Color = Color::Green;
pub const MEDIUM: Color = Color::Yellow;
pub const SLOW: Color = Color::Red;
