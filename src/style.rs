//! Display styles attached to boards.
//!
//! A board's configuration carries a free-form style tag. Renderers outside
//! the core need it resolved to something concrete, so each reload resolves
//! every tag once and publishes the result alongside the partitions.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Plain,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Style {
    /// Resolve a style tag. Unknown or empty tags fall back to `Plain`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "black" => Style::Black,
            "red" => Style::Red,
            "green" => Style::Green,
            "yellow" => Style::Yellow,
            "blue" => Style::Blue,
            "magenta" => Style::Magenta,
            "cyan" => Style::Cyan,
            "white" => Style::White,
            _ => Style::Plain,
        }
    }

    /// SGR foreground code, `None` for unstyled output
    pub fn ansi_code(&self) -> Option<u8> {
        match self {
            Style::Plain => None,
            Style::Black => Some(30),
            Style::Red => Some(31),
            Style::Green => Some(32),
            Style::Yellow => Some(33),
            Style::Blue => Some(34),
            Style::Magenta => Some(35),
            Style::Cyan => Some(36),
            Style::White => Some(37),
        }
    }

    pub fn css_color(&self) -> Option<&'static str> {
        match self {
            Style::Plain => None,
            Style::Black => Some("#000000"),
            Style::Red => Some("#ff0000"),
            Style::Green => Some("#00ff00"),
            Style::Yellow => Some("#ffff00"),
            Style::Blue => Some("#0000ff"),
            Style::Magenta => Some("#ff00ff"),
            Style::Cyan => Some("#00ffff"),
            Style::White => Some("#ffffff"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag() {
        assert_eq!(Style::from_tag("green"), Style::Green);
        assert_eq!(Style::from_tag(" Cyan "), Style::Cyan);
        assert_eq!(Style::from_tag(""), Style::Plain);
        assert_eq!(Style::from_tag("chartreuse"), Style::Plain);
    }

    #[test]
    fn test_codes() {
        assert_eq!(Style::Yellow.ansi_code(), Some(33));
        assert_eq!(Style::Plain.ansi_code(), None);
        assert_eq!(Style::Blue.css_color(), Some("#0000ff"));
    }
}
