use crate::foundation::core::Rgba8Premul;

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (case-insensitive, `#` optional).
pub fn parse_hex_color(s: &str) -> Result<Rgba8Premul, String> {
    let trimmed = s.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !hex.is_ascii() {
        return Err(format!("invalid hex color \"{s}\""));
    }

    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    let (r, g, b, a) = match hex.len() {
        3 => {
            let nib = |i: usize| hex_byte(&hex[i..i + 1]).map(|v| v * 17);
            (nib(0)?, nib(1)?, nib(2)?, 255)
        }
        6 => (
            hex_byte(&hex[0..2])?,
            hex_byte(&hex[2..4])?,
            hex_byte(&hex[4..6])?,
            255,
        ),
        8 => (
            hex_byte(&hex[0..2])?,
            hex_byte(&hex[2..4])?,
            hex_byte(&hex[4..6])?,
            hex_byte(&hex[6..8])?,
        ),
        _ => {
            return Err(format!(
                "hex color must be #RGB, #RRGGBB or #RRGGBBAA, got \"{s}\""
            ));
        }
    };

    Ok(Rgba8Premul::from_straight_rgba(r, g, b, a))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/color.rs"]
mod tests;
