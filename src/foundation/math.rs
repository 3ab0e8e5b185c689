pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Source-over for one premultiplied RGBA8 pixel.
pub(crate) fn blend_over_premul(dst: &mut [u8], src: [u8; 4]) {
    let a = u16::from(src[3]);
    if a == 255 {
        dst.copy_from_slice(&src);
        return;
    }
    if a == 0 {
        return;
    }
    let inv = 255 - a;
    for c in 0..4 {
        let v = u16::from(src[c]) + mul_div255_u16(u16::from(dst[c]), inv);
        dst[c] = v.min(255) as u8;
    }
}

/// Convert one premultiplied channel back to straight alpha.
pub(crate) fn unpremul_channel(c: u8, a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    let v = (u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a);
    v.min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
