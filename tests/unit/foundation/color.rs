use super::*;

#[test]
fn parses_short_long_and_alpha_forms() {
    assert_eq!(parse_hex_color("#fff").unwrap().to_array(), [255, 255, 255, 255]);
    assert_eq!(
        parse_hex_color("#91EAE4").unwrap().to_array(),
        [0x91, 0xea, 0xe4, 255]
    );
    assert_eq!(parse_hex_color("86a8e7").unwrap().to_array(), [0x86, 0xa8, 0xe7, 255]);
    assert_eq!(parse_hex_color("#ff000080").unwrap().to_array(), [128, 0, 0, 128]);
}

#[test]
fn rejects_malformed_colors() {
    assert!(parse_hex_color("#12345").is_err());
    assert!(parse_hex_color("#gg0000").is_err());
    assert!(parse_hex_color("#ééé").is_err());
    assert!(parse_hex_color("").is_err());
}
