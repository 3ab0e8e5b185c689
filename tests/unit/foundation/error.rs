use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        DriveError::schema("x")
            .to_string()
            .contains("schema validation error:")
    );
    assert!(DriveError::invalid_mode("x").to_string().contains("invalid mode:"));
    assert!(DriveError::stale_seek("x").to_string().contains("stale seek:"));
    assert!(
        DriveError::asset("x")
            .to_string()
            .contains("asset settlement error:")
    );
    assert!(
        DriveError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn wire_codes_roundtrip_through_kind() {
    let errs = [
        DriveError::schema("a"),
        DriveError::invalid_mode("b"),
        DriveError::stale_seek("c"),
        DriveError::out_of_range("d"),
        DriveError::asset("e"),
        DriveError::timeout("f"),
        DriveError::validation("g"),
        DriveError::serde("h"),
        DriveError::encode("i"),
    ];
    for e in errs {
        let kind = ErrorKind::from_code(e.kind().as_str());
        assert_eq!(kind, e.kind());
        let rebuilt = DriveError::from_wire(kind, e.message());
        assert_eq!(rebuilt.kind(), e.kind());
        assert_eq!(rebuilt.message(), e.message());
    }
}

#[test]
fn unknown_wire_code_is_internal() {
    assert_eq!(ErrorKind::from_code("page_crashed"), ErrorKind::Internal);
    let e = DriveError::from_wire(ErrorKind::Internal, "boom");
    assert!(matches!(e, DriveError::Other(_)));
    assert!(e.to_string().contains("boom"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = DriveError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.kind(), ErrorKind::Internal);
}
