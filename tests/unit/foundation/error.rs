use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        SublayError::initialization("x")
            .to_string()
            .contains("initialization error:")
    );
    assert!(SublayError::timeout("x").to_string().contains("timeout error:"));
    assert!(
        SublayError::malformed_frame("x")
            .to_string()
            .contains("malformed frame:")
    );
    assert!(
        SublayError::resource_exhaustion("x")
            .to_string()
            .contains("resource exhaustion:")
    );
    assert!(SublayError::decode("x").to_string().contains("decode error:"));
    assert!(
        SublayError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        SublayError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = SublayError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn serde_json_errors_map_to_serde_variant() {
    let err: SublayError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(matches!(err, SublayError::Serde(_)));
}
