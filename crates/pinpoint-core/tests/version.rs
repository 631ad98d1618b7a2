use pinpoint_core::version::{
    canonical_version, default_earliest_compatible_version, is_prerelease, parse_version,
    version_magnitude,
};

#[test]
fn parse_plain_version() {
    let v = parse_version("1.8.2").unwrap();
    assert_eq!((v.major, v.minor, v.patch), (1, 8, 2));
    assert!(!is_prerelease(&v));
}

#[test]
fn parse_rejects_garbage() {
    assert!(parse_version("v1.0").is_err());
    assert!(parse_version("").is_err());
}

#[test]
fn canonical_drops_build_metadata() {
    assert_eq!(canonical_version("1.0.1+local").unwrap(), "1.0.1");
    assert_eq!(canonical_version("2.0.0-rc.1+abc").unwrap(), "2.0.0-rc.1");
}

#[test]
fn prerelease_detection() {
    assert!(is_prerelease(&parse_version("1.0.0-beta.2").unwrap()));
}

#[test]
fn default_ecv_is_major_zero_zero() {
    let v = parse_version("2.1.1").unwrap();
    assert_eq!(default_earliest_compatible_version(&v).to_string(), "2.0.0");
}

#[test]
fn magnitude_preserves_order() {
    let ordered = ["0.9.9", "1.0.0-alpha", "1.0.0-rc.1", "1.0.0", "1.0.1", "1.1.0", "2.0.0"];
    let magnitudes: Vec<f64> = ordered
        .iter()
        .map(|v| version_magnitude(&parse_version(v).unwrap()))
        .collect();
    for pair in magnitudes.windows(2) {
        assert!(pair[0] < pair[1], "{magnitudes:?}");
    }
}

#[test]
fn magnitude_of_release() {
    let v = parse_version("1.8.2").unwrap();
    assert_eq!(version_magnitude(&v), 10802.0);
}
