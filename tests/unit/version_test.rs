use asterix_link::ProductVersion;

#[test]
fn test_full_server_header() {
    let v = ProductVersion::parse(Some("Apache AsterixDB/0.9.8.1"));
    assert_eq!(v.product_name(), "Apache AsterixDB");
    assert_eq!(v.product_version(), "0.9.8.1");
    assert_eq!(v.major(), 0);
    assert_eq!(v.minor(), 9);
}

#[test]
fn test_major_only() {
    let v = ProductVersion::parse(Some("Couchbase Analytics/7-snapshot"));
    assert_eq!(v.product_name(), "Couchbase Analytics");
    assert_eq!(v.product_version(), "7-snapshot");
    assert_eq!(v.major(), 7);
    assert_eq!(v.minor(), 0);
}

#[test]
fn test_name_without_version() {
    let v = ProductVersion::parse(Some("Jetty"));
    assert_eq!(v.product_name(), "Jetty");
    assert_eq!(v.product_version(), "0.0");
}

#[test]
fn test_missing_header_uses_defaults() {
    let v = ProductVersion::parse(None);
    assert_eq!(v.product_name(), "Apache AsterixDB");
    assert_eq!(v.product_version(), "0.0");
    assert_eq!((v.major(), v.minor()), (0, 0));
}

#[test]
fn test_overflowing_numbers_read_as_zero() {
    let v = ProductVersion::parse(Some("X/99999999999.3"));
    assert_eq!(v.major(), 0);
    assert_eq!(v.minor(), 3);
    assert_eq!(v.product_version(), "99999999999.3");
}

#[test]
fn test_non_numeric_version_text_is_kept() {
    let v = ProductVersion::parse(Some("X/dev"));
    assert_eq!(v.product_version(), "dev");
    assert_eq!((v.major(), v.minor()), (0, 0));
}
