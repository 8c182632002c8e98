//! Contract tests for fragment and consolidated key derivation.

use chrono::NaiveDate;
use tblog_core::KeyLayout;

#[test]
fn fragment_day_maps_to_consolidated_key() {
    let layout = KeyLayout::default();
    let cases = [
        ("log/tbcd1234/20210730T131711.123Z.log", "log/2021/07/tbcd1234-30.log"),
        ("log/tbcd1234/20210730T140000Z.log", "log/2021/07/tbcd1234-30.log"),
        ("log/tbcd1234/20211231T235959.999999Z.log", "log/2021/12/tbcd1234-31.log"),
        ("log/tbcd00ff/20240229T000000.log", "log/2024/02/tbcd00ff-29.log"),
    ];

    for (fragment, expected) in cases {
        let key = layout
            .parse_fragment(fragment)
            .unwrap_or_else(|| panic!("{fragment} should parse"));
        assert_eq!(layout.consolidated_key(key.source_id(), key.date()), expected);
    }
}

#[test]
fn consolidated_key_is_deterministic() {
    let layout = KeyLayout::default();
    let date = NaiveDate::from_ymd_opt(2021, 7, 30).unwrap();
    assert_eq!(
        layout.consolidated_key("tbcd1234", date),
        layout.consolidated_key("TBCD1234", date)
    );
}

#[test]
fn consolidated_keys_never_parse_as_fragments() {
    let layout = KeyLayout::default();
    let date = NaiveDate::from_ymd_opt(2021, 7, 30).unwrap();
    assert!(
        layout
            .parse_fragment(&layout.consolidated_key("tbcd1234", date))
            .is_none()
    );
}

#[test]
fn listing_prefixes_follow_root() {
    let layout = KeyLayout::new("archive").unwrap();
    assert_eq!(layout.root_dir(), "archive/");
    assert_eq!(layout.source_dir("tbcd1"), "archive/tbcd1/");
    assert_eq!(
        layout.consolidated_key("tbcd1", NaiveDate::from_ymd_opt(2020, 3, 9).unwrap()),
        "archive/2020/03/tbcd1-09.log"
    );
}
