use super::*;
use crate::test_support::{
    at_unix, set_mtime, temp_dir, write_garbage, write_jpeg, write_jpeg_with_capture_time,
    write_png,
};

fn naive(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn local(t: std::time::SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(t).naive_local()
}

#[test]
fn parse_exif_datetime_accepts_padded_values() {
    assert_eq!(
        parse_exif_datetime("2021:06:15 07:30:00").unwrap(),
        naive("2021-06-15 07:30:00")
    );
    assert_eq!(
        parse_exif_datetime("2021:06:15 07:30:00\0").unwrap(),
        naive("2021-06-15 07:30:00")
    );
    assert!(parse_exif_datetime("2021-06-15 07:30:00").is_err());
    assert!(parse_exif_datetime("    :  :     :  :  ").is_err());
}

#[test]
fn embedded_time_wins_over_mtime() {
    let dir = temp_dir("ts_embedded");
    let p = dir.join("shot.jpg");
    write_jpeg_with_capture_time(&p, 8, 8, "2019:12:31 23:59:58");
    set_mtime(&p, at_unix(1_700_000_000));

    let r = resolve_capture_time(&p);
    assert_eq!(r.source, TimestampSource::Embedded);
    assert_eq!(r.value, Some(naive("2019-12-31 23:59:58")));
    assert!(r.failures.is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_metadata_falls_back_to_mtime() {
    let dir = temp_dir("ts_mtime");
    let jpg = dir.join("plain.jpg");
    let png = dir.join("plain.png");
    write_jpeg(&jpg, 8, 8);
    write_png(&png, 8, 8);
    set_mtime(&jpg, at_unix(1_600_000_000));
    set_mtime(&png, at_unix(1_600_000_123));

    let r = resolve_capture_time(&jpg);
    assert_eq!(r.source, TimestampSource::FileModified);
    assert_eq!(r.value, Some(local(at_unix(1_600_000_000))));
    assert_eq!(r.failures.len(), 1);
    assert!(matches!(
        r.failures[0],
        TimelapseError::MetadataRead { .. }
    ));

    let r = resolve_capture_time(&png);
    assert_eq!(r.source, TimestampSource::FileModified);
    assert_eq!(r.value, Some(local(at_unix(1_600_000_123))));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn malformed_metadata_is_not_fatal() {
    let dir = temp_dir("ts_malformed");
    let p = dir.join("bad_exif.jpg");
    write_jpeg_with_capture_time(&p, 8, 8, "not a date at all!");
    set_mtime(&p, at_unix(1_500_000_000));

    let r = resolve_capture_time(&p);
    assert_eq!(r.source, TimestampSource::FileModified);
    assert_eq!(r.value, Some(local(at_unix(1_500_000_000))));
    assert!(matches!(
        read_embedded_capture_time(&p),
        Err(TimelapseError::MetadataRead { .. })
    ));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn garbage_file_still_gets_mtime() {
    let dir = temp_dir("ts_garbage");
    let p = dir.join("broken.jpg");
    write_garbage(&p);
    set_mtime(&p, at_unix(1_400_000_000));

    let r = resolve_capture_time(&p);
    assert_eq!(r.value, Some(local(at_unix(1_400_000_000))));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_file_is_unresolved_with_typed_failures() {
    let dir = temp_dir("ts_missing");
    let p = dir.join("gone.jpg");

    let r = resolve_capture_time(&p);
    assert_eq!(r.value, None);
    assert_eq!(r.source, TimestampSource::Unresolved);
    assert_eq!(r.failures.len(), 2);
    assert!(matches!(r.failures[0], TimelapseError::MetadataRead { .. }));
    assert!(matches!(r.failures[1], TimelapseError::FileTime { .. }));

    std::fs::remove_dir_all(&dir).ok();
}
