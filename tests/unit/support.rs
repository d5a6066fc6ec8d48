#![allow(dead_code)]

use std::{
    io::Cursor,
    path::{Path, PathBuf},
    time::SystemTime,
};

pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "timelapse_{name}_{}_{}",
        std::process::id(),
        SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 120, 160]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    std::fs::write(path, encode(width, height, image::ImageFormat::Png)).unwrap();
}

pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, encode(width, height, image::ImageFormat::Jpeg)).unwrap();
}

/// JPEG carrying an EXIF APP1 segment with `DateTimeOriginal = capture_time`.
pub fn write_jpeg_with_capture_time(path: &Path, width: u32, height: u32, capture_time: &str) {
    let jpeg = encode(width, height, image::ImageFormat::Jpeg);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let field = exif::Field {
        tag: exif::Tag::DateTimeOriginal,
        ifd_num: exif::In::PRIMARY,
        value: exif::Value::Ascii(vec![capture_time.as_bytes().to_vec()]),
    };
    let mut writer = exif::experimental::Writer::new();
    writer.push_field(&field);
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let seg_len = u16::try_from(2 + 6 + tiff.len()).unwrap();
    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&seg_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    std::fs::write(path, out).unwrap();
}

pub fn write_garbage(path: &Path) {
    std::fs::write(path, b"definitely not an image").unwrap();
}

pub fn set_mtime(path: &Path, when: SystemTime) {
    let f = std::fs::File::options().write(true).open(path).unwrap();
    f.set_modified(when).unwrap();
}

pub fn at_unix(secs: u64) -> SystemTime {
    std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs)
}

/// Write an executable shell script standing in for `ffmpeg`.
#[cfg(unix)]
pub fn fake_encoder(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt as _;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Fake encoder that copies its `-i` argument (the manifest) to `capture` and exits with `code`.
#[cfg(unix)]
pub fn capturing_encoder(dir: &Path, capture: &Path, code: i32) -> PathBuf {
    let body = format!(
        r#"while [ $# -gt 0 ]; do
  if [ "$1" = "-i" ]; then cp "$2" '{}'; fi
  shift
done
exit {code}"#,
        capture.display()
    );
    fake_encoder(dir, &format!("fake_ffmpeg_{code}.sh"), &body)
}
