use super::*;
use crate::{
    catalog::{FrameDescriptor, OrderKey},
    test_support::{temp_dir, write_garbage, write_jpeg, write_png},
    timestamp::TimestampSource,
};

fn descriptor(dir: &Path, name: &str, ts: Option<&str>) -> FrameDescriptor {
    let timestamp = ts.map(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap());
    FrameDescriptor::new(
        name,
        dir.join(name),
        timestamp,
        TimestampSource::Embedded,
        None,
    )
}

fn system_style() -> CaptionStyle {
    CaptionStyle {
        font_path: None,
        ..CaptionStyle::default()
    }
}

#[test]
fn caption_text_formats_or_falls_back() {
    let ts = NaiveDateTime::parse_from_str("2022-03-04 05:06:07", "%Y-%m-%d %H:%M:%S").unwrap();
    assert_eq!(caption_text(Some(ts)), "2022-03-04 05:06:07");
    assert_eq!(caption_text(None), "Unknown");
}

#[test]
fn frame_names_sort_like_indices() {
    assert_eq!(frame_file_name(0, 3), "frame_00000.jpg");
    assert_eq!(frame_file_name(42, 100), "frame_00042.jpg");
    assert_eq!(frame_file_name(7, 123_456), "frame_000007.jpg");

    let total = 120_000;
    let mut names: Vec<String> = [99_999, 5, 100_000, 10_000]
        .iter()
        .map(|i| frame_file_name(*i, total))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            frame_file_name(5, total),
            frame_file_name(10_000, total),
            frame_file_name(99_999, total),
            frame_file_name(100_000, total),
        ]
    );
}

#[test]
fn style_validation() {
    assert!(CaptionStyle::default().validate().is_ok());
    let bad = [
        CaptionStyle {
            font_size_ratio: 0.0,
            ..CaptionStyle::default()
        },
        CaptionStyle {
            font_size_ratio: f32::NAN,
            ..CaptionStyle::default()
        },
        CaptionStyle {
            jpeg_quality: 0,
            ..CaptionStyle::default()
        },
        CaptionStyle {
            outline_width: 100,
            ..CaptionStyle::default()
        },
    ];
    for style in bad {
        assert!(matches!(
            CaptionCompositor::new(style),
            Err(TimelapseError::Validation(_))
        ));
    }
}

#[test]
fn style_round_trips_through_json_with_defaults() {
    let style: CaptionStyle = serde_json::from_str(r#"{ "padding": 7 }"#).unwrap();
    assert_eq!(style.padding, 7);
    assert_eq!(style.outline_width, CaptionStyle::default().outline_width);
}

#[test]
fn font_size_scales_with_height() {
    let style = CaptionStyle {
        font_size_ratio: 0.1,
        ..CaptionStyle::default()
    };
    assert_eq!(style.font_size_for(500), 50.0);
    assert_eq!(style.font_size_for(1), 1.0);
}

#[test]
fn missing_configured_font_falls_back() {
    let dir = temp_dir("caption_font_fallback");
    let style = CaptionStyle {
        font_path: Some(dir.join("no_such_font.ttf")),
        ..CaptionStyle::default()
    };
    let c = CaptionCompositor::new(style).unwrap();
    assert_ne!(
        c.font_origin(),
        &FontOrigin::Configured(dir.join("no_such_font.ttf"))
    );
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn svg_draws_outline_copies_under_fill() {
    let style = CaptionStyle {
        outline_width: 1,
        ..CaptionStyle::default()
    };
    let svg = caption_svg("a<b", "Fam'ily", 10.0, &style, 100, 50);
    // 3x3 square minus the origin, then the fill.
    assert_eq!(svg.matches("<text ").count(), 9);
    assert!(svg.contains("a&lt;b"));
    assert!(svg.contains("font-family=\"'Family'\""));
    let last = svg.rfind("<text ").unwrap();
    assert!(svg[last..].contains("rgb(255,255,255)"));

    let none = CaptionStyle {
        outline_width: 0,
        ..CaptionStyle::default()
    };
    assert_eq!(caption_svg("x", "F", 10.0, &none, 10, 10).matches("<text ").count(), 1);
}

#[test]
fn caption_lands_bottom_left_when_a_font_exists() {
    let c = CaptionCompositor::new(system_style()).unwrap();
    if c.font_origin() == &FontOrigin::Unavailable {
        return;
    }

    let (w, h) = (640, 360);
    let b = c.measure("2022-03-04 05:06:07", w, h).unwrap().unwrap();
    let pad = c.style().padding as f32;
    assert_eq!(b.left, pad);
    assert!((b.bottom() - (h as f32 - pad)).abs() < 1e-3);
    assert!(b.right() < w as f32);

    let mut img = image::RgbaImage::from_pixel(w, h, image::Rgba([30, 90, 30, 255]));
    assert!(c.caption_image(&mut img, "2022-03-04 05:06:07").unwrap());
    let changed = img.pixels().filter(|p| p.0 != [30, 90, 30, 255]).count();
    assert!(changed > 0);
    // Top-right corner is untouched.
    assert_eq!(img.get_pixel(w - 1, 0).0, [30, 90, 30, 255]);
}

#[test]
fn failed_frames_are_skipped_and_order_is_kept() {
    let src = temp_dir("caption_src");
    let out = temp_dir("caption_out").join("frames");
    write_jpeg(&src.join("a.jpg"), 64, 48);
    write_garbage(&src.join("b.jpg"));
    write_png(&src.join("c.png"), 64, 48);

    let catalog = FrameCatalog::from_frames(
        vec![
            descriptor(&src, "a.jpg", Some("2020-01-01 00:00:00")),
            descriptor(&src, "b.jpg", Some("2020-01-01 00:00:01")),
            descriptor(&src, "c.png", None),
        ],
        OrderKey::Timestamp,
    )
    .unwrap();

    let c = CaptionCompositor::new(system_style()).unwrap();
    let outcome = c.render_catalog(&catalog, &out).unwrap();

    assert_eq!(
        outcome.paths,
        vec![out.join("frame_00000.jpg"), out.join("frame_00002.jpg")]
    );
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].index, 1);
    assert!(matches!(
        outcome.skipped[0].error,
        TimelapseError::Render { .. }
    ));

    let mut on_disk: Vec<_> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    on_disk.sort();
    assert_eq!(on_disk, outcome.paths);

    for p in &outcome.paths {
        let img = image::open(p).unwrap();
        assert_eq!((img.width(), img.height()), (64, 48));
    }

    std::fs::remove_dir_all(&src).ok();
    std::fs::remove_dir_all(out.parent().unwrap()).ok();
}
