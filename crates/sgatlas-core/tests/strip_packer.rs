use image::{Rgba, RgbaImage};
use rand::{Rng, SeedableRng, rngs::StdRng};
use sgatlas_core::prelude::*;

fn solid(key: &str, w: u32, h: u32, color: [u8; 4]) -> InputGraphic {
    InputGraphic {
        key: key.into(),
        graphic: DecodedGraphic::new(RgbaImage::from_pixel(w, h, Rgba(color))),
    }
}

#[test]
fn random_sequences_keep_strip_invariants() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..50 {
        let n = rng.gen_range(1..=40);
        let sizes: Vec<(String, u32, u32)> = (0..n)
            .map(|i| (format!("g{i}"), rng.gen_range(1..=64), rng.gen_range(1..=64)))
            .collect();
        let layout = pack_layout(sizes.clone()).expect("layout");

        assert_eq!(layout.frames.len(), sizes.len());
        assert_eq!(layout.width, sizes.iter().map(|s| s.1).sum::<u32>());
        assert_eq!(layout.height, sizes.iter().map(|s| s.2).max().unwrap());
        let mut next_x = 0;
        for (frame, (key, w, h)) in layout.frames.iter().zip(&sizes) {
            assert_eq!(&frame.key, key);
            assert_eq!(frame.frame, Rect::new(next_x, 0, *w, *h));
            next_x += w;
        }
        for (i, a) in layout.frames.iter().enumerate() {
            for b in &layout.frames[i + 1..] {
                assert!(!a.frame.overlaps(&b.frame), "{a:?} overlaps {b:?}");
            }
        }
    }
}

#[test]
fn composed_atlas_copies_pixels_into_place() {
    let out = pack_graphics(vec![
        solid("red", 1, 1, [255, 0, 0, 255]),
        solid("green", 2, 2, [0, 255, 0, 255]),
    ])
    .unwrap();

    assert_eq!(out.rgba.dimensions(), (3, 2));
    assert_eq!(out.layout.frames[1].frame, Rect::new(1, 0, 2, 2));
    assert_eq!(out.rgba.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    // below the short graphic stays empty
    assert_eq!(out.rgba.get_pixel(0, 1), &Rgba([0, 0, 0, 0]));
    assert_eq!(out.rgba.get_pixel(2, 1), &Rgba([0, 255, 0, 255]));

    let stats = out.stats();
    assert_eq!(stats.num_frames, 2);
    assert_eq!(stats.total_area, 6);
    assert_eq!(stats.used_area, 5);
    assert_eq!(stats.wasted_area(), 1);
    assert_eq!(stats.tallest_frame, 2);
}

#[test]
fn origins_are_carried_into_frames() {
    let mut g = solid("a", 2, 2, [1, 1, 1, 255]);
    g.graphic = g.graphic.with_origin(-3, 4);
    let out = pack_graphics(vec![g]).unwrap();
    assert_eq!(out.layout.frames[0].origin, (-3, 4));
}

#[test]
fn empty_input_is_an_error() {
    assert!(matches!(pack_graphics(Vec::new()), Err(SgError::Empty)));
}

#[test]
fn zero_sized_graphic_is_rejected() {
    let err = pack_layout(vec![("a", 0u32, 3u32)]).unwrap_err();
    assert!(matches!(err, SgError::InvalidInput(_)));
}

#[test]
fn width_cap_and_overflow_report_out_of_space() {
    let opts = ComposeOptions {
        max_width: Some(3),
        ..Default::default()
    };
    let err = pack_graphics_with(
        vec![solid("a", 2, 1, [0; 4]), solid("b", 2, 1, [0; 4])],
        opts,
    )
    .err()
    .unwrap();
    assert!(matches!(err, SgError::OutOfSpace));

    let err = pack_layout(vec![("a", u32::MAX, 1u32), ("b", 1, 1)]).unwrap_err();
    assert!(matches!(err, SgError::OutOfSpace));
}

#[test]
fn outlines_mark_frame_edges() {
    let opts = ComposeOptions {
        outlines: true,
        ..Default::default()
    };
    let out = pack_graphics_with(vec![solid("a", 3, 3, [0, 0, 255, 255])], opts).unwrap();
    assert_eq!(out.rgba.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    assert_eq!(out.rgba.get_pixel(1, 1), &Rgba([0, 0, 255, 255]));
}

#[test]
fn duplicate_keys_are_reported_once() {
    let inputs = vec![
        solid("house.1", 1, 1, [0, 0, 0, 255]),
        solid("house.2", 1, 1, [0, 0, 0, 255]),
        solid("house.1", 2, 1, [0, 0, 0, 255]),
        solid("house.1", 3, 1, [0, 0, 0, 255]),
        solid("govt.1", 1, 1, [0, 0, 0, 255]),
    ];
    assert_eq!(duplicate_keys(&inputs), vec!["house.1".to_string()]);
    assert!(duplicate_keys(&inputs[..2]).is_empty());
}
