use image::Rgba;
use sgatlas_core::decode::{RUN_SKIP, decode_payload, decode_pixels};
use sgatlas_core::prelude::*;

const WHITE: [u8; 2] = [0xff, 0x7f];
const RED: [u8; 2] = [0x00, 0x7c];

fn iso_record(w: i16, h: i16, base: usize, overlay: usize) -> ImageRecord {
    ImageRecord {
        width: w,
        height: h,
        image_type: 30,
        uncompressed_length: base as u32,
        length: (base + overlay) as u32,
        ..Default::default()
    }
}

fn white_tiles(count: usize, tile_bytes: usize) -> Vec<u8> {
    WHITE.repeat(count * tile_bytes / 2)
}

#[test]
fn single_small_tile_is_a_diamond() {
    let base = white_tiles(1, 1800);
    let rec = iso_record(58, 30, base.len(), 0);
    let g = decode_payload(&rec, &base, &DecoderConfig::default()).unwrap();
    let px = &g.pixels;

    assert_eq!(px.dimensions(), (58, 30));
    // top row holds two pixels in the middle
    assert_eq!(px.get_pixel(27, 0)[3], 0);
    assert_eq!(px.get_pixel(28, 0), &Rgba([255, 255, 255, 255]));
    assert_eq!(px.get_pixel(29, 0), &Rgba([255, 255, 255, 255]));
    assert_eq!(px.get_pixel(30, 0)[3], 0);
    // widest rows span the whole tile
    assert_eq!(px.get_pixel(0, 14)[3], 255);
    assert_eq!(px.get_pixel(57, 15)[3], 255);
    // corners stay transparent
    assert_eq!(px.get_pixel(0, 0)[3], 0);
    assert_eq!(px.get_pixel(57, 29)[3], 0);
    let opaque = px.pixels().filter(|p| p[3] == 255).count();
    assert_eq!(opaque, 900);
}

#[test]
fn footprint_sits_at_the_bottom_with_overlay_above() {
    let mut payload = white_tiles(1, 1800);
    let overlay = [RUN_SKIP, 10, 1, RED[0], RED[1]];
    payload.extend_from_slice(&overlay);
    let rec = iso_record(58, 40, 1800, overlay.len());
    let g = decode_payload(&rec, &payload, &DecoderConfig::default()).unwrap();
    let px = &g.pixels;

    assert_eq!(px.get_pixel(10, 0), &Rgba([255, 0, 0, 255]));
    assert_eq!(px.get_pixel(9, 0)[3], 0);
    assert_eq!(px.get_pixel(11, 0)[3], 0);
    // tile top row moved down by the 10 overlay rows
    assert_eq!(px.get_pixel(28, 10)[3], 255);
    assert_eq!(px.get_pixel(28, 9)[3], 0);
}

#[test]
fn two_by_two_small_tiles_cover_the_diamond() {
    // size 2: width 118, footprint 60
    let base = white_tiles(4, 1800);
    let rec = iso_record(118, 60, base.len(), 0);
    let px = decode_pixels(&rec, &base, 4).unwrap();
    assert_eq!(px.covered(), 4 * 900);
    // top tile starts at x = 30
    assert!(px.is_covered(30 + 28, 0));
    assert!(!px.is_covered(28, 0));
    // middle row of tiles reaches both edges
    assert!(px.is_covered(0, 29));
    assert!(px.is_covered(117, 30));
}

#[test]
fn large_tiles_resolve_from_height() {
    let base = white_tiles(1, 3200);
    let rec = iso_record(78, 40, base.len(), 0);
    let px = decode_pixels(&rec, &base, 4).unwrap();
    assert_eq!(px.covered(), 1600);
    assert!(px.is_covered(38, 0) && px.is_covered(39, 0));
}

#[test]
fn unknown_tile_size_is_an_error() {
    // footprint height 36 matches neither tile height
    let rec = iso_record(70, 36, 72 * 36, 0);
    let err = decode_pixels(&rec, &vec![0; 72 * 36], 4).unwrap_err();
    assert!(matches!(err, SgError::UnknownTileSize { height: 36 }));
}

#[test]
fn size_override_must_match_footprint() {
    let mut rec = iso_record(58, 30, 1800, 0);
    rec.flags = ImageFlags([0, 0, 0, 2]);
    let err = decode_pixels(&rec, &white_tiles(1, 1800), 4).unwrap_err();
    assert!(matches!(err, SgError::UnknownTileSize { height: 30 }));
}

#[test]
fn footprint_length_is_checked() {
    let rec = iso_record(58, 30, 1000, 0);
    let err = decode_pixels(&rec, &vec![0; 1000], 4).unwrap_err();
    assert!(matches!(
        err,
        SgError::FootprintMismatch {
            expected: 1800,
            actual: 1000
        }
    ));
}

#[test]
fn cut_overlay_run_is_malformed() {
    let mut payload = white_tiles(1, 1800);
    // claims 3 pixels, stores one
    payload.extend_from_slice(&[3, RED[0], RED[1]]);
    let rec = iso_record(58, 40, 1800, 3);
    let err = decode_pixels(&rec, &payload, 4).unwrap_err();
    assert!(matches!(err, SgError::MalformedRunList { row: 0, .. }));
}
