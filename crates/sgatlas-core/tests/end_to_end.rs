use image::Rgba;
use sgatlas_core::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

/// Header {version 0xd5, 1 bitmap, 2 image records}: reserved record 0, one 2x1 plain image
/// and a zeroed third record.
fn crafted_container() -> Vec<u8> {
    let pixels = [0x00, 0x7c, 0xe0, 0x03];
    let header = FileHeader {
        version: 0xd5,
        max_image_records: 2,
        num_image_records: 2,
        num_bitmap_records: 1,
        total_data_size: 4,
        inline_data_size: 4,
        ..Default::default()
    };
    let bitmap = BitmapRecord {
        filename: "crafted.bmp".into(),
        num_images: 1,
        start_index: 1,
        end_index: 1,
        ..Default::default()
    };
    let data_start = (680 + 200 + 3 * 72) as u32;
    let image = ImageRecord {
        offset: data_start,
        length: 4,
        width: 2,
        height: 1,
        image_type: 0,
        ..Default::default()
    };

    let mut bytes = header.to_bytes();
    bytes.extend(bitmap.to_bytes());
    bytes.extend(ImageRecord::default().to_bytes());
    bytes.extend(image.to_bytes());
    bytes.extend(ImageRecord::default().to_bytes());
    assert_eq!(bytes.len(), data_start as usize);
    bytes.extend_from_slice(&pixels);
    bytes
}

#[test]
fn crafted_file_decodes_and_packs() {
    let bytes = crafted_container();
    let cfg = DecoderConfig::default();
    let file = SgFile::parse(&bytes, &cfg).unwrap();
    assert!(file.warnings.is_empty());
    assert_eq!(file.images.len(), 3);

    let report = file.decode_all(&PixelSources::inline(&bytes), &cfg, "crafted");
    assert_eq!(report.graphics.len(), 1);
    // the zeroed third record has no dimensions
    assert_eq!(report.failures.len(), 1);
    let g = &report.graphics[0];
    assert_eq!(g.key, "crafted.1");
    assert_eq!(g.graphic.pixels.as_raw().len(), 2 * 4);
    assert_eq!(g.graphic.pixels.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    assert_eq!(g.graphic.pixels.get_pixel(1, 0), &Rgba([0, 255, 0, 255]));

    let out = pack_graphics(report.graphics).unwrap();
    assert_eq!((out.layout.width, out.layout.height), (2, 1));
    assert_eq!(out.layout.frames[0].frame, Rect::new(0, 0, 2, 1));

    let worker = DeviceWorker::spawn(MemoryDevice::new).unwrap();
    let regions = upload_atlas(&worker, out).unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].1.rect, Rect::new(0, 0, 2, 1));
}

#[test]
fn crafted_file_loads_into_resource_index() {
    let dir = std::env::temp_dir().join(format!("sgatlas-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path: PathBuf = dir.join("crafted.sg3");
    std::fs::write(&path, crafted_container()).unwrap();

    let mut idx = ResourceIndex::new(Arc::new(LoaderRegistry::with_defaults()));
    let worker = DeviceWorker::spawn(MemoryDevice::new).unwrap();
    assert_eq!(idx.load_file_packed(&path, "", &worker).unwrap(), 1);
    match idx.lookup("crafted.1").unwrap() {
        Resource::Region(r) => assert_eq!(r.rect, Rect::new(0, 0, 2, 1)),
        other => panic!("expected a region, got {other:?}"),
    }

    assert_eq!(idx.load_file_prefix(&path, "raw/").unwrap(), 1);
    assert_eq!(idx.lookup("raw/crafted.1").unwrap().size(), (2, 1));
    let _ = std::fs::remove_dir_all(&dir);
}
