use image::RgbaImage;
use sgatlas_core::prelude::*;
use std::sync::{Arc, Mutex};

#[test]
fn jobs_run_on_one_named_thread_in_order() {
    let worker = DeviceWorker::spawn(MemoryDevice::new).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for i in 0..5 {
        let seen = Arc::clone(&seen);
        worker
            .run_detached(move |_| seen.lock().unwrap().push(i))
            .unwrap();
    }
    let names: Vec<Option<String>> = (0..2)
        .map(|_| {
            worker
                .run_sync(|_| std::thread::current().name().map(String::from))
                .unwrap()
        })
        .collect();
    assert_eq!(names, vec![Some("sgatlas-device".to_string()); 2]);
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn upload_and_release_through_the_worker() {
    let worker = DeviceWorker::spawn(MemoryDevice::new).unwrap();
    let out = pack_graphics(vec![
        InputGraphic {
            key: "a".into(),
            graphic: DecodedGraphic::new(RgbaImage::new(1, 2)),
        },
        InputGraphic {
            key: "b".into(),
            graphic: DecodedGraphic::new(RgbaImage::new(2, 1)),
        },
    ])
    .unwrap();
    let regions = upload_atlas(&worker, out).unwrap();
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].0, "a");
    assert_eq!(regions[1].1.rect, Rect::new(1, 0, 2, 1));
    let surface = regions[0].1.surface;
    assert_eq!(regions[1].1.surface, surface);

    let dims = worker
        .run_sync(move |d| d.surface(surface).map(|s| s.dimensions()))
        .unwrap();
    assert_eq!(dims, Some((3, 2)));

    worker.run_detached(move |d| d.release(surface)).unwrap();
    assert_eq!(worker.run_sync(|d| d.len()).unwrap(), 0);
}

#[test]
fn device_errors_pass_through() {
    let worker = DeviceWorker::spawn(|| MemoryDevice::with_max_surface_size(2)).unwrap();
    let out = pack_layout(vec![("x", 3u32, 1u32)]).map(|layout| PackOutput {
        rgba: RgbaImage::new(layout.width, layout.height),
        layout,
    });
    let err = upload_atlas(&worker, out.unwrap()).unwrap_err();
    assert!(matches!(err, SgError::OutOfSpace));
}

#[test]
fn panicked_worker_reports_closed() {
    let worker = DeviceWorker::spawn(MemoryDevice::new).unwrap();
    worker
        .run_detached(|_| panic!("device lost"))
        .unwrap();
    let err = worker.run_sync(|d| d.len()).unwrap_err();
    assert!(matches!(err, SgError::DeviceClosed));
}
