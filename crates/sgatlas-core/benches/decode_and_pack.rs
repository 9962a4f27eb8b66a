use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use image::RgbaImage;
use sgatlas_core::prelude::*;
use std::hint::black_box;

/// Container with `count` sprites of random sizes, each row a single full-width run.
fn generate_container(count: usize) -> Vec<u8> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut builder = ContainerBuilder::new(0xd5).bitmap("bench.bmp", "");
    for _ in 0..count {
        let w: u8 = rng.gen_range(8..=64);
        let h: u8 = rng.gen_range(8..=64);
        let mut data = Vec::new();
        for _ in 0..h {
            data.extend_from_slice(&[1, 0, w]);
            data.extend((0..w as usize * 2).map(|_| rng.r#gen::<u8>() & 0x7f));
        }
        let record = ImageRecord {
            width: w as i16,
            height: h as i16,
            image_type: 256,
            ..Default::default()
        };
        builder = builder.image(record, data, Vec::new());
    }
    builder.build().inline
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_container");
    let cfg = DecoderConfig::default();
    for count in [50usize, 200, 500] {
        let bytes = generate_container(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("sprites", count), &bytes, |b, bytes| {
            b.iter(|| {
                let file = SgFile::parse(bytes, &cfg).unwrap();
                black_box(file.decode_all(&PixelSources::inline(bytes), &cfg, "bench"))
            });
        });
    }
    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("strip_pack");
    for count in [50usize, 200, 500] {
        let inputs: Vec<InputGraphic> = (0..count)
            .map(|i| InputGraphic {
                key: format!("g{i}"),
                graphic: DecodedGraphic::new(RgbaImage::new(16 + (i % 48) as u32, 32)),
            })
            .collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("compose", count), &inputs, |b, inputs| {
            b.iter(|| black_box(pack_graphics(inputs.clone()).unwrap().rgba));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_pack);
criterion_main!(benches);
