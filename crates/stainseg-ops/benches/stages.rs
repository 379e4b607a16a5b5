use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stainseg_core::{Mask, RgbImage, ScalarImage};
use stainseg_ops::{blur, extract, threshold, trace, ChannelMethod};

fn synthetic_rgb(w: usize, h: usize) -> RgbImage {
    let mut img = RgbImage::filled(w, h, [240, 235, 245]);
    for y in 0..h {
        for x in 0..w {
            let dx = (x % 64) as i32 - 32;
            let dy = (y % 64) as i32 - 32;
            if dx * dx + dy * dy < 300 {
                img.put_pixel(x, y, [90, 60, 120]);
            }
        }
    }
    img
}

fn bench_stages(c: &mut Criterion) {
    let rgb = synthetic_rgb(1024, 1024);
    let od = extract(&rgb.view(), ChannelMethod::OpticalDensitySum, None, "")
        .unwrap_or_else(|_| ScalarImage::new_fill(1024, 1024, 0.0));
    let mask = threshold(&od)
        .map(|r| r.mask)
        .unwrap_or_else(|| Mask::new(1024, 1024));

    c.bench_function("od_sum_1024", |b| {
        b.iter(|| extract(black_box(&rgb.view()), ChannelMethod::OpticalDensitySum, None, ""))
    });
    c.bench_function("blur_sigma5_1024", |b| {
        b.iter(|| blur(black_box(&od), 5.0, 1.0))
    });
    c.bench_function("otsu_1024", |b| b.iter(|| threshold(black_box(&od))));
    c.bench_function("trace_1024", |b| b.iter(|| trace(black_box(&mask))));
}

criterion_group!(benches, bench_stages);
criterion_main!(benches);
