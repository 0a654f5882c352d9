use criterion::{Criterion, black_box, criterion_group, criterion_main};
use fd_kernel::{flatten, flatten_seq};

const NUM_PROJ: usize = 180;
const NUM_ROWS: usize = 64;
const ORIG_NUM_DETECTORS: usize = 512;
const NUM_COLS: usize = 600;

fn build_inputs() -> (Vec<f32>, Vec<f64>) {
    let mut proj = Vec::with_capacity(NUM_PROJ * NUM_ROWS * ORIG_NUM_DETECTORS);
    for i in 0..(NUM_PROJ * NUM_ROWS * ORIG_NUM_DETECTORS) {
        proj.push((i % 251) as f32);
    }

    // Slightly wider than the curved detector so both clamps are exercised.
    let scale = (ORIG_NUM_DETECTORS as f64 + 8.0) / NUM_COLS as f64;
    let angles = (0..NUM_COLS).map(|j| j as f64 * scale - 4.0).collect();
    (proj, angles)
}

fn bench_flatten_parallel(c: &mut Criterion) {
    let (proj, angles) = build_inputs();
    let mut out = vec![0.0f32; NUM_PROJ * NUM_ROWS * NUM_COLS];

    c.bench_function("flatten_par_180x64x512_to_600", |b| {
        b.iter(|| {
            flatten(
                black_box(&proj),
                black_box(&angles),
                &mut out,
                NUM_PROJ,
                NUM_ROWS,
                ORIG_NUM_DETECTORS,
                NUM_COLS,
            );
            black_box(&out);
        });
    });
}

fn bench_flatten_sequential(c: &mut Criterion) {
    let (proj, angles) = build_inputs();
    let mut out = vec![0.0f32; NUM_PROJ * NUM_ROWS * NUM_COLS];

    c.bench_function("flatten_seq_180x64x512_to_600", |b| {
        b.iter(|| {
            flatten_seq(
                black_box(&proj),
                black_box(&angles),
                &mut out,
                NUM_PROJ,
                NUM_ROWS,
                ORIG_NUM_DETECTORS,
                NUM_COLS,
            );
            black_box(&out);
        });
    });
}

criterion_group!(benches, bench_flatten_parallel, bench_flatten_sequential);
criterion_main!(benches);
