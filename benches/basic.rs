use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serial_binding::buffer::{from_native, to_native};
use std::hint::black_box;
use std::time::Duration;

pub fn bench_buffer_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer");
    for size in [16usize, 512, 4096] {
        let payload = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("to_native", size), &payload, |b, data| {
            b.iter(|| black_box(to_native(black_box(data)).unwrap()))
        });

        let native = to_native(&payload).unwrap();
        group.bench_with_input(BenchmarkId::new("from_native", size), &native, |b, buf| {
            b.iter(|| black_box(from_native(black_box(buf)).unwrap()))
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_buffer_conversion
}
criterion_main!(benches);
