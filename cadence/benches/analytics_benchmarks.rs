use std::hint::black_box;

use cadence::KeyStroke;
use cadence::analytics::{
    burst_wpm, calculate_consistency, calculate_wpm, temporal_map, text_complexity, weakest_keys,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

/// A stream with a 10% error rate, one press every 50-90ms, each released after 40ms
fn keystrokes(count: usize) -> Vec<KeyStroke> {
    let alphabet: Vec<char> = ('a'..='z').collect();
    let mut press = 0;

    (0..count)
        .map(|i| {
            let expected = alphabet[i % alphabet.len()];
            let key = if i % 10 == 0 { 'x' } else { expected };
            press += 50 + (i as u64 * 7) % 40;

            let mut stroke = KeyStroke::new(key, expected, press);
            stroke.release_time = Some(press + 40);
            stroke
        })
        .collect()
}

fn benchmark_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("speed");

    for count in [100, 1000, 10000] {
        let strokes = keystrokes(count);
        let total_time = strokes.last().map_or(0, |s| s.press_time as i64);

        group.bench_with_input(BenchmarkId::new("wpm", count), &strokes, |b, strokes| {
            b.iter(|| calculate_wpm(black_box(strokes), black_box(total_time)))
        });

        group.bench_with_input(BenchmarkId::new("burst_wpm", count), &strokes, |b, strokes| {
            b.iter(|| burst_wpm(black_box(strokes), black_box(10)))
        });
    }

    group.finish();
}

fn benchmark_rhythm(c: &mut Criterion) {
    let mut group = c.benchmark_group("rhythm");

    for count in [100, 1000, 10000] {
        let strokes = keystrokes(count);

        group.bench_with_input(
            BenchmarkId::new("consistency", count),
            &strokes,
            |b, strokes| b.iter(|| calculate_consistency(black_box(strokes))),
        );

        group.bench_with_input(
            BenchmarkId::new("temporal_map", count),
            &strokes,
            |b, strokes| b.iter(|| temporal_map(black_box(strokes))),
        );

        group.bench_with_input(
            BenchmarkId::new("weakest_keys", count),
            &strokes,
            |b, strokes| b.iter(|| weakest_keys(black_box(strokes))),
        );
    }

    group.finish();
}

fn benchmark_text_complexity(c: &mut Criterion) {
    let texts = [
        ("plain", "the quick brown fox jumps over the lazy dog ".repeat(20)),
        (
            "code",
            "fn main() { let x: Vec<u8> = vec![1, 2, 3]; println!(\"{x:?}\"); } ".repeat(20),
        ),
    ];

    let mut group = c.benchmark_group("text_complexity");
    for (name, text) in &texts {
        group.bench_with_input(BenchmarkId::from_parameter(name), text, |b, text| {
            b.iter(|| text_complexity(black_box(text)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_speed,
    benchmark_rhythm,
    benchmark_text_complexity
);
criterion_main!(benches);
