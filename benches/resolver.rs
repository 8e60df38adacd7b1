use caption_sync::transcript::{resolve, upcoming, ActiveSegmentTracker, Segment, SrtParser, SrtWriter, Transcript};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn transcript(count: usize) -> Transcript {
    let segments = (0..count)
        .map(|i| Segment::new(i as f64 * 3.0, 2.5, format!("caption line {}", i + 1)))
        .collect();
    Transcript::from_segments("dQw4w9WgXcQ", segments)
}

fn bench_resolve(c: &mut Criterion) {
    let small = transcript(100);
    let large = transcript(5_000);

    c.bench_function("resolve_small_transcript", |b| {
        b.iter(|| black_box(resolve(&small.segments, black_box(151.0))))
    });

    c.bench_function("resolve_large_transcript_tail", |b| {
        b.iter(|| black_box(resolve(&large.segments, black_box(14_990.0))))
    });

    c.bench_function("resolve_gap", |b| {
        b.iter(|| black_box(resolve(&large.segments, black_box(2.75))))
    });

    c.bench_function("upcoming_three", |b| {
        b.iter(|| black_box(upcoming(&large.segments, black_box(7_500.0), 3)))
    });
}

fn bench_tracker(c: &mut Criterion) {
    let transcript = transcript(1_000);

    // One simulated hour of 1 Hz ticks
    c.bench_function("tracker_playback_ticks", |b| {
        b.iter(|| {
            let mut tracker = ActiveSegmentTracker::new();
            for second in 0..3_000 {
                black_box(tracker.update(&transcript, second as f64));
            }
        })
    });
}

fn bench_srt(c: &mut Criterion) {
    let transcript = transcript(1_000);
    let rendered = SrtWriter::from_transcript(&transcript).generate();

    c.bench_function("srt_generate_1000", |b| {
        b.iter(|| black_box(SrtWriter::from_transcript(&transcript).generate()))
    });

    c.bench_function("srt_parse_1000", |b| {
        b.iter(|| black_box(SrtParser::parse(&rendered)))
    });
}

criterion_group!(benches, bench_resolve, bench_tracker, bench_srt);
criterion_main!(benches);
