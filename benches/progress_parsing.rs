//! Benchmarks for combiner output parsing
//!
//! The progress parser runs on every stderr line of every running job, so it
//! sits on the hot path of the supervisor.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hf_av::parse_progress_line;
use hf_av::probe::parse_duration_output;
use std::time::Duration;

const STATS_LINE: &str = "frame= 1200 fps=240 q=-1.0 size=   10240kB time=00:00:50.04 \
                          bitrate=1676.4kbits/s speed=10.0x    ";

const BANNER_LINES: &[&str] = &[
    "Input #0, hls, from 'http://jellyfin:8096/videos/abc/master.m3u8':",
    "  Duration: 01:52:13.44, start: 1.400000, bitrate: 0 kb/s",
    "  Stream #0:0: Video: h264 (High), yuv420p(tv, bt709), 1920x1080, 23.98 fps",
    "  Stream #0:1: Audio: aac (LC), 48000 Hz, stereo, fltp",
    "Output #0, mp4, to '/cache/8b0c6d1e.mp4':",
    "Press [q] to stop, [?] for help",
];

/// A realistic stderr transcript: banner followed by many stats updates.
fn transcript(updates: usize) -> Vec<String> {
    let mut lines: Vec<String> = BANNER_LINES.iter().map(|s| s.to_string()).collect();
    for i in 0..updates {
        let secs = i * 2;
        lines.push(format!(
            "frame={:5} fps=240 q=-1.0 size={:8}kB time={:02}:{:02}:{:02}.{:02} bitrate=1676.4kbits/s speed={}.{}x",
            i * 48,
            i * 400,
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            i % 100,
            8 + i % 4,
            i % 10
        ));
    }
    lines
}

fn bench_single_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_progress_line");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("stats_line", |b| {
        b.iter(|| parse_progress_line(black_box(STATS_LINE), black_box(Some(6733.0))))
    });

    group.bench_function("stats_line_unknown_duration", |b| {
        b.iter(|| parse_progress_line(black_box(STATS_LINE), black_box(None)))
    });

    group.bench_function("banner_line", |b| {
        b.iter(|| parse_progress_line(black_box(BANNER_LINES[2]), black_box(Some(6733.0))))
    });

    group.finish();
}

fn bench_transcript(c: &mut Criterion) {
    let lines = transcript(3000);
    let mut group = c.benchmark_group("transcript");
    group.throughput(Throughput::Elements(lines.len() as u64));

    group.bench_function("parse_all", |b| {
        b.iter(|| {
            lines
                .iter()
                .filter_map(|l| parse_progress_line(black_box(l), Some(6733.0)))
                .count()
        })
    });

    group.finish();
}

fn bench_duration_output(c: &mut Criterion) {
    c.bench_function("parse_duration_output", |b| {
        b.iter(|| parse_duration_output(black_box("6733.440000\n")))
    });
}

criterion_group!(benches, bench_single_line, bench_transcript, bench_duration_output);
criterion_main!(benches);
