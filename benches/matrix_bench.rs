use std::hint::black_box;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use video_quality::{
    Clip, EncoderPair, LayerConfig, generate_jobs, parse_frame_stats, parse_ssim_summary,
};

fn clip(name: &str, width: u32, height: u32) -> Arc<Clip> {
    Arc::new(Clip {
        input_path: PathBuf::from(name),
        yuv_path: PathBuf::from(name),
        width,
        height,
        fps: 30.0,
        sha256: String::new(),
        total_frames: 300,
        frame_offset: 0,
        frames: 300,
    })
}

fn matrix_benchmark(c: &mut Criterion) {
    let clips = [
        clip("foreman_cif.yuv", 352, 288),
        clip("vga.yuv", 640, 480),
        clip("720p.yuv", 1280, 720),
        clip("1080p.yuv", 1920, 1080),
    ];
    let single = EncoderPair::parse_list("libvpx-rt:vp8,libvpx-rt:vp9,openh264:h264,yami:vp9")
        .expect("encoder list");
    let layered = EncoderPair::parse_list("libvpx-rt:vp8,libvpx-rt:vp9").expect("encoder list");

    let mut group = c.benchmark_group("generate_jobs");
    for (label, pairs, temporal) in [("1tl", &single, 1), ("3tl", &layered, 3)] {
        let layers = LayerConfig::new(1, temporal).expect("layers");
        group.bench_with_input(BenchmarkId::from_parameter(label), &layers, |b, &layers| {
            b.iter(|| generate_jobs(black_box(&clips), pairs, layers).expect("jobs"));
        });
    }
    group.finish();
}

fn parser_benchmark(c: &mut Criterion) {
    let summary = "AvgPSNR: 35.21\nAvgPSNR-Y: 34.10\nAvgPSNR-U: 40.2\nAvgPSNR-V: 41.0\n\
                   GlbPSNR: 35.00\nSSIM: 0.9512\nSSIM-Y: 0.94\nVpxSSIM: 81.2\nNframes: 300\n";
    let mut csv = String::from("psnr,ssim,psnr-y\n");
    for frame in 0..3000 {
        csv.push_str(&format!("{}.5,0.9{},{}.25\n", 30 + frame % 7, frame % 10, 31 + frame % 5));
    }

    let mut group = c.benchmark_group("tool_output");
    group.measurement_time(Duration::from_secs(5));
    group.bench_function("ssim_summary", |b| {
        b.iter(|| parse_ssim_summary(black_box(summary)).expect("summary"));
    });
    group.throughput(Throughput::Bytes(csv.len() as u64));
    group.bench_function("frame_stats_3000", |b| {
        b.iter(|| parse_frame_stats::<f64>(black_box(&csv), "bench").expect("csv"));
    });
    group.finish();
}

criterion_group!(benches, matrix_benchmark, parser_benchmark);
criterion_main!(benches);
