use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use speakwave_core::{
    decode_payload, encode_in_background, encode_wav, AudioConfig, DecodedAudioBuffer,
    OfflineDevice, OutputDevice, PcmFormat,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

const LENGTHS: [(&str, usize); 3] = [
    ("1sec", 24_000),   // 1 second at 24kHz
    ("5sec", 120_000),  // 5 seconds
    ("10sec", 240_000), // 10 seconds
];

fn payload(frames: usize) -> String {
    let bytes: Vec<u8> = (0..frames)
        .map(|i| ((i as f32 * 0.001).sin() * 16_000.0) as i16)
        .flat_map(i16::to_le_bytes)
        .collect();
    STANDARD.encode(bytes)
}

fn buffer(frames: usize) -> DecodedAudioBuffer {
    let samples = (0..frames).map(|i| (i as f32 * 0.001).sin() * 0.5).collect();
    DecodedAudioBuffer::mono(samples, 24_000).unwrap()
}

fn bench_payload_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_decoding");

    for (name, frames) in LENGTHS {
        let text = payload(frames);
        group.bench_with_input(BenchmarkId::new("decode_payload", name), &text, |b, text| {
            b.iter(|| black_box(decode_payload(black_box(text)).unwrap()));
        });
    }

    group.finish();
}

fn bench_wav_encoding(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("wav_encoding");

    for (name, frames) in LENGTHS {
        let audio = Arc::new(buffer(frames));

        group.bench_with_input(BenchmarkId::new("encode_wav", name), &audio, |b, audio| {
            b.iter(|| black_box(encode_wav(black_box(audio)).unwrap()));
        });

        // Includes the blocking-pool hop
        group.bench_with_input(BenchmarkId::new("encode_in_background", name), &audio, |b, audio| {
            b.to_async(&rt).iter(|| async {
                black_box(encode_in_background(Arc::clone(audio)).await.unwrap())
            });
        });
    }

    group.finish();
}

fn bench_offline_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("offline_rendering");
    let audio = Arc::new(buffer(240_000));

    for block_size in [128, 1024, 4096] {
        group.bench_with_input(BenchmarkId::new("render", block_size), &block_size, |b, &frames| {
            b.iter_batched(
                || {
                    let device = OfflineDevice::new(AudioConfig::default());
                    let source = device.create_source(Arc::clone(&audio)).unwrap();
                    device.connect(source, device.destination()).unwrap();
                    device.start(source, 0).unwrap();
                    device
                },
                |device| black_box(device.render(frames)),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_format_checks(c: &mut Criterion) {
    c.bench_function("pcm_format_validation", |b| {
        b.iter(|| black_box(black_box(PcmFormat::PROVIDER).ensure_supported()));
    });
}

criterion_group!(
    benches,
    bench_payload_decoding,
    bench_wav_encoding,
    bench_offline_rendering,
    bench_format_checks
);
criterion_main!(benches);
