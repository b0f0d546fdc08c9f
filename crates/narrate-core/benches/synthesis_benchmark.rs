use std::path::Path;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use narrate_core::text::split_segments;
use narrate_core::{
    sanitize_identity, AudioWriter, ChunkStream, NarrateResult, SpeechBackend, TtsConfig,
    TtsEngine, VoicePipeline,
};
use tempfile::TempDir;

/// Backend producing a fixed tone per text segment, so the benchmark measures
/// the orchestration around generation rather than a model
struct ToneBackend;

struct TonePipeline;

impl VoicePipeline for TonePipeline {
    fn generate<'a>(&'a self, text: &'a str, _voice_path: &'a Path) -> NarrateResult<ChunkStream<'a>> {
        Ok(Box::new(split_segments(text).into_iter().map(|segment| -> NarrateResult<Vec<f32>> {
            let len = segment.len() * 240;
            Ok((0..len).map(|i| (i as f32 * 0.03).sin() * 0.4).collect())
        })))
    }
}

impl SpeechBackend for ToneBackend {
    type Model = ();
    type Pipeline = TonePipeline;

    fn load_model(&self, _config_path: &Path, _weights_path: &Path) -> NarrateResult<()> {
        Ok(())
    }

    fn build_pipeline(&self, _model: Arc<()>, _voice: &str) -> NarrateResult<TonePipeline> {
        Ok(TonePipeline)
    }
}

fn warm_engine(root: &Path) -> TtsEngine<ToneBackend> {
    let model_dir = root.join("model");
    std::fs::create_dir_all(model_dir.join("voices")).unwrap();
    for name in ["config.json", "kokoro-v1_0.pth", "voices/af_heart.pt"] {
        std::fs::write(model_dir.join(name), b"local").unwrap();
    }

    let config = TtsConfig {
        model_dir,
        audio_root: root.join("audio"),
        ..TtsConfig::default()
    };
    let engine = TtsEngine::new(config, ToneBackend).unwrap();
    engine.preload(["af_heart"]).unwrap();
    engine
}

fn bench_warm_synthesis(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let engine = warm_engine(temp.path());

    let mut group = c.benchmark_group("warm_synthesis");
    let test_texts = vec![
        ("short", "Hello world".to_string()),
        ("medium", "This is a medium length text. It has a few sentences! Does it work?".to_string()),
        ("long", "A much longer passage to exercise segmentation and writing. ".repeat(20)),
    ];

    for (name, text) in &test_texts {
        group.bench_with_input(BenchmarkId::new("synthesize", name), text, |b, text| {
            b.iter(|| {
                let result = engine.synthesize(black_box(text), Some("af_heart"), "bench");
                black_box(result.unwrap())
            });
        });
    }

    group.finish();
}

fn bench_wav_writing(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bench.wav");
    let writer = AudioWriter::default();
    let samples: Vec<f32> = (0..24_000).map(|i| (i as f32 * 0.01).sin()).collect();

    c.bench_function("write_wav_one_second", |b| {
        b.iter(|| writer.write_wav(black_box(&samples), &path).unwrap());
    });
}

fn bench_text_helpers(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_helpers");

    group.bench_function("sanitize_identity", |b| {
        b.iter(|| sanitize_identity(black_box("someone.with+tags@example.co.uk")));
    });

    let passage = "First sentence here. Second one follows! A question? Then a list: a, b, c. ".repeat(50);
    group.bench_function("split_segments", |b| {
        b.iter(|| split_segments(black_box(&passage)));
    });

    group.finish();
}

criterion_group!(benches, bench_warm_synthesis, bench_wav_writing, bench_text_helpers);
criterion_main!(benches);
