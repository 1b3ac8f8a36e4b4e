//! Benchmark of whole-file conversion to UTF-16 and to a legacy codepage
//!
//! Run with: cargo bench --bench convert_benchmark

use std::fs;
use std::path::Path;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tempfile::TempDir;

use convert_text::{ConversionJob, EncodingDescriptor, LineEnding, convert};

/// Mostly Latin-1 text with a few characters windows-1252 cannot encode
fn generate_input(path: &Path, n_lines: usize) -> u64 {
    let mut text = String::from("\u{FEFF}");
    for i in 0..n_lines {
        if i % 50 == 0 {
            text.push_str("日本語 ");
        }
        text.push_str("Grüße aus Köln, line ");
        text.push_str(&i.to_string());
        text.push_str("\r\n");
    }
    fs::write(path, &text).unwrap();
    text.len() as u64
}

fn bench_convert(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut group = c.benchmark_group("convert");

    for n_lines in [1_000, 100_000] {
        let input = dir.path().join(format!("in_{n_lines}.txt"));
        let output = dir.path().join(format!("out_{n_lines}.txt"));
        let size = generate_input(&input, n_lines);
        group.throughput(Throughput::Bytes(size));

        let targets = [
            ("unicode", EncodingDescriptor::unicode()),
            ("utf8", EncodingDescriptor::utf8()),
            ("ansi_1252", EncodingDescriptor::ansi_codepage(1252).unwrap()),
        ];
        for (name, encoding) in targets {
            group.bench_with_input(BenchmarkId::new(name, n_lines), &input, |b, input| {
                b.iter(|| {
                    let job = ConversionJob::new(input, &output, encoding)
                        .with_line_ending(LineEnding::CrLf);
                    convert(job).unwrap()
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_convert);
criterion_main!(benches);
