use ask_pdf::chunking::{ChunkingConfig, SplitterStrategy, split_text};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const PARAGRAPH: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.
Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.
Duis aute irure dolor in reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur.
Excepteur sint occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit anim id est laborum.

";

pub fn criterion_benchmark(c: &mut Criterion) {
    // Roughly a 100 page document
    let content = PARAGRAPH.repeat(800);

    for strategy in [SplitterStrategy::Fixed, SplitterStrategy::Recursive] {
        let config = ChunkingConfig {
            strategy,
            ..ChunkingConfig::default()
        };
        c.bench_function(&format!("chunking_{}", strategy), |b| {
            b.iter(|| split_text(black_box(&content), black_box(&config)))
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
