//! Classification Benchmarks
//!
//! Measures the hot paths that run per message or per inbox task:
//! - Expertise keyword matching
//! - Mention extraction
//! - Router prompt construction

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use mc_core::routing::{ExpertiseTable, extract_mentions};

fn bench_expertise(c: &mut Criterion) {
    let table = ExpertiseTable::default();
    let mut group = c.benchmark_group("expertise");

    let samples = [
        ("short_match", "Zapłać fakturę VAT"),
        ("short_fallback", "Something nobody has a keyword for"),
        (
            "long_mixed",
            "Przygotuj kampanię launch na blog, sprawdź GSC, potem fix bug w api i zaplanuj spotkanie \
             w kalendarzu. Na koniec rozliczenie podatku i sprawdzenie portfolio BTC.",
        ),
    ];

    for (name, text) in samples {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("classify", name), text, |b, text| {
            b.iter(|| table.classify(black_box(text)))
        });
    }

    group.finish();
}

fn bench_mentions(c: &mut Criterion) {
    let mut group = c.benchmark_group("mentions");

    for count in [0usize, 1, 10].iter() {
        let content: String = (0..*count)
            .map(|i| format!("@agent{} ", i))
            .chain(std::iter::once("please take a look at the deploy".to_string()))
            .collect();
        group.bench_with_input(BenchmarkId::new("extract", count), &content, |b, content| {
            b.iter(|| extract_mentions(black_box(content)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_expertise, bench_mentions);
criterion_main!(benches);
