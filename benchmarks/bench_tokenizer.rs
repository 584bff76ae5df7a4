use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use acctmerge::parsers::{assemble, scrub, tokenize};

fn bench_tokenize_plain(c: &mut Criterion) {
    let line = "23232,stark industries,Tony,5-12-2015";
    c.bench_function("tokenize_plain", |b| {
        b.iter(|| {
            black_box(tokenize(black_box(line)));
        });
    });
}

fn bench_tokenize_quoted(c: &mut Criterion) {
    let line = r#"23232,"stark, ""industries"", inc",Tony,5-12-2015"#;
    c.bench_function("tokenize_quoted", |b| {
        b.iter(|| {
            black_box(tokenize(black_box(line)));
        });
    });
}

fn bench_scrub(c: &mut Criterion) {
    let line = ",,,23232,stark industries,Tony,5-12-2015\r\n,,,";
    c.bench_function("scrub", |b| {
        b.iter(|| {
            black_box(scrub(black_box(line)));
        });
    });
}

fn bench_assemble(c: &mut Criterion) {
    let line = "23232,\"stark,industries\",Tony,5-12-2015";
    c.bench_function("assemble", |b| {
        b.iter(|| {
            let _ = black_box(assemble(black_box(line)));
        });
    });
}

criterion_group!(
    benches,
    bench_tokenize_plain,
    bench_tokenize_quoted,
    bench_scrub,
    bench_assemble
);
criterion_main!(benches);
