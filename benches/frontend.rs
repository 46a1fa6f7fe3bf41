mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pyscript::parser::{self, Mode};
use pyscript::{lexer, validator};

fn bench_frontend(c: &mut Criterion) {
    for (label, source) in common::workloads() {
        let tokens = lexer::tokenize(&source).expect("tokenize");

        c.bench_function(&format!("frontend_tokenize_{label}"), |b| {
            b.iter(|| {
                let out = lexer::tokenize(black_box(&source)).expect("tokenize");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_parse_only_{label}"), |b| {
            b.iter(|| {
                let out = parser::parse(black_box(tokens.clone()), Mode::Exec).expect("parse");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_full_{label}"), |b| {
            b.iter(|| {
                let tokens = lexer::tokenize(black_box(&source)).expect("tokenize");
                let node = parser::parse(tokens, Mode::Exec).expect("parse");
                validator::validate(&node).expect("validate");
                black_box(node);
            })
        });
    }
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
