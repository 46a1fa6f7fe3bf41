mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pyscript::{Config, Interpreter, OutputBuffer};

fn bench_interpreter(c: &mut Criterion) {
    for (label, source) in common::workloads() {
        c.bench_function(&format!("interpreter_total_{label}"), |b| {
            b.iter(|| {
                let mut interpreter =
                    Interpreter::new(Config::default()).with_stdout(OutputBuffer::new());
                let status = interpreter.run_source("bench.pys", black_box(&source));
                assert_eq!(status, 0, "{label} failed");
                black_box(status);
            })
        });
    }
}

criterion_group!(benches, bench_interpreter);
criterion_main!(benches);
