//! VM micro-benchmarks: pipeline cost and hot-loop throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quill_script::Quill;

const FIB: &str = "\
fun fib(n) { if (n < 2) { return n }\nreturn fib(n - 1) + fib(n - 2) }
fib(15)";

const LOOP_SUM: &str = "\
var s = 0
for (var i = 0; i < 1000; i++) { s = s + i }
s";

const STRUCT_CHURN: &str = "\
var s = { n: 0 }
for (var i = 0; i < 200; i++) { s.n = s.n + i\ns['extra'] = i }
s.n";

fn bench_eval(c: &mut Criterion) {
    c.bench_function("fib_15", |b| {
        b.iter(|| {
            let mut quill = Quill::new();
            black_box(quill.eval(black_box(FIB)).expect("fib"));
        })
    });

    c.bench_function("loop_sum_1000", |b| {
        b.iter(|| {
            let mut quill = Quill::new();
            black_box(quill.eval(black_box(LOOP_SUM)).expect("loop"));
        })
    });

    c.bench_function("struct_churn", |b| {
        b.iter(|| {
            let mut quill = Quill::new();
            black_box(quill.eval(black_box(STRUCT_CHURN)).expect("struct"));
        })
    });
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_fib", |b| {
        b.iter(|| {
            let mut quill = Quill::new();
            black_box(quill.compile(black_box(FIB)).expect("compile"));
        })
    });
}

criterion_group!(benches, bench_eval, bench_compile);
criterion_main!(benches);
