use criterion::{black_box, criterion_group, criterion_main, Criterion};
use minijs::new_interpreter;

const FIBONACCI: &str = r#"
function fibonacci(x) {
  if (x === 0) {
    return 0;
  }
  if (x === 1) {
    return 1;
  }
  return fibonacci(x - 1) + fibonacci(x - 2);
}

fibonacci(20);
"#;

const ARRAYS: &str = r#"
let values = [];
for (let i = 0; i < 2000; i++) {
  values.push((i * 7919) % 1000);
}
values
  .map((x) => x * 2)
  .filter((x) => x % 3 !== 0)
  .sort((a, b) => a - b)
  .reduce((sum, x) => sum + x, 0);
"#;

fn fib_benchmark(c: &mut Criterion) {
    c.bench_function("fibonacci", |b| {
        b.iter(|| {
            let mut engine = new_interpreter();
            engine.run(black_box(FIBONACCI)).unwrap();
        })
    });
}

fn array_benchmark(c: &mut Criterion) {
    c.bench_function("arrays", |b| {
        b.iter(|| {
            let mut engine = new_interpreter();
            engine.run(black_box(ARRAYS)).unwrap();
        })
    });
}

criterion_group!(benches, fib_benchmark, array_benchmark);
criterion_main!(benches);
