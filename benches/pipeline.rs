use criterion::{black_box, criterion_group, criterion_main, Criterion};
use effectors::{
    effector_fn, CircuitBreaker, CircuitBreakerConfig, Context, Effector, EffectorError, Noop,
    Pipeline, Protector, Retrier,
};
use std::time::Duration;

fn protector_overhead(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let protected = Protector::new(Noop);
    let ctx = Context::new();

    c.bench_function("protector_noop", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(protected.invoke(black_box(&ctx)).await);
        });
    });
}

fn circuit_breaker_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = Context::new();

    let healthy = CircuitBreaker::new(10, Duration::from_secs(30), Noop).unwrap();
    c.bench_function("circuit_breaker_success", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(healthy.invoke(black_box(&ctx)).await);
        });
    });

    // Opens on the first failure; every later call is rejected without running the action.
    let failing = effector_fn(|_ctx| async { Err(EffectorError::inner("boom")) });
    let open = CircuitBreaker::new(1, Duration::from_secs(3600), failing).unwrap();
    c.bench_function("circuit_breaker_open", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(open.invoke(black_box(&ctx)).await);
        });
    });
}

fn full_pipeline(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = Context::new();
    let pipeline = Pipeline::new(Noop)
        .protect()
        .circuit_breaker(CircuitBreakerConfig::new(5, Duration::from_secs(30)).unwrap())
        .timeout(Duration::from_secs(1))
        .retry(Retrier::builder().max_retries(3).build())
        .build();

    c.bench_function("pipeline_success", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(pipeline.invoke(black_box(&ctx)).await);
        });
    });
}

criterion_group!(benches, protector_overhead, circuit_breaker_throughput, full_pipeline);
criterion_main!(benches);
