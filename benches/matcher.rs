use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reel::fingerprint::fingerprint;
use reel::intercept::Interceptor;
use reel::{CassetteEntry, HttpRequest, ReplayOptions};
use serde_json::json;

fn entries(count: usize) -> Vec<CassetteEntry> {
    (0..count)
        .map(|i| CassetteEntry {
            scope: "http://api.local:80".to_string(),
            method: "GET".to_string(),
            path: format!("/items/{i}"),
            body: None,
            reqheaders: None,
            status: 200,
            response: json!({ "id": i }),
            response_is_binary: false,
            response_headers: vec![("content-type".to_string(), "application/json".to_string())],
        })
        .collect()
}

fn bench_intercept_last_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("intercept");

    for count in [10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let interceptor = Interceptor::new(entries(count), &ReplayOptions::default()).unwrap();
            let request = HttpRequest::get(&format!("http://api.local/items/{}", count - 1))
                .unwrap()
                .prepared();

            b.iter(|| interceptor.intercept(black_box(&request)).unwrap());
        });
    }

    group.finish();
}

fn bench_fingerprint_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for size in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let body = vec![b'x'; size];

            b.iter(|| {
                fingerprint(
                    black_box("http://api.local:80"),
                    black_box("POST"),
                    black_box("/api/test"),
                    black_box(Some(body.as_slice())),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_intercept_last_entry, bench_fingerprint_sizes);
criterion_main!(benches);
