use codegraph_graph::{digest_edge, function_key, module_name_for_path};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_key_derivation(c: &mut Criterion) {
    c.bench_function("function_key_derivation", |b| {
        b.iter(|| {
            function_key(
                black_box("auto_deadbeefcafe"),
                black_box("handle_request"),
                black_box("src/server/handler.c"),
            )
        })
    });

    c.bench_function("digest_edge_derivation", |b| {
        b.iter(|| digest_edge(black_box("calls"), black_box("caller-key"), black_box("callee")))
    });

    c.bench_function("module_name_for_path", |b| {
        b.iter(|| module_name_for_path(black_box("lib/net/socket.c")))
    });
}

criterion_group!(benches, bench_key_derivation);
criterion_main!(benches);
