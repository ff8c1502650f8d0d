use codegraph_core::Chunker;
use codegraph_vector::{CChunker, TokenChunker};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SAMPLE_SOURCE: &str = r#"
#include <stdio.h>
#include "util.h"

struct node { int value; struct node *next; };

/* doubles a value */
static int helper(int x) {
    return x * 2;
}

int sum_list(struct node *head) {
    int total = 0;
    struct node *cur = head;
    while (cur != NULL) {
        total += helper(cur->value);
        cur = cur->next;
    }
    return total;
}

int fact(int n) {
    if (n <= 1) return 1;
    return n * fact(n - 1);
}
"#;

fn bench_token_chunking(c: &mut Criterion) {
    let chunker = TokenChunker::new();
    c.bench_function("token_chunk_small_file", |b| {
        b.iter(|| chunker.chunk_file(black_box("sample.c"), black_box(SAMPLE_SOURCE)).unwrap())
    });
}

fn bench_semantic_chunking(c: &mut Criterion) {
    let chunker = CChunker::new();
    c.bench_function("semantic_chunk_small_file", |b| {
        b.iter(|| chunker.chunk_file(black_box("sample.c"), black_box(SAMPLE_SOURCE)).unwrap())
    });
}

criterion_group!(benches, bench_token_chunking, bench_semantic_chunking);
criterion_main!(benches);
