use codegraph_parser::CParser;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SAMPLE_SOURCE: &str = r#"
#include <stdio.h>
#include "util.h"

struct node { int value; struct node *next; };

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

fn bench_parse_source(c: &mut Criterion) {
    let parser = CParser::new();
    c.bench_function("parse_source_small_file", |b| {
        b.iter(|| parser.parse_source(black_box("sample.c"), black_box(SAMPLE_SOURCE)).unwrap())
    });
}

criterion_group!(benches, bench_parse_source);
criterion_main!(benches);
