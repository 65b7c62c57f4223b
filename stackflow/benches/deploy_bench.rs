//! Benchmarks for reason classification and input parsing.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stackflow::config::{parse_parameters, InputSet};
use stackflow::deploy::NoOpClassifier;

fn classifier_benchmark(c: &mut Criterion) {
    let classifier = NoOpClassifier::new().with_phrase("No changes to deploy");
    let no_op = "The submitted information didn't contain changes. Submit different information to create a change set.";
    let failure = "Template format error: Unresolved resource dependencies [Bucket] in the Resources block of the template";

    c.bench_function("classify_no_op", |b| {
        b.iter(|| classifier.is_no_op(black_box(no_op)));
    });
    c.bench_function("classify_failure", |b| {
        b.iter(|| classifier.is_no_op(black_box(failure)));
    });
}

fn parsing_benchmark(c: &mut Criterion) {
    let overrides = "Env=prod,Subnets=subnet-a,Subnets=subnet-b,Subnets=subnet-c,Image=app:1.4.2,Debug=0";
    let roles = (0..20)
        .map(|i| format!("arn:aws:iam::123456789012:role/deploy-{i}"))
        .collect::<Vec<_>>()
        .join("\n");

    c.bench_function("parse_parameters", |b| {
        b.iter(|| parse_parameters(black_box(overrides)));
    });
    c.bench_function("input_set_per_stack", |b| {
        b.iter(|| InputSet::from_lines("role-arn", Some(black_box(roles.as_str())), 20));
    });
}

criterion_group!(benches, classifier_benchmark, parsing_benchmark);
criterion_main!(benches);
