use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rhobs_common::rbac::{Permission, Resource, TenantId};
use rhobs_manifests::clusters::catalog::default_clusters;
use rhobs_manifests::manifests::{gateway, thanos};
use rhobs_manifests::rbac::catalog::{environment_grants, environment_rbac};
use rhobs_manifests::rbac::{generate_rbac, Environment, Grant};
use rhobs_manifests::template::keys::QUERY;
use rhobs_manifests::template::{default_base_template, Replicas, TemplateOverride, Versions};
use std::time::Duration;

// Benchmark configuration
const SMALL_DATASET: usize = 10;
const MEDIUM_DATASET: usize = 100;
const LARGE_DATASET: usize = 1000;

/// Benchmark override chains of growing length on the base template
fn bench_override_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("override_chain");
    let base = default_base_template();

    for size in [SMALL_DATASET, MEDIUM_DATASET, LARGE_DATASET].iter() {
        let overrides: Vec<Replicas> = (0..*size)
            .map(|i| Replicas::from([(QUERY, i as i32)]))
            .collect();
        let chain: Vec<&dyn TemplateOverride> =
            overrides.iter().map(|o| o as &dyn TemplateOverride).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(base.override_with(&chain)));
        });
    }

    // a chain touching one category leaves the others shared
    let versions = Versions::from([(QUERY, "v0.40.0".to_string())]);
    group.bench_function("single_category", |b| {
        b.iter(|| black_box(base.override_with(&[&versions])));
    });

    group.finish();
}

/// Benchmark RBAC generation with heavy role reuse
fn bench_generate_rbac(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_rbac");

    for size in [SMALL_DATASET, MEDIUM_DATASET, LARGE_DATASET].iter() {
        let grants: Vec<Grant> = (0..*size)
            .map(|i| {
                Grant::new(format!("svc-{i}"), TenantId::new(format!("tenant-{}", i % 10)))
                    .resources([Resource::Metrics, Resource::Logs])
                    .permissions([Permission::Read, Permission::Write])
                    .environments([Environment::Staging, Environment::Production])
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &grants, |b, grants| {
            b.iter(|| black_box(generate_rbac(grants)));
        });
    }

    group.bench_function("environment_catalog", |b| {
        b.iter(|| black_box(environment_rbac()));
    });
    group.bench_function("environment_grants", |b| {
        b.iter(|| black_box(environment_grants()));
    });

    group.finish();
}

/// Benchmark rendering of the heaviest manifest builders
fn bench_render_manifests(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_manifests");
    let clusters = default_clusters().unwrap_or_default();

    for cluster in &clusters {
        group.bench_with_input(
            BenchmarkId::new("gateway", cluster.name.as_str()),
            cluster,
            |b, cluster| b.iter(|| black_box(gateway::build(cluster))),
        );
    }
    if let Some(cluster) = clusters.first() {
        group.bench_function("thanos_stack", |b| {
            b.iter(|| black_box(thanos::build(cluster)));
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets =
        bench_override_chain,
        bench_generate_rbac,
        bench_render_manifests
}

criterion_main!(benches);
