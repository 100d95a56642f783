// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Upload Intelligence - Performance Benchmarks
//! © 2026 Bountyy Oy
//!
//! Benchmarks for the response analysis and belief/ranking hot paths

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use upload_intel::analysis::{HypothesisEngine, HypothesisRules, StrategyRanker};
use upload_intel::context::AttackContext;
use upload_intel::http_client::HttpResponse;
use upload_intel::observer::{Observer, PayloadInfo, ProbePhase};
use upload_intel::strategies::UploadStrategy;

const TARGET: &str = "https://lab.test/my-account/avatar";

fn sample_responses() -> Vec<(&'static str, HttpResponse)> {
    vec![
        (
            "accepted",
            HttpResponse::new(200, "The file avatars/exploit.php has been uploaded.")
                .with_header("Server", "Apache/2.4.41 (Ubuntu)")
                .with_header("X-Powered-By", "PHP/7.4.3"),
        ),
        (
            "rejected",
            HttpResponse::new(403, "Sorry, invalid file type. Only JPG & PNG files are allowed"),
        ),
        (
            "waf",
            HttpResponse::new(403, "<title>Attention Required! | Cloudflare</title>")
                .with_header("CF-RAY", "7d1c2f3a4b5c6d7e-AMS"),
        ),
    ]
}

/// A context after baseline and two rejected probes.
fn scanned_context(rules: &Arc<HypothesisRules>) -> AttackContext {
    let mut observer = Observer::new();
    let mut engine = HypothesisEngine::new(Arc::clone(rules));
    let mut context = AttackContext::new(TARGET, "https://lab.test");

    for (name, response) in sample_responses() {
        let info = PayloadInfo::upload(ProbePhase::Recon, name, TARGET);
        let batch = observer.analyze_response(&response, &mut context, &info);
        context.add_observations(batch);
        if context.baseline_response().is_none() {
            context.set_baseline_response(response);
        }
    }
    engine.analyze(&mut context);
    context
}

fn benchmark_analyze_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_response");
    for (name, response) in sample_responses() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &response, |b, response| {
            b.iter(|| {
                let mut observer = Observer::new();
                let mut context = AttackContext::new(TARGET, "https://lab.test");
                let info = PayloadInfo::upload(ProbePhase::Upload, "exploit.php", TARGET);
                black_box(observer.analyze_response(black_box(response), &mut context, &info))
            })
        });
    }
    group.finish();
}

fn benchmark_hypothesis_analyze(c: &mut Criterion) {
    let rules = Arc::new(HypothesisRules::load().unwrap());
    let context = scanned_context(&rules);

    c.bench_function("hypothesis_analyze", |b| {
        b.iter(|| {
            let mut engine = HypothesisEngine::new(Arc::clone(&rules));
            let mut context = context.clone();
            engine.analyze(&mut context);
            black_box(context.hypotheses().len())
        })
    });
}

fn benchmark_strategy_ranking(c: &mut Criterion) {
    let rules = Arc::new(HypothesisRules::load().unwrap());
    let context = scanned_context(&rules);
    let ranker = StrategyRanker::new(rules);
    let registry = UploadStrategy::registry();

    c.bench_function("strategy_ranking", |b| {
        b.iter(|| black_box(ranker.rank(black_box(&registry), &context)))
    });
}

criterion_group!(
    benches,
    benchmark_analyze_response,
    benchmark_hypothesis_analyze,
    benchmark_strategy_ranking
);
criterion_main!(benches);
