//! Concurrent scrapes against one orchestrator

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use guardia_exporter::{InstanceCache, Orchestrator, Registry};

use crate::helpers::*;

const NO_FILTER: &[&str] = &[];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scrapes_are_independent() {
    const COLLECTORS: usize = 8;
    const SCRAPES: usize = 16;

    let registry = delayed_registry(COLLECTORS, Duration::from_millis(20));
    let orchestrator =
        Orchestrator::new(&registry, &InstanceCache::new(), "node", NO_FILTER).unwrap();

    let mut tasks = vec![];
    for _ in 0..SCRAPES {
        let orchestrator = orchestrator.clone();
        tasks.push(tokio::spawn(async move { orchestrator.scrape().await }));
    }

    for task in tasks {
        let report = task.await.unwrap();
        assert_eq!(report.outcomes.len(), COLLECTORS);
        assert_eq!(
            report
                .samples_named("node_scrape_collector_duration_seconds")
                .count(),
            COLLECTORS
        );
        assert_eq!(
            report.samples_named("node_scrape_collector_success").count(),
            COLLECTORS
        );
        // own sample plus two bookkeeping samples per collector
        assert_eq!(report.samples.len(), 3 * COLLECTORS);
    }
}

#[tokio::test]
async fn test_collectors_run_in_parallel() {
    let registry = delayed_registry(10, Duration::from_millis(100));
    let orchestrator =
        Orchestrator::new(&registry, &InstanceCache::new(), "node", NO_FILTER).unwrap();

    let begin = Instant::now();
    let report = orchestrator.scrape().await;

    assert_eq!(report.outcomes.len(), 10);
    assert!(
        begin.elapsed() < Duration::from_millis(900),
        "scrape took {:?}",
        begin.elapsed()
    );
}

#[tokio::test]
async fn test_stream_ends_after_last_collector() {
    let registry = Registry::new();
    registry
        .register("fast", true, |_| Ok(Delayed::new("fast", Duration::ZERO)))
        .unwrap();
    registry
        .register("slow", true, |_| {
            Ok(Delayed::new("slow", Duration::from_millis(50)))
        })
        .unwrap();
    let orchestrator =
        Orchestrator::new(&registry, &InstanceCache::new(), "node", NO_FILTER).unwrap();

    let names: Vec<String> = orchestrator
        .collect()
        .map(|sample| sample.fq_name().to_string())
        .collect()
        .await;

    assert_eq!(names.len(), 6);
    assert_eq!(names.iter().filter(|name| *name == "test_slow").count(), 1);
    // the slow collector finishes last, after its own sample come its bookkeeping samples
    assert_eq!(names[3], "test_slow");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_builds_share_instances() {
    let registry = Arc::new(Registry::new());
    let cache = Arc::new(InstanceCache::new());
    let calls = Arc::new(AtomicUsize::new(0));
    register_counted(&registry, "counted", calls.clone());

    let mut tasks = vec![];
    for _ in 0..8 {
        let registry = registry.clone();
        let cache = cache.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            Orchestrator::new(&registry, &cache, "node", NO_FILTER).map(|_| ())
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
