//! Background loops driven by the async runner

use std::sync::atomic::Ordering;
use std::time::Duration;

use guardia_exporter::collectors::register_builtin;
use guardia_exporter::{AsyncRunner, InstanceCache, Orchestrator, Registry, ScrapeStatus};
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

const NO_FILTER: &[&str] = &[];

#[tokio::test]
async fn test_runner_drives_constructed_async_collectors() {
    let ticker = Ticker::new();
    let (ticks, stopped) = (ticker.ticks.clone(), ticker.stopped.clone());
    let ticker = std::sync::Mutex::new(Some(ticker));

    let registry = Registry::new();
    registry
        .register_async("ticker", true, move |_| {
            ticker
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow::anyhow!("ticker built twice"))
        })
        .unwrap();
    registry.register("plain", true, |_| Ok(Empty)).unwrap();

    let cache = InstanceCache::new();
    let orchestrator = Orchestrator::new(&registry, &cache, "test", NO_FILTER).unwrap();
    let runner = AsyncRunner::new(&cache);
    assert_eq!(runner.collectors(), vec!["ticker"]);

    // nothing ticked yet
    let report = orchestrator.scrape().await;
    assert_eq!(report.outcome("ticker").unwrap().status, ScrapeStatus::NoData);

    let lifetime = CancellationToken::new();
    let handle = tokio::spawn(runner.run(lifetime.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ticks.load(Ordering::SeqCst) > 0);

    let report = orchestrator.scrape().await;
    assert_eq!(report.outcome("ticker").unwrap().status, ScrapeStatus::Success);

    lifetime.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("runner should stop once the lifetime ends")
        .unwrap()
        .unwrap();
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_filtered_out_async_collector_is_not_run() {
    let registry = Registry::new();
    registry.register_async("ticker", true, |_| Ok(Ticker::new())).unwrap();
    registry.register("plain", true, |_| Ok(Empty)).unwrap();

    let cache = InstanceCache::new();
    Orchestrator::new(&registry, &cache, "test", &["plain"]).unwrap();

    assert!(AsyncRunner::new(&cache).is_empty());
}

#[tokio::test]
async fn test_builtin_cpu_collector_warms_up() {
    let registry = Registry::new();
    register_builtin(&registry, "node", Duration::ZERO).unwrap();

    let cache = InstanceCache::new();
    let orchestrator = Orchestrator::new(&registry, &cache, "node", &["cpu"]).unwrap();
    let lifetime = CancellationToken::new();
    let handle = tokio::spawn(AsyncRunner::new(&cache).run(lifetime.clone()));

    let report = orchestrator.scrape().await;
    assert_eq!(report.outcome("cpu").unwrap().status, ScrapeStatus::NoData);

    // the minimum refresh interval is a few hundred milliseconds at most
    tokio::time::sleep(Duration::from_secs(1)).await;
    let report = orchestrator.scrape().await;
    assert_eq!(report.outcome("cpu").unwrap().status, ScrapeStatus::Success);

    lifetime.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shared_instances_feed_runner_once() {
    let registry = Registry::new();
    registry.register_async("ticker", true, |_| Ok(Ticker::new())).unwrap();
    let cache = InstanceCache::new();

    Orchestrator::new(&registry, &cache, "a", NO_FILTER).unwrap();
    Orchestrator::new(&registry, &cache, "b", NO_FILTER).unwrap();

    let runner = AsyncRunner::new(&cache);
    assert_eq!(runner.collectors(), vec!["ticker"]);
}
