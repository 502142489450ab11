//! HTTP serving through a real listener

use std::time::Duration;

use guardia_exporter::config::ExporterConfig;
use guardia_exporter::server::spawn_server;
use guardia_exporter::{Exporter, InstanceCache, Orchestrator, Registry};
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

const NO_FILTER: &[&str] = &[];

fn local_config() -> ExporterConfig {
    ExporterConfig::default()
        .with_listen_address("127.0.0.1:0".parse().unwrap())
        .with_namespace("node")
}

#[tokio::test]
async fn test_metrics_are_served() {
    let registry = delayed_registry(2, Duration::ZERO);
    registry.register("failing", true, |_| Ok(Failing)).unwrap();
    let orchestrator =
        Orchestrator::new(&registry, &InstanceCache::new(), "node", NO_FILTER).unwrap();

    let lifetime = CancellationToken::new();
    let (addr, server) = spawn_server(&local_config(), orchestrator, lifetime.clone())
        .await
        .unwrap();

    let response = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let body = response.text().await.unwrap();
    assert!(body.contains("test_c0 1\n"));
    assert!(body.contains("test_c1 1\n"));
    assert!(body.contains("node_scrape_collector_success{collector=\"failing\"} 0\n"));
    assert!(body.contains("node_scrape_collector_success{collector=\"c0\"} 1\n"));
    assert!(body.contains("# TYPE node_scrape_collector_duration_seconds gauge\n"));

    let landing = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(landing.contains("<a href=\"/metrics\">"));

    lifetime.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_excess_requests_are_rejected() {
    let registry = Registry::new();
    registry
        .register("slow", true, |_| {
            Ok(Delayed::new("slow", Duration::from_millis(500)))
        })
        .unwrap();
    let orchestrator =
        Orchestrator::new(&registry, &InstanceCache::new(), "node", NO_FILTER).unwrap();

    let lifetime = CancellationToken::new();
    let config = local_config().with_max_requests(1);
    let (addr, server) = spawn_server(&config, orchestrator, lifetime.clone())
        .await
        .unwrap();

    let url = format!("http://{addr}/metrics");
    let first = tokio::spawn(reqwest::get(url.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = reqwest::get(&url).await.unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);

    // the permit is released once the slow scrape is done
    let third = reqwest::get(&url).await.unwrap();
    assert_eq!(third.status(), reqwest::StatusCode::OK);

    lifetime.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_exporter_stops_with_lifetime() {
    let registry = Registry::new();
    registry.register_async("ticker", true, |_| Ok(Ticker::new())).unwrap();
    let cache = InstanceCache::new();

    let exporter = Exporter::new(local_config(), &registry, &cache).unwrap();
    assert_eq!(exporter.orchestrator().collectors(), vec!["ticker"]);

    let lifetime = CancellationToken::new();
    let running = exporter.start(lifetime.clone()).await.unwrap();

    let response = reqwest::get(format!("http://{}/metrics", running.local_addr()))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    running.shutdown();
    tokio::time::timeout(Duration::from_secs(5), running.wait())
        .await
        .expect("exporter should stop after shutdown")
        .unwrap();
    assert!(lifetime.is_cancelled());
}

#[tokio::test]
async fn test_exporter_rejects_unknown_filter() {
    let registry = Registry::new();
    registry.register("plain", true, |_| Ok(Empty)).unwrap();

    let config = local_config().with_filter(["gpu"]);
    let err = Exporter::new(config, &registry, &InstanceCache::new()).unwrap_err();
    assert!(format!("{err:#}").contains("gpu"));
}

#[tokio::test]
async fn test_exporter_rejects_invalid_namespace() {
    let registry = Registry::new();
    registry.register("plain", true, |_| Ok(Empty)).unwrap();
    let cache = InstanceCache::new();

    let config = local_config().with_namespace("my-ns");
    assert!(config.validate().is_err());

    let err = Exporter::new(config, &registry, &cache).unwrap_err();
    assert!(format!("{err:#}").contains("my-ns"));
    assert!(cache.is_empty());
}
