//! Orchestrator construction and scrape isolation

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use guardia_exporter::orchestrator::COLLECTOR_LABEL;
use guardia_exporter::{
    BuildError, InstanceCache, Orchestrator, Registry, RegistryError, ScrapeStatus,
};
use pretty_assertions::assert_eq;

use crate::helpers::*;

const NO_FILTER: &[&str] = &[];

#[test]
fn test_constructor_runs_once_across_orchestrators() {
    let registry = Registry::new();
    let cache = InstanceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    register_counted(&registry, "counted", calls.clone());

    let first = Orchestrator::new(&registry, &cache, "test", NO_FILTER).unwrap();
    let second = Orchestrator::new(&registry, &cache, "other", &["counted"]).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.collectors(), second.collectors());
}

#[test]
fn test_filter_must_name_enabled_collectors() {
    let registry = Registry::new();
    registry.register("on", true, |_| Ok(Empty)).unwrap();
    registry.register("off", false, |_| Ok(Empty)).unwrap();
    let cache = InstanceCache::new();

    assert_matches!(
        Orchestrator::new(&registry, &cache, "test", &["on", "gpu"]),
        Err(BuildError::UnknownCollector(name)) if name == "gpu"
    );
    assert_matches!(
        Orchestrator::new(&registry, &cache, "test", &["off"]),
        Err(BuildError::DisabledCollector(name)) if name == "off"
    );

    // nothing was constructed by the rejected builds
    assert!(cache.is_empty());
}

#[test]
fn test_building_seals_the_registry() {
    let registry = Registry::new();
    registry.register("on", true, |_| Ok(Empty)).unwrap();

    Orchestrator::new(&registry, &InstanceCache::new(), "test", NO_FILTER).unwrap();

    assert_matches!(
        registry.register("late", true, |_| Ok(Empty)),
        Err(RegistryError::Sealed(name)) if name == "late"
    );
    assert_matches!(registry.set_enabled("on", false), Err(RegistryError::Sealed(_)));
}

#[test]
fn test_failed_constructor_is_retried() {
    let registry = Registry::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    registry
        .register("flaky", true, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("device busy");
            }
            Ok(Empty)
        })
        .unwrap();
    let cache = InstanceCache::new();

    let err = Orchestrator::new(&registry, &cache, "test", NO_FILTER).unwrap_err();
    assert_matches!(&err, BuildError::Constructor { name, .. } if name == "flaky");
    assert!(!cache.contains("flaky"));

    Orchestrator::new(&registry, &cache, "test", NO_FILTER).unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(cache.contains("flaky"));
}

#[tokio::test]
async fn test_failures_are_isolated() {
    let registry = Registry::new();
    registry.register("failing", true, |_| Ok(Failing)).unwrap();
    registry.register("empty", true, |_| Ok(Empty)).unwrap();
    registry
        .register("ok", true, |_| Ok(Delayed::new("ok", Duration::ZERO)))
        .unwrap();

    let orchestrator =
        Orchestrator::new(&registry, &InstanceCache::new(), "node", NO_FILTER).unwrap();
    let report = orchestrator.scrape().await;

    let statuses: Vec<_> = report
        .outcomes
        .iter()
        .map(|outcome| (outcome.name.as_str(), outcome.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("empty", ScrapeStatus::NoData),
            ("failing", ScrapeStatus::Failed),
            ("ok", ScrapeStatus::Success),
        ]
    );

    assert_eq!(report.samples_named("test_ok").count(), 1);
    for (name, expected) in [("empty", 0.0), ("failing", 0.0), ("ok", 1.0)] {
        let success = report
            .samples_named("node_scrape_collector_success")
            .find(|sample| sample.label(COLLECTOR_LABEL) == Some(name))
            .unwrap();
        assert_eq!(success.value(), expected, "success of {name}");
    }

    let durations = report
        .samples_named("node_scrape_collector_duration_seconds")
        .count();
    assert_eq!(durations, 3);
}

#[tokio::test]
async fn test_filter_restricts_scrape() {
    let registry = delayed_registry(4, Duration::ZERO);
    let orchestrator =
        Orchestrator::new(&registry, &InstanceCache::new(), "node", &["c1", "c3"]).unwrap();

    let report = orchestrator.scrape().await;

    let names: Vec<_> = report
        .outcomes
        .iter()
        .map(|outcome| outcome.name.as_str())
        .collect();
    assert_eq!(names, vec!["c1", "c3"]);
    assert_eq!(report.samples.len(), 2 + 2 * 2);
}
