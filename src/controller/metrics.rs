//! Prometheus metrics for the DBCluster operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports:
//! - `dbcluster_inspected_secrets_total` (counter): secret inspections labeled by deployment.
//! - `dbcluster_inspect_secrets_duration_seconds` (gauge): duration of the last pass labeled by deployment.
//! - `dbcluster_reconcile_duration_seconds` (histogram): reconcile duration labeled by controller.
//! - `dbcluster_reconcile_errors_total` (counter): reconcile errors labeled by controller and kind.

use std::sync::atomic::AtomicU64;

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for per-deployment secret metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DeploymentLabels {
    pub deployment: String,
}

/// Labels for operator reconcile metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    /// Controller name, e.g. "databasecluster"
    pub controller: String,
}

/// Labels for operator error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub controller: String,
    /// Value of `Error::kind()`, e.g. "store", "validation"
    pub kind: String,
}

pub static INSPECTED_SECRETS_TOTAL: Lazy<Family<DeploymentLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static INSPECT_SECRETS_DURATION_SECONDS: Lazy<
    Family<DeploymentLabels, Gauge<f64, AtomicU64>>,
> = Lazy::new(Family::default);

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "dbcluster_inspected_secrets",
        "Number of Secret inspections per deployment",
        INSPECTED_SECRETS_TOTAL.clone(),
    );
    registry.register(
        "dbcluster_inspect_secrets_duration_seconds",
        "Duration of the last secret inspection pass in seconds",
        INSPECT_SECRETS_DURATION_SECONDS.clone(),
    );
    registry.register(
        "dbcluster_reconcile_duration_seconds",
        "Duration of reconcile loops in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "dbcluster_reconcile_errors",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );

    registry
});

/// Record one finished pass that inspected `inspected` secrets.
pub fn observe_inspect_secrets(deployment: &str, inspected: u64, seconds: f64) {
    let labels = DeploymentLabels {
        deployment: deployment.to_string(),
    };
    INSPECTED_SECRETS_TOTAL
        .get_or_create(&labels)
        .inc_by(inspected);
    INSPECT_SECRETS_DURATION_SECONDS
        .get_or_create(&labels)
        .set(seconds);
}

/// Observe a reconcile duration in seconds.
pub fn observe_reconcile_duration_seconds(controller: &str, seconds: f64) {
    let labels = ReconcileLabels {
        controller: controller.to_string(),
    };
    RECONCILE_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

/// Increment the reconcile error counter.
pub fn inc_reconcile_error(controller: &str, kind: &str) {
    let labels = ErrorLabels {
        controller: controller.to_string(),
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

/// Render the registry in the Prometheus text format.
pub fn encode_registry() -> Result<String, std::fmt::Error> {
    let mut buffer = String::new();
    prometheus_client::encoding::text::encode(&mut buffer, &REGISTRY)?;
    Ok(buffer)
}
