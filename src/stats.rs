use std::time::Duration;

use serde::Serialize;

use crate::transport::ResolutionOutcome;

/// Aggregate result of resolving one domain set with one strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMetrics {
	/// Label of the input domain set
	pub source: String,
	/// Strategy label
	pub resolver: String,
	pub total_queries: usize,
	pub successfully_resolved: usize,
	pub failed_resolutions: usize,
	/// Mean over successful resolutions only
	pub avg_lookup_latency_ms: f64,
	pub p50_lookup_latency_ms: f64,
	pub p95_lookup_latency_ms: f64,
	/// Domains per second of batch wall-clock time
	pub avg_throughput_qps: f64,
}

impl BatchMetrics {
	/// Fold per-domain outcomes into batch metrics.
	///
	/// `crashed` counts units of work that never produced an outcome.
	pub fn from_outcomes(
		source: &str,
		resolver: &str,
		outcomes: &[ResolutionOutcome],
		crashed: usize,
		wall: Duration,
	) -> Self {
		let latencies: Vec<f64> = outcomes.iter()
			.filter(|o| o.address.is_some())
			.map(|o| o.latency_ms())
			.collect();
		let failed = outcomes.len() - latencies.len() + crashed;
		Self::compute(source, resolver, &latencies, failed, wall)
	}

	/// Metrics from the latencies of successful resolutions and a failure count
	pub fn compute(
		source: &str,
		resolver: &str,
		success_latencies_ms: &[f64],
		failed: usize,
		wall: Duration,
	) -> Self {
		let total = success_latencies_ms.len() + failed;
		let mut sorted = success_latencies_ms.to_vec();
		sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

		BatchMetrics {
			source: source.to_string(),
			resolver: resolver.to_string(),
			total_queries: total,
			successfully_resolved: sorted.len(),
			failed_resolutions: failed,
			avg_lookup_latency_ms: mean(&sorted).unwrap_or(0.0),
			p50_lookup_latency_ms: percentile(&sorted, 50.0).unwrap_or(0.0),
			p95_lookup_latency_ms: percentile(&sorted, 95.0).unwrap_or(0.0),
			avg_throughput_qps: throughput(total, wall),
		}
	}
}

/// Domains per second; zero when no time elapsed.
pub fn throughput(count: usize, wall: Duration) -> f64 {
	let secs = wall.as_secs_f64();
	if secs > 0.0 {
		count as f64 / secs
	} else {
		0.0
	}
}

/// Calculate the p-th percentile from a sorted slice using nearest-rank method.
///
/// Args:
///   sorted_values: Pre-sorted slice of f64 values.
///   p: Percentile between 0.0 and 100.0 (e.g. 50.0 for median).
///
/// Returns:
///   None if the slice is empty, otherwise the percentile value.
pub fn percentile(sorted_values: &[f64], p: f64) -> Option<f64> {
	if sorted_values.is_empty() {
		return None;
	}
	if sorted_values.len() == 1 {
		return Some(sorted_values[0]);
	}
	// Nearest-rank: rank = ceil(p/100 * N)
	let n = sorted_values.len();
	let rank = ((p / 100.0) * n as f64).ceil() as usize;
	let rank = rank.clamp(1, n);
	Some(sorted_values[rank - 1])
}

/// Calculate the arithmetic mean of a slice of values.
pub fn mean(values: &[f64]) -> Option<f64> {
	if values.is_empty() {
		return None;
	}
	let sum: f64 = values.iter().sum();
	Some(sum / values.len() as f64)
}
