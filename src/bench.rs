use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::cache::ResolutionCache;
use crate::dns::Exchange;
use crate::iterative::IterativeResolver;
use crate::lookup::AddressLookup;
use crate::recursive::RecursiveResolver;
use crate::stats::BatchMetrics;
use crate::telemetry::TelemetrySink;
use crate::transport::{ResolutionOutcome, ResolveConfig, Strategy};

/// Every resolver a batch can dispatch to, built once per process.
pub struct Resolvers<E, L> {
	iterative: IterativeResolver<E, L>,
	recursive: RecursiveResolver<L>,
	lookup: Arc<L>,
}

/// Shared state for one batch run: the cache for its strategy and the sink
/// its steps go to.
#[derive(Clone)]
pub struct RunContext {
	pub cache: Arc<ResolutionCache>,
	pub sink: Arc<TelemetrySink>,
}

impl<E: Exchange, L: AddressLookup> Resolvers<E, L> {
	pub fn new(config: ResolveConfig, exchange: E, lookup: L) -> Self {
		let lookup = Arc::new(lookup);
		Resolvers {
			iterative: IterativeResolver::new(config, exchange, lookup.clone()),
			recursive: RecursiveResolver::new(lookup.clone()),
			lookup,
		}
	}

	/// Resolve one domain with the chosen strategy.
	pub async fn resolve(&self, strategy: Strategy, domain: &str, run: &RunContext) -> ResolutionOutcome {
		let cache = strategy.caching().then_some(run.cache.as_ref());
		match strategy {
			Strategy::System => {
				let start = Instant::now();
				match self.lookup.lookup_ipv4(domain).await {
					Ok(ip) => ResolutionOutcome::resolved(ip, start.elapsed()),
					Err(_) => ResolutionOutcome::failed(start.elapsed()),
				}
			}
			Strategy::Iterative | Strategy::IterativeCache => {
				self.iterative.resolve(domain, cache, &run.sink).await
			}
			Strategy::Recursive | Strategy::RecursiveCache => {
				self.recursive.resolve(domain, cache, &run.sink).await
			}
		}
	}
}

/// Resolve every domain in `domains` concurrently and aggregate the results.
///
/// At most `workers` resolutions are in flight at once. Completion order is
/// unspecified. A worker that panics is counted as a failure and does not
/// disturb its siblings. Returns `None` for an empty domain set.
pub async fn run_batch<E, L>(
	resolvers: Arc<Resolvers<E, L>>,
	source: &str,
	domains: &[String],
	strategy: Strategy,
	run: &RunContext,
	workers: usize,
) -> Option<BatchMetrics>
where
	E: Exchange + 'static,
	L: AddressLookup + 'static,
{
	if domains.is_empty() {
		return None;
	}

	tracing::info!(
		source, strategy = strategy.label(), domains = domains.len(), workers,
		"starting batch"
	);

	let semaphore = Arc::new(Semaphore::new(workers.max(1)));
	let start = Instant::now();

	let mut handles = Vec::with_capacity(domains.len());
	for domain in domains {
		let sem = semaphore.clone();
		let resolvers = resolvers.clone();
		let run = run.clone();
		let domain = domain.clone();

		handles.push(tokio::spawn(async move {
			// The semaphore is never closed, so acquire only fails on a bug
			let _permit = sem.acquire_owned().await.ok();
			resolvers.resolve(strategy, &domain, &run).await
		}));
	}

	// Join everything before aggregating
	let mut outcomes = Vec::with_capacity(handles.len());
	let mut crashed = 0;
	for handle in handles {
		match handle.await {
			Ok(outcome) => outcomes.push(outcome),
			Err(e) => {
				tracing::warn!(source, strategy = strategy.label(), "resolution task failed: {}", e);
				crashed += 1;
			}
		}
	}
	let wall = start.elapsed();

	if let Err(e) = run.sink.flush() {
		tracing::warn!("failed to flush telemetry: {}", e);
	}

	let metrics = BatchMetrics::from_outcomes(source, strategy.label(), &outcomes, crashed, wall);
	tracing::info!(
		source, strategy = strategy.label(),
		success = metrics.successfully_resolved, failed = metrics.failed_resolutions,
		elapsed_ms = wall.as_millis() as u64,
		"batch complete"
	);
	Some(metrics)
}
