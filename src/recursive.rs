use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::ResolutionCache;
use crate::lookup::AddressLookup;
use crate::telemetry::{CacheStatus, Mode, Outcome, Phase, ResolutionStep, TelemetrySink};
use crate::transport::ResolutionOutcome;

/// Hands the whole walk to a trusted recursive resolver and only times it.
///
/// Writes exactly one terminal step per resolution, shaped like the
/// iterative resolver's.
pub struct RecursiveResolver<L> {
	lookup: Arc<L>,
}

impl<L: AddressLookup> RecursiveResolver<L> {
	pub fn new(lookup: Arc<L>) -> Self {
		RecursiveResolver { lookup }
	}

	pub async fn resolve(
		&self,
		domain: &str,
		cache: Option<&ResolutionCache>,
		sink: &TelemetrySink,
	) -> ResolutionOutcome {
		let start = Instant::now();
		let endpoint = self.lookup.endpoint();

		if let Some(entry) = cache.and_then(|c| c.lookup(domain)) {
			let step = ResolutionStep::new(
				domain, Mode::Recursive, endpoint, Phase::NotApplicable, Outcome::Answer,
				format!("ANSWER: {}", entry.address), Duration::ZERO,
			)
			.terminal(start.elapsed(), CacheStatus::Hit);
			sink.record(&step);
			return ResolutionOutcome::resolved(entry.address, start.elapsed());
		}

		let cache_status = CacheStatus::for_miss(cache.is_some());
		let sent = Instant::now();
		let result = self.lookup.lookup_ipv4(domain).await;
		let rtt = sent.elapsed();
		let total = start.elapsed();

		match result {
			Ok(ip) => {
				let step = ResolutionStep::new(
					domain, Mode::Recursive, endpoint, Phase::NotApplicable, Outcome::Answer,
					format!("ANSWER: {}", ip), rtt,
				)
				.terminal(total, cache_status);
				sink.record(&step);
				if let Some(cache) = cache {
					cache.store_default(domain, ip);
				}
				ResolutionOutcome::resolved(ip, total)
			}
			Err(e) => {
				let step = ResolutionStep::new(
					domain, Mode::Recursive, endpoint, Phase::NotApplicable, Outcome::Error,
					format!("ERROR: {}", e), rtt,
				)
				.terminal(total, cache_status);
				sink.record(&step);
				ResolutionOutcome::failed(total)
			}
		}
	}
}
