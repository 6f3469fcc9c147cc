use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::ResolutionCache;
use crate::dns::{classify, Exchange, Reply};
use crate::error::ResolveError;
use crate::lookup::AddressLookup;
use crate::telemetry::{CacheStatus, Mode, Outcome, Phase, ResolutionStep, TelemetrySink};
use crate::transport::{ResolutionOutcome, ResolveConfig};

/// Walks the delegation tree from a root nameserver down to an answer.
///
/// Each hop is one UDP exchange. Every hop, and a cache short-circuit, is
/// written to the telemetry sink before the walk moves on.
pub struct IterativeResolver<E, L> {
	config: ResolveConfig,
	exchange: E,
	glue: Arc<L>,
}

/// Where the walk currently stands
struct Walk<'a> {
	domain: &'a str,
	qname: String,
	server: SocketAddr,
	phase: Phase,
	/// Last server actually queried, and the phase it was queried in
	contacted: SocketAddr,
	contacted_phase: Phase,
	start: Instant,
	cache_status: CacheStatus,
}

impl<E: Exchange, L: AddressLookup> IterativeResolver<E, L> {
	pub fn new(config: ResolveConfig, exchange: E, glue: Arc<L>) -> Self {
		IterativeResolver { config, exchange, glue }
	}

	#[cfg(test)]
	pub fn exchange(&self) -> &E {
		&self.exchange
	}

	/// Resolve `domain`, consulting and filling `cache` when one is given.
	pub async fn resolve(
		&self,
		domain: &str,
		cache: Option<&ResolutionCache>,
		sink: &TelemetrySink,
	) -> ResolutionOutcome {
		let start = Instant::now();

		if let Some(entry) = cache.and_then(|c| c.lookup(domain)) {
			let step = ResolutionStep::new(
				domain, Mode::Iterative, "CACHE", Phase::Cache, Outcome::Answer,
				format!("ANSWER: {}", entry.address), Duration::ZERO,
			)
			.terminal(start.elapsed(), CacheStatus::Hit);
			sink.record(&step);
			return ResolutionOutcome::resolved(entry.address, start.elapsed());
		}

		let mut walk = Walk {
			domain,
			qname: domain.to_string(),
			server: self.config.root,
			phase: Phase::Root,
			contacted: self.config.root,
			contacted_phase: Phase::Root,
			start,
			cache_status: CacheStatus::for_miss(cache.is_some()),
		};

		let mut hops = 0;
		loop {
			if hops == self.config.max_hops {
				return self.fail(&walk, ResolveError::HopLimit(hops), Duration::ZERO, sink);
			}
			hops += 1;

			let sent = Instant::now();
			let reply = self.exchange
				.exchange(walk.server, &walk.qname, self.config.timeout)
				.await
				.and_then(|message| classify(&message));
			let rtt = sent.elapsed();
			walk.contacted = walk.server;
			walk.contacted_phase = walk.phase;

			match reply {
				Ok(Reply::Answer(ip)) => {
					return self.answer(&walk, ip, rtt, cache, sink);
				}
				Ok(Reply::Alias(target)) => {
					self.step(&walk, Outcome::Referral, format!("CNAME to {}", target), rtt, sink);
					walk.qname = target;
					walk.server = self.config.root;
					walk.phase = Phase::Root;
				}
				Ok(Reply::Referral(ip)) => {
					self.step(&walk, Outcome::Referral, format!("REFERRAL to {}", ip), rtt, sink);
					walk.server = nameserver(ip);
					walk.phase = walk.phase.advance();
				}
				Ok(Reply::NeedsGlue(ns)) => {
					let glue = match self.glue.lookup_ipv4(&ns).await {
						Ok(ip) => ip,
						Err(e) => {
							let err = ResolveError::GlueFailed { ns, reason: e.to_string() };
							return self.fail(&walk, err, rtt, sink);
						}
					};
					self.step(
						&walk, Outcome::ReferralNeedsGlue,
						format!("REFERRAL to {} (needs glue lookup), glue address {}", ns, glue),
						rtt, sink,
					);
					walk.server = nameserver(glue);
					walk.phase = walk.phase.advance();
				}
				Err(e) => return self.fail(&walk, e, rtt, sink),
			}
		}
	}

	fn step(&self, walk: &Walk<'_>, outcome: Outcome, description: String, rtt: Duration, sink: &TelemetrySink) {
		let step = ResolutionStep::new(
			walk.domain, Mode::Iterative, walk.server.ip().to_string(),
			walk.phase, outcome, description, rtt,
		);
		sink.record(&step);
	}

	fn answer(
		&self,
		walk: &Walk<'_>,
		ip: Ipv4Addr,
		rtt: Duration,
		cache: Option<&ResolutionCache>,
		sink: &TelemetrySink,
	) -> ResolutionOutcome {
		let total = walk.start.elapsed();
		let step = ResolutionStep::new(
			walk.domain, Mode::Iterative, walk.server.ip().to_string(),
			Phase::Authoritative, Outcome::Answer, format!("ANSWER: {}", ip), rtt,
		)
		.terminal(total, walk.cache_status);
		sink.record(&step);

		if let Some(cache) = cache {
			cache.store_default(walk.domain, ip);
		}
		ResolutionOutcome::resolved(ip, total)
	}

	/// Errors are attributed to the last server queried; a referral target
	/// the walk never reached is not reported as contacted.
	fn fail(&self, walk: &Walk<'_>, err: ResolveError, rtt: Duration, sink: &TelemetrySink) -> ResolutionOutcome {
		let total = walk.start.elapsed();
		let step = ResolutionStep::new(
			walk.domain, Mode::Iterative, walk.contacted.ip().to_string(),
			walk.contacted_phase, Outcome::Error, format!("ERROR: {}", err), rtt,
		)
		.terminal(total, walk.cache_status);
		sink.record(&step);
		ResolutionOutcome::failed(total)
	}
}

fn nameserver(ip: Ipv4Addr) -> SocketAddr {
	SocketAddr::new(ip.into(), 53)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::*;

	const ROOT: [u8; 4] = [198, 41, 0, 4];
	const TLD: [u8; 4] = [192, 5, 6, 30];

	fn resolver(exchange: ScriptedExchange, glue: StaticLookup) -> IterativeResolver<ScriptedExchange, StaticLookup> {
		let config = ResolveConfig {
			root: server(ROOT),
			..ResolveConfig::default()
		};
		IterativeResolver::new(config, exchange, Arc::new(glue))
	}

	fn sink() -> (TelemetrySink, SharedBuffer) {
		let buffer = SharedBuffer::default();
		(TelemetrySink::from_writer(buffer.clone()), buffer)
	}

	#[tokio::test]
	async fn test_referral_then_answer() {
		let exchange = ScriptedExchange::default()
			.on(server(ROOT), "a.example", Script::Reply(glue_referral("a.example", "tld.example", TLD.into())))
			.on(server(TLD), "a.example", Script::Reply(answer("a.example", Ipv4Addr::new(1, 2, 3, 4))));
		let r = resolver(exchange, StaticLookup::default());
		let (sink, buffer) = sink();

		let outcome = r.resolve("a.example", None, &sink).await;
		assert_eq!(outcome.address, Some(Ipv4Addr::new(1, 2, 3, 4)));

		let steps = buffer.steps_for("a.example");
		assert_eq!(steps.len(), 2);
		assert_eq!(steps[0]["outcome"], "referral");
		assert_eq!(steps[0]["step_of_resolution"], "root");
		assert_eq!(steps[0]["dns_server_ip_contacted"], "198.41.0.4");
		assert!(steps[0].get("total_time_to_resolution").is_none());
		assert_eq!(steps[1]["outcome"], "answer");
		assert_eq!(steps[1]["step_of_resolution"], "authoritative");
		assert_eq!(steps[1]["dns_server_ip_contacted"], "192.5.6.30");
		assert_eq!(steps[1]["cache_status"], "not-applicable");
		assert!(steps[1]["total_time_to_resolution"].is_number());
	}

	#[tokio::test]
	async fn test_timeout_after_referral_fails() {
		let exchange = ScriptedExchange::default()
			.on(server(ROOT), "b.example", Script::Reply(glue_referral("b.example", "tld.example", TLD.into())))
			.on(server(TLD), "b.example", Script::Timeout);
		let r = resolver(exchange, StaticLookup::default());
		let (sink, buffer) = sink();

		let outcome = r.resolve("b.example", None, &sink).await;
		assert_eq!(outcome.address, None);

		let steps = buffer.steps_for("b.example");
		assert_eq!(steps.len(), 2);
		assert_eq!(steps[1]["outcome"], "error");
		assert_eq!(steps[1]["step_of_resolution"], "tld");
		assert!(steps[1]["response_or_referral_received"].as_str().unwrap().starts_with("ERROR: timed out"));
	}

	#[tokio::test]
	async fn test_glueless_referral_uses_glue_lookup() {
		let glue_ip = Ipv4Addr::new(5, 6, 7, 8);
		let exchange = ScriptedExchange::default()
			.on(server(ROOT), "c.example", Script::Reply(glueless_referral("c.example", "ns1.example")))
			.on(server([5, 6, 7, 8]), "c.example", Script::Reply(answer("c.example", Ipv4Addr::new(9, 8, 7, 6))));
		let r = resolver(exchange, StaticLookup::default().with("ns1.example", glue_ip));
		let (sink, buffer) = sink();

		let outcome = r.resolve("c.example", None, &sink).await;
		assert_eq!(outcome.address, Some(Ipv4Addr::new(9, 8, 7, 6)));

		let sent = r.exchange().sent();
		assert_eq!(sent[1].0, server([5, 6, 7, 8]));

		let steps = buffer.steps_for("c.example");
		assert_eq!(steps[0]["outcome"], "referral-needs-glue");
		let desc = steps[0]["response_or_referral_received"].as_str().unwrap();
		assert!(desc.contains("needs glue lookup"));
		assert!(desc.contains("5.6.7.8"));
		assert_eq!(steps[1]["step_of_resolution"], "authoritative");
		assert_eq!(steps[1]["dns_server_ip_contacted"], "5.6.7.8");
	}

	#[tokio::test]
	async fn test_glue_failure_is_fatal() {
		let exchange = ScriptedExchange::default()
			.on(server(ROOT), "d.example", Script::Reply(glueless_referral("d.example", "ns-gone.example")));
		let r = resolver(exchange, StaticLookup::default());
		let (sink, buffer) = sink();

		let outcome = r.resolve("d.example", None, &sink).await;
		assert_eq!(outcome.address, None);
		assert_eq!(r.exchange().sent().len(), 1);

		let steps = buffer.steps_for("d.example");
		assert_eq!(steps.len(), 1);
		assert_eq!(steps[0]["outcome"], "error");
		let desc = steps[0]["response_or_referral_received"].as_str().unwrap();
		assert!(desc.contains("glue lookup for ns-gone.example failed"));
	}

	#[tokio::test]
	async fn test_empty_response_is_error() {
		let exchange = ScriptedExchange::default()
			.on(server(ROOT), "e.example", Script::Reply(empty("e.example")));
		let r = resolver(exchange, StaticLookup::default());
		let (sink, buffer) = sink();

		assert_eq!(r.resolve("e.example", None, &sink).await.address, None);
		let steps = buffer.steps_for("e.example");
		assert_eq!(steps.len(), 1);
		assert!(steps[0]["response_or_referral_received"].as_str().unwrap().contains("no answer or referral"));
	}

	#[tokio::test]
	async fn test_cached_second_resolution_skips_network() {
		let exchange = ScriptedExchange::default()
			.on(server(ROOT), "a.example", Script::Reply(glue_referral("a.example", "tld.example", TLD.into())))
			.on(server(TLD), "a.example", Script::Reply(answer("a.example", Ipv4Addr::new(1, 2, 3, 4))));
		let r = resolver(exchange, StaticLookup::default());
		let (sink, buffer) = sink();
		let cache = ResolutionCache::default();

		let first = r.resolve("a.example", Some(&cache), &sink).await;
		let second = r.resolve("a.example", Some(&cache), &sink).await;
		assert_eq!(first.address, second.address);
		assert_eq!(r.exchange().sent().len(), 2);

		let steps = buffer.steps_for("a.example");
		assert_eq!(steps.len(), 3);
		assert_eq!(steps[1]["cache_status"], "miss");
		assert_eq!(steps[2]["step_of_resolution"], "cache");
		assert_eq!(steps[2]["outcome"], "answer");
		assert_eq!(steps[2]["cache_status"], "hit");
		assert_eq!(steps[2]["round_trip_time_to_that_server"], 0.0);
	}

	#[tokio::test]
	async fn test_referral_loop_hits_hop_ceiling() {
		// Root refers back to itself forever
		let exchange = ScriptedExchange::default()
			.on(server(ROOT), "loop.example", Script::Reply(glue_referral("loop.example", "a.root", ROOT.into())));
		let config = ResolveConfig {
			root: server(ROOT),
			max_hops: 5,
			..ResolveConfig::default()
		};
		let r = IterativeResolver::new(config, exchange, Arc::new(StaticLookup::default()));
		let (sink, buffer) = sink();

		assert_eq!(r.resolve("loop.example", None, &sink).await.address, None);
		assert_eq!(r.exchange().sent().len(), 5);
		let steps = buffer.steps_for("loop.example");
		assert_eq!(steps.len(), 6);
		assert!(steps[5]["response_or_referral_received"].as_str().unwrap().contains("gave up after 5 hops"));
		assert_eq!(steps[5]["dns_server_ip_contacted"], "198.41.0.4");
	}

	#[tokio::test]
	async fn test_hop_ceiling_names_last_queried_server() {
		let exchange = ScriptedExchange::default()
			.on(server(ROOT), "deep.example", Script::Reply(glue_referral("deep.example", "tld.example", TLD.into())))
			.on(server(TLD), "deep.example", Script::Reply(glue_referral("deep.example", "ns.deep.example", Ipv4Addr::new(10, 0, 0, 1))));
		let config = ResolveConfig {
			root: server(ROOT),
			max_hops: 2,
			..ResolveConfig::default()
		};
		let r = IterativeResolver::new(config, exchange, Arc::new(StaticLookup::default()));
		let (sink, buffer) = sink();

		assert_eq!(r.resolve("deep.example", None, &sink).await.address, None);
		let sent = r.exchange().sent();
		assert_eq!(sent.len(), 2);
		assert!(sent.iter().all(|(addr, _)| *addr != server([10, 0, 0, 1])));

		let steps = buffer.steps_for("deep.example");
		assert_eq!(steps.len(), 3);
		assert_eq!(steps[2]["outcome"], "error");
		assert_eq!(steps[2]["dns_server_ip_contacted"], "192.5.6.30");
		assert_eq!(steps[2]["step_of_resolution"], "tld");
		assert!(steps[2]["response_or_referral_received"].as_str().unwrap().contains("gave up after 2 hops"));
	}

	#[tokio::test]
	async fn test_alias_restarts_at_root() {
		use hickory_proto::rr::rdata::CNAME;
		use hickory_proto::rr::{Name, RData, Record};

		let mut alias = empty("www.example");
		alias.add_answer(Record::from_rdata(
			Name::from_ascii("www.example.").unwrap(), 300,
			RData::CNAME(CNAME(Name::from_ascii("web.example.").unwrap())),
		));
		let exchange = ScriptedExchange::default()
			.on(server(ROOT), "www.example", Script::Reply(alias))
			.on(server(ROOT), "web.example", Script::Reply(answer("web.example", Ipv4Addr::new(4, 4, 4, 4))));
		let r = resolver(exchange, StaticLookup::default());
		let (sink, buffer) = sink();

		let outcome = r.resolve("www.example", None, &sink).await;
		assert_eq!(outcome.address, Some(Ipv4Addr::new(4, 4, 4, 4)));
		let steps = buffer.steps_for("www.example");
		assert_eq!(steps.len(), 2);
		assert_eq!(steps[0]["response_or_referral_received"], "CNAME to web.example");
	}
}
