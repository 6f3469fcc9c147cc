//! Resolution step records and the append-only sink they are written to.
//!
//! One JSON object per line. Downstream plotting reads these files, so the
//! field names below are a compatibility surface.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	Iterative,
	Recursive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
	Root,
	Tld,
	Authoritative,
	Cache,
	NotApplicable,
}

impl Phase {
	/// Phase of the next hop after following a referral
	pub fn advance(self) -> Phase {
		match self {
			Phase::Root => Phase::Tld,
			_ => Phase::Authoritative,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
	Answer,
	Referral,
	ReferralNeedsGlue,
	Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStatus {
	Hit,
	Miss,
	NotApplicable,
}

impl CacheStatus {
	pub fn for_miss(caching: bool) -> CacheStatus {
		if caching {
			CacheStatus::Miss
		} else {
			CacheStatus::NotApplicable
		}
	}
}

/// One attempt against one nameserver (or the cache) within a resolution
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionStep {
	/// Seconds since the Unix epoch when the step was recorded
	pub timestamp: f64,
	pub domain_name_queried: String,
	pub resolution_mode: Mode,
	pub dns_server_ip_contacted: String,
	pub step_of_resolution: Phase,
	pub outcome: Outcome,
	pub response_or_referral_received: String,
	pub round_trip_time_to_that_server: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub total_time_to_resolution: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cache_status: Option<CacheStatus>,
}

impl ResolutionStep {
	pub fn new(
		domain: &str,
		mode: Mode,
		server: impl Into<String>,
		phase: Phase,
		outcome: Outcome,
		description: impl Into<String>,
		rtt: Duration,
	) -> Self {
		ResolutionStep {
			timestamp: unix_now(),
			domain_name_queried: domain.to_string(),
			resolution_mode: mode,
			dns_server_ip_contacted: server.into(),
			step_of_resolution: phase,
			outcome,
			response_or_referral_received: description.into(),
			round_trip_time_to_that_server: millis(rtt),
			total_time_to_resolution: None,
			cache_status: None,
		}
	}

	/// Mark this as the last step of its resolution
	pub fn terminal(mut self, total: Duration, cache_status: CacheStatus) -> Self {
		self.total_time_to_resolution = Some(millis(total));
		self.cache_status = Some(cache_status);
		self
	}
}

pub fn millis(d: Duration) -> f64 {
	d.as_secs_f64() * 1000.0
}

fn unix_now() -> f64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs_f64())
		.unwrap_or(0.0)
}

/// Shared append-only JSON-lines writer.
///
/// Each record is serialized first and then written with a single
/// `write_all` under the lock, so concurrent workers never interleave bytes
/// within a line.
pub struct TelemetrySink {
	out: Mutex<Box<dyn Write + Send>>,
}

impl TelemetrySink {
	pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
		TelemetrySink { out: Mutex::new(Box::new(writer)) }
	}

	/// Truncate or create `path` and append records to it
	pub fn create(path: &Path) -> io::Result<Self> {
		let file = File::create(path)?;
		Ok(TelemetrySink::from_writer(BufWriter::new(file)))
	}

	/// Sink that drops every record
	pub fn discard() -> Self {
		TelemetrySink::from_writer(io::sink())
	}

	pub fn record(&self, step: &ResolutionStep) {
		tracing::debug!(
			domain = %step.domain_name_queried,
			server = %step.dns_server_ip_contacted,
			phase = ?step.step_of_resolution,
			outcome = ?step.outcome,
			rtt_ms = step.round_trip_time_to_that_server,
			"{}", step.response_or_referral_received
		);

		let mut line = match serde_json::to_vec(step) {
			Ok(line) => line,
			Err(e) => {
				tracing::warn!("failed to serialize resolution step: {}", e);
				return;
			}
		};
		line.push(b'\n');

		// Blocking write on the calling worker thread. Lines are a few hundred
		// bytes into a BufWriter, and a failed append is logged and dropped.
		let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		if let Err(e) = out.write_all(&line) {
			tracing::warn!("failed to append resolution step: {}", e);
		}
	}

	pub fn flush(&self) -> io::Result<()> {
		self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).flush()
	}
}
