use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::ValueEnum;

/// a.root-servers.net
pub const DEFAULT_ROOT: Ipv4Addr = Ipv4Addr::new(198, 41, 0, 4);

/// Settings for one iterative walk
#[derive(Debug, Clone)]
pub struct ResolveConfig {
	pub root: SocketAddr,
	/// Per-hop UDP timeout
	pub timeout: Duration,
	/// Network queries allowed before a walk is abandoned
	pub max_hops: usize,
}

impl Default for ResolveConfig {
	fn default() -> Self {
		ResolveConfig {
			root: SocketAddr::new(DEFAULT_ROOT.into(), 53),
			timeout: Duration::from_secs(2),
			max_hops: 16,
		}
	}
}

/// Settings shared by every batch run
#[derive(Debug, Clone)]
pub struct BatchConfig {
	pub workers: usize,
	/// TTL given to every cache entry
	pub default_ttl: Duration,
	pub log_dir: Option<std::path::PathBuf>,
}

/// What one resolution hands back to the dispatcher.
///
/// The reason for a failure lives only in the telemetry log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionOutcome {
	pub address: Option<Ipv4Addr>,
	/// Total time to answer or to failure
	pub latency: Duration,
}

impl ResolutionOutcome {
	pub fn resolved(address: Ipv4Addr, latency: Duration) -> Self {
		ResolutionOutcome { address: Some(address), latency }
	}

	pub fn failed(latency: Duration) -> Self {
		ResolutionOutcome { address: None, latency }
	}

	pub fn latency_ms(&self) -> f64 {
		self.latency.as_secs_f64() * 1000.0
	}
}

/// Resolution strategy selectable for a batch run.
///
/// Closed set: the dispatcher matches on it at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Strategy {
	/// Plain lookup through the system resolver, no telemetry
	System,
	Iterative,
	Recursive,
	IterativeCache,
	RecursiveCache,
}

impl Strategy {
	pub const ALL: [Strategy; 5] = [
		Strategy::System,
		Strategy::Iterative,
		Strategy::Recursive,
		Strategy::IterativeCache,
		Strategy::RecursiveCache,
	];

	/// Key used in the results document and in telemetry file names
	pub fn label(self) -> &'static str {
		match self {
			Strategy::System => "system_default",
			Strategy::Iterative => "iterative_nocache",
			Strategy::Recursive => "recursive_nocache",
			Strategy::IterativeCache => "iterative_cache",
			Strategy::RecursiveCache => "recursive_cache",
		}
	}

	pub fn caching(self) -> bool {
		matches!(self, Strategy::IterativeCache | Strategy::RecursiveCache)
	}

	/// Whether runs of this strategy write a telemetry log
	pub fn records_steps(self) -> bool {
		self != Strategy::System
	}
}
