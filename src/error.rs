use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;

/// Why a single resolution stopped without an address.
///
/// The `Display` text is what lands in the telemetry `error` step.
#[derive(Debug, Error)]
pub enum ResolveError {
	#[error("timed out after {} ms", .0.as_millis())]
	Timeout(Duration),

	#[error("network error: {0}")]
	Io(#[from] std::io::Error),

	#[error("malformed response: {0}")]
	Malformed(String),

	#[error("no answer or referral received (rcode {rcode})")]
	NoReferral { rcode: String },

	#[error("answer carried no address record")]
	NoAddressRecord,

	#[error("glue lookup for {ns} failed: {reason}")]
	GlueFailed { ns: String, reason: String },

	#[error("gave up after {0} hops")]
	HopLimit(usize),

	#[error("lookup failed: {0}")]
	Lookup(String),
}

/// Answer produced by the trusted lookup facility
pub type LookupResult = Result<Ipv4Addr, ResolveError>;
