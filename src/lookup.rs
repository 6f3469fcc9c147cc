use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use hickory_resolver::config::ResolverOpts;
use hickory_resolver::TokioResolver;

use crate::error::{LookupResult, ResolveError};
use crate::resolver;

/// A resolver we already trust to turn a hostname into an address.
///
/// Serves as the glue resolver for glue-less referrals and as the
/// engine behind the recursive strategy.
pub trait AddressLookup: Send + Sync {
	fn lookup_ipv4(&self, name: &str) -> impl Future<Output = LookupResult> + Send;

	/// Resolver endpoint reported in telemetry
	fn endpoint(&self) -> &str;
}

/// The platform's configured recursive resolver
pub struct SystemLookup {
	resolver: TokioResolver,
	endpoint: String,
}

impl SystemLookup {
	/// Build from the system configuration (resolv.conf on Unix).
	///
	/// hickory's own answer cache is disabled so that every call is a real
	/// round trip; caching is layered on top by the caller when asked for.
	pub fn new(timeout: Duration) -> Result<Self> {
		let mut opts = ResolverOpts::default();
		opts.timeout = timeout;
		opts.attempts = 1;
		opts.ndots = 0;
		opts.cache_size = 0;

		let resolver = TokioResolver::builder_tokio()
			.map_err(|e| anyhow!("failed to create system resolver: {}", e))?
			.with_options(opts)
			.build();

		let endpoint = resolver::system_resolvers()
			.first()
			.map(|r| r.label.clone())
			.unwrap_or_else(|| "system".to_string());

		Ok(SystemLookup { resolver, endpoint })
	}
}

impl AddressLookup for SystemLookup {
	async fn lookup_ipv4(&self, name: &str) -> LookupResult {
		let lookup = self.resolver.ipv4_lookup(name).await
			.map_err(|e| ResolveError::Lookup(e.to_string()))?;
		lookup.iter()
			.next()
			.map(|a| a.0)
			.ok_or_else(|| ResolveError::Lookup(format!("no A record for {}", name)))
	}

	fn endpoint(&self) -> &str {
		&self.endpoint
	}
}
