//! TTL-bounded name -> address cache shared by concurrent resolutions.
//!
//! Backed by an unbounded `moka` cache whose per-entry expiry is the entry's
//! own TTL. Freshness is also checked on every lookup, so a stale entry that
//! moka has not evicted yet is treated as absent and invalidated.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
	pub address: Ipv4Addr,
	pub inserted_at: Instant,
	pub ttl: Duration,
}

impl CacheEntry {
	/// Usable iff `now - inserted_at < ttl`
	pub fn is_fresh(&self, now: Instant) -> bool {
		now.saturating_duration_since(self.inserted_at) < self.ttl
	}
}

/// Expire each entry after its own TTL, restarting on overwrite.
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
	fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
		Some(value.ttl)
	}

	fn expire_after_update(
		&self,
		_key: &String,
		value: &CacheEntry,
		_updated_at: Instant,
		_duration_until_expiry: Option<Duration>,
	) -> Option<Duration> {
		Some(value.ttl)
	}
}

/// Entries are stored and read as whole values, so a reader never sees an
/// address paired with another write's timestamp. Last write wins.
pub struct ResolutionCache {
	entries: Cache<String, CacheEntry>,
	default_ttl: Duration,
}

impl Default for ResolutionCache {
	fn default() -> Self {
		ResolutionCache::new(DEFAULT_TTL)
	}
}

impl ResolutionCache {
	pub fn new(default_ttl: Duration) -> Self {
		ResolutionCache {
			entries: Cache::builder().expire_after(EntryTtl).build(),
			default_ttl,
		}
	}

	pub fn lookup(&self, name: &str) -> Option<CacheEntry> {
		self.lookup_at(name, Instant::now())
	}

	/// Fresh entry for `name` as of `now`; a stale one is evicted.
	pub fn lookup_at(&self, name: &str, now: Instant) -> Option<CacheEntry> {
		let key = name.to_ascii_lowercase();
		let entry = self.entries.get(&key)?;
		if entry.is_fresh(now) {
			Some(entry)
		} else {
			self.entries.invalidate(&key);
			None
		}
	}

	/// Insert or overwrite.
	pub fn store(&self, name: &str, address: Ipv4Addr, ttl: Duration) {
		let entry = CacheEntry {
			address,
			inserted_at: Instant::now(),
			ttl,
		};
		self.entries.insert(name.to_ascii_lowercase(), entry);
	}

	pub fn store_default(&self, name: &str, address: Ipv4Addr) {
		self.store(name, address, self.default_ttl);
	}

	/// Number of live entries
	pub fn len(&self) -> u64 {
		self.entries.run_pending_tasks();
		self.entries.entry_count()
	}
}
