use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Result};

/// A labelled set of unique domain names resolved as one batch
#[derive(Debug, Clone)]
pub struct DomainSource {
	pub label: String,
	pub domains: Vec<String>,
}

/// Canonical form of a name: trimmed, lowercase, no trailing dot.
///
/// Returns None for blank lines, comments and `localhost`.
pub fn normalize(raw: &str) -> Option<String> {
	let trimmed = raw.trim();
	if trimmed.is_empty() || trimmed.starts_with('#') {
		return None;
	}
	let name = trimmed.trim_end_matches('.').to_ascii_lowercase();
	if name.is_empty() || name == "localhost" {
		return None;
	}
	Some(name)
}

/// Deduplicate and normalize names. Order of the result is not meaningful.
pub fn unique_domains<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
	raw.into_iter()
		.filter_map(normalize)
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect()
}

/// Read domains from a file, one per line, labelled by the file stem.
///
/// Blank lines and lines starting with '#' are skipped.
pub fn read_domain_file(path: &str) -> Result<DomainSource> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| anyhow!("failed to read domain file '{}': {}", path, e))?;
	let label = Path::new(path)
		.file_stem()
		.map(|s| s.to_string_lossy().into_owned())
		.unwrap_or_else(|| path.to_string());
	Ok(DomainSource {
		label,
		domains: unique_domains(content.lines()),
	})
}

/// Popular domains used when no domain file is given.
pub fn default_source() -> DomainSource {
	let names = [
		"google.com",
		"youtube.com",
		"facebook.com",
		"amazon.com",
		"wikipedia.org",
		"reddit.com",
		"netflix.com",
		"microsoft.com",
		"apple.com",
		"cloudflare.com",
		"iana.org",
		"ietf.org",
		"mit.edu",
		"cam.ac.uk",
		"crates.io",
	];
	DomainSource {
		label: "default".to_string(),
		domains: unique_domains(names),
	}
}
