use std::net::SocketAddr;

use anyhow::{anyhow, Result};

/// A nameserver address with a display label
#[derive(Debug, Clone)]
pub struct Nameserver {
	pub label: String,
	pub addr: SocketAddr,
}

/// Parse a nameserver address string, defaulting the port to 53.
///
/// Supports formats:
///   "198.41.0.4"           -- IPv4, default port 53
///   "198.41.0.4:53"        -- IPv4 with explicit port
///   "2001:503:ba3e::2:30"  -- bare IPv6, default port 53
///   "[2001:503:ba3e::2:30]:53" -- bracketed IPv6 with port
pub fn parse_server(input: &str) -> Result<Nameserver> {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		return Err(anyhow!("empty nameserver address"));
	}

	let addr: SocketAddr = if trimmed.starts_with('[') {
		trimmed.parse()
			.map_err(|e| anyhow!("invalid bracketed IPv6 address '{}': {}", trimmed, e))?
	} else if trimmed.contains("::") || trimmed.matches(':').count() > 1 {
		let ip = trimmed.parse()
			.map_err(|e| anyhow!("invalid IPv6 address '{}': {}", trimmed, e))?;
		SocketAddr::new(ip, 53)
	} else if let Ok(addr) = trimmed.parse::<SocketAddr>() {
		addr
	} else {
		let ip = trimmed.parse()
			.map_err(|e| anyhow!("invalid IP address '{}': {}", trimmed, e))?;
		SocketAddr::new(ip, 53)
	};

	let label = format!("{}", addr.ip());
	Ok(Nameserver { label, addr })
}

/// Nameservers listed in /etc/resolv.conf (Unix only).
///
/// Returns an empty vec on non-Unix platforms or if the file cannot be read.
pub fn system_resolvers() -> Vec<Nameserver> {
	match std::fs::read_to_string("/etc/resolv.conf") {
		Ok(content) => parse_resolv_conf(&content),
		Err(_) => Vec::new(),
	}
}

fn parse_resolv_conf(content: &str) -> Vec<Nameserver> {
	let mut servers = Vec::new();
	for line in content.lines() {
		let trimmed = line.trim();
		if !trimmed.starts_with("nameserver") {
			continue;
		}
		let parts: Vec<&str> = trimmed.split_whitespace().collect();
		if parts.len() >= 2 {
			if let Ok(server) = parse_server(parts[1]) {
				servers.push(server);
			}
		}
	}
	servers
}
