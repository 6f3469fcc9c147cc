use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use tokio::net::UdpSocket;

use crate::error::ResolveError;

/// What a nameserver told us, in the order the iterative walk cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
	/// Address record in the answer section
	Answer(Ipv4Addr),
	/// Answer section holds only an alias; the walk restarts for the target
	Alias(String),
	/// Delegation with a glue address in the additional section
	Referral(Ipv4Addr),
	/// Delegation naming a nameserver but carrying no address for it
	NeedsGlue(String),
}

/// One UDP round trip to one nameserver.
///
/// The iterative resolver only ever talks to the network through this seam.
pub trait Exchange: Send + Sync {
	fn exchange(
		&self,
		server: SocketAddr,
		domain: &str,
		timeout: Duration,
	) -> impl Future<Output = Result<Message, ResolveError>> + Send;
}

/// Build an A query for `domain`.
///
/// Iterative walks send queries with recursion-desired cleared so that
/// authorities hand back referrals instead of doing the work for us.
/// Returns the serialized query bytes ready to send over UDP.
pub fn build_query(
	domain: &str,
	txid: u16,
	recursion_desired: bool,
) -> Result<Vec<u8>, ResolveError> {
	let name = Name::from_ascii(domain)
		.map_err(|e| ResolveError::Malformed(format!("invalid domain name '{}': {}", domain, e)))?;

	let mut message = Message::new();
	message.set_id(txid);
	message.set_recursion_desired(recursion_desired);
	message.add_query(Query::query(name, RecordType::A));

	message.to_vec()
		.map_err(|e| ResolveError::Malformed(format!("failed to serialize DNS query: {}", e)))
}

/// Parse a DNS response and validate its transaction ID.
pub fn parse_response(bytes: &[u8], expected_txid: u16) -> Result<Message, ResolveError> {
	let message = Message::from_vec(bytes)
		.map_err(|e| ResolveError::Malformed(e.to_string()))?;

	if message.id() != expected_txid {
		return Err(ResolveError::Malformed(format!(
			"txid mismatch: expected {}, got {}",
			expected_txid, message.id()
		)));
	}

	if message.message_type() != MessageType::Response {
		return Err(ResolveError::Malformed("received a query instead of a response".to_string()));
	}

	Ok(message)
}

/// Classify a response: answer first, then glue referral, then glue-less
/// referral. Anything else ends the walk.
pub fn classify(message: &Message) -> Result<Reply, ResolveError> {
	if !message.answers().is_empty() {
		if let Some(ip) = first_a(message.answers()) {
			return Ok(Reply::Answer(ip));
		}
		let alias = message.answers().iter().find_map(|r| match r.data() {
			RData::CNAME(cname) => Some(host_text(&cname.0)),
			_ => None,
		});
		return match alias {
			Some(target) => Ok(Reply::Alias(target)),
			None => Err(ResolveError::NoAddressRecord),
		};
	}

	if let Some(ip) = first_a(message.additionals()) {
		return Ok(Reply::Referral(ip));
	}

	let ns_name = message.name_servers().iter().find_map(|r| match r.data() {
		RData::NS(ns) => Some(host_text(&ns.0)),
		_ => None,
	});
	if let Some(ns) = ns_name {
		return Ok(Reply::NeedsGlue(ns));
	}

	Err(ResolveError::NoReferral { rcode: rcode_text(message.response_code()) })
}

fn first_a(records: &[hickory_proto::rr::Record]) -> Option<Ipv4Addr> {
	records.iter().find_map(|r| match r.data() {
		RData::A(a) => Some(a.0),
		_ => None,
	})
}

/// Canonical text form of a name: lowercase, no trailing dot
pub fn host_text(name: &Name) -> String {
	name.to_ascii().trim_end_matches('.').to_ascii_lowercase()
}

fn rcode_text(rcode: ResponseCode) -> String {
	format!("{}", rcode)
}

/// Plain UDP transport, one socket per exchange.
#[derive(Debug, Clone, Default)]
pub struct UdpExchange;

impl Exchange for UdpExchange {
	/// Creates a dedicated socket per query to avoid response stealing between
	/// concurrent workers.
	async fn exchange(
		&self,
		server: SocketAddr,
		domain: &str,
		timeout: Duration,
	) -> Result<Message, ResolveError> {
		let txid: u16 = rand::random();
		let query_bytes = build_query(domain, txid, false)?;

		let bind_addr = if server.is_ipv4() {
			"0.0.0.0:0"
		} else {
			"[::]:0"
		};
		let socket = UdpSocket::bind(bind_addr).await?;

		let start = Instant::now();
		socket.send_to(&query_bytes, server).await?;

		// Skip stray datagrams and txid mismatches until the deadline
		let mut buf = vec![0u8; 4096];
		loop {
			let remaining = match timeout.checked_sub(start.elapsed()) {
				Some(remaining) if !remaining.is_zero() => remaining,
				_ => break,
			};

			match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
				Ok(Ok((len, src))) => {
					if src != server {
						continue;
					}
					if let Ok(message) = parse_response(&buf[..len], txid) {
						return Ok(message);
					}
				}
				Ok(Err(e)) => return Err(ResolveError::Io(e)),
				Err(_) => break,
			}
		}

		Err(ResolveError::Timeout(timeout))
	}
}
