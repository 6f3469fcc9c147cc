//! In-memory stand-ins for the network, shared by the unit tests.

use std::collections::HashMap;
use std::io::{self, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::rdata::{A, NS};
use hickory_proto::rr::{Name, RData, Record, RecordType};

use crate::dns::Exchange;
use crate::error::{LookupResult, ResolveError};
use crate::lookup::AddressLookup;

fn fqdn(name: &str) -> Name {
	Name::from_ascii(format!("{}.", name.trim_end_matches('.'))).unwrap()
}

pub fn empty(domain: &str) -> Message {
	let mut message = Message::new();
	message.set_message_type(MessageType::Response);
	message.add_query(Query::query(fqdn(domain), RecordType::A));
	message
}

pub fn answer(domain: &str, ip: Ipv4Addr) -> Message {
	let mut message = empty(domain);
	message.add_answer(Record::from_rdata(fqdn(domain), 300, RData::A(A(ip))));
	message
}

pub fn glueless_referral(domain: &str, ns: &str) -> Message {
	let mut message = empty(domain);
	let zone = domain.rsplit('.').next().unwrap_or(domain);
	message.add_name_server(Record::from_rdata(fqdn(zone), 172800, RData::NS(NS(fqdn(ns)))));
	message
}

pub fn glue_referral(domain: &str, ns: &str, ns_ip: Ipv4Addr) -> Message {
	let mut message = glueless_referral(domain, ns);
	message.add_additional(Record::from_rdata(fqdn(ns), 172800, RData::A(A(ns_ip))));
	message
}

pub fn server(ip: [u8; 4]) -> SocketAddr {
	SocketAddr::new(Ipv4Addr::from(ip).into(), 53)
}

#[derive(Clone)]
pub enum Script {
	Reply(Message),
	Timeout,
	Panic,
}

/// Exchange that answers from a fixed table keyed by (server, domain)
#[derive(Default)]
pub struct ScriptedExchange {
	table: HashMap<(SocketAddr, String), Script>,
	sent: Mutex<Vec<(SocketAddr, String)>>,
}

impl ScriptedExchange {
	pub fn on(mut self, server: SocketAddr, domain: &str, script: Script) -> Self {
		self.table.insert((server, domain.to_string()), script);
		self
	}

	/// Every (server, domain) pair queried so far, in send order
	pub fn sent(&self) -> Vec<(SocketAddr, String)> {
		self.sent.lock().unwrap().clone()
	}
}

impl Exchange for ScriptedExchange {
	async fn exchange(
		&self,
		server: SocketAddr,
		domain: &str,
		timeout: Duration,
	) -> Result<Message, ResolveError> {
		self.sent.lock().unwrap().push((server, domain.to_string()));
		match self.table.get(&(server, domain.to_string())).cloned() {
			Some(Script::Reply(message)) => Ok(message),
			Some(Script::Panic) => panic!("scripted panic for {}", domain),
			Some(Script::Timeout) | None => Err(ResolveError::Timeout(timeout)),
		}
	}
}

/// Trusted lookup backed by a fixed table
#[derive(Default)]
pub struct StaticLookup {
	table: HashMap<String, Ipv4Addr>,
}

impl StaticLookup {
	pub fn with(mut self, name: &str, ip: Ipv4Addr) -> Self {
		self.table.insert(name.to_string(), ip);
		self
	}
}

impl AddressLookup for StaticLookup {
	async fn lookup_ipv4(&self, name: &str) -> LookupResult {
		self.table.get(name).copied()
			.ok_or_else(|| ResolveError::Lookup(format!("no records found for {}", name)))
	}

	fn endpoint(&self) -> &str {
		"127.0.0.53"
	}
}

/// Writer whose bytes can be read back after the sink is done with them
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
	pub fn lines(&self) -> Vec<serde_json::Value> {
		let bytes = self.0.lock().unwrap().clone();
		String::from_utf8(bytes).unwrap()
			.lines()
			.map(|l| serde_json::from_str(l).unwrap())
			.collect()
	}

	/// Records for one domain, in the order they were written
	pub fn steps_for(&self, domain: &str) -> Vec<serde_json::Value> {
		self.lines().into_iter()
			.filter(|v| v["domain_name_queried"] == domain)
			.collect()
	}
}

impl Write for SharedBuffer {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}
