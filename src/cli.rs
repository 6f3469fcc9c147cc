use clap::Parser;

use crate::transport::Strategy;

/// Iterative vs. recursive DNS resolution comparison tool
#[derive(Parser, Debug)]
#[command(name = "dns-resolve-compare")]
#[command(about = "Compare iterative and recursive DNS resolution, with and without caching")]
pub struct Cli {
	/// File of domain names to resolve, one per line (repeatable; each file is one batch)
	#[arg(short = 'd', long = "domains")]
	pub domains: Vec<String>,

	/// Strategy to run (repeatable; default runs all of them)
	#[arg(short = 's', long = "strategy", value_enum)]
	pub strategies: Vec<Strategy>,

	/// Root nameserver the iterative walk starts from
	#[arg(long = "root", default_value = "198.41.0.4")]
	pub root: String,

	/// Per-hop query timeout in milliseconds
	#[arg(short = 't', long = "timeout", default_value = "2000")]
	pub timeout: u64,

	/// Cache entry lifetime in seconds
	#[arg(long = "ttl", default_value = "300")]
	pub ttl: u64,

	/// Maximum nameserver queries per iterative resolution
	#[arg(long = "max-hops", default_value = "16")]
	pub max_hops: usize,

	/// Number of concurrent resolution workers
	#[arg(short = 'w', long = "workers", default_value = "30")]
	pub workers: usize,

	/// Directory for per-run telemetry logs
	#[arg(long = "log-dir", default_value = ".")]
	pub log_dir: String,

	/// Do not write telemetry logs
	#[arg(long = "no-log")]
	pub no_log: bool,

	/// Output JSON file for batch metrics
	#[arg(short = 'o', long = "output", default_value = "comparison_results.json")]
	pub output: String,

	/// Also write batch metrics as CSV
	#[arg(long = "csv")]
	pub csv: Option<String>,
}
