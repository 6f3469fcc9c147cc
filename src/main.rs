mod bench;
mod cache;
mod cli;
mod dns;
mod domains;
mod error;
mod iterative;
mod lookup;
mod output;
mod recursive;
mod resolver;
mod stats;
mod telemetry;
#[cfg(test)]
mod testutil;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::bench::{Resolvers, RunContext};
use crate::cache::ResolutionCache;
use crate::cli::Cli;
use crate::dns::UdpExchange;
use crate::lookup::SystemLookup;
use crate::output::RunResults;
use crate::telemetry::TelemetrySink;
use crate::transport::{BatchConfig, ResolveConfig, Strategy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();

	// Each domain file is one batch input
	let sources = if cli.domains.is_empty() {
		vec![domains::default_source()]
	} else {
		cli.domains.iter()
			.map(|path| domains::read_domain_file(path))
			.collect::<anyhow::Result<Vec<_>>>()?
	};

	let strategies = if cli.strategies.is_empty() {
		Strategy::ALL.to_vec()
	} else {
		let mut s = cli.strategies.clone();
		s.sort();
		s.dedup();
		s
	};

	let resolve_config = ResolveConfig {
		root: resolver::parse_server(&cli.root)?.addr,
		timeout: Duration::from_millis(cli.timeout),
		max_hops: cli.max_hops,
	};
	let batch_config = BatchConfig {
		workers: cli.workers,
		default_ttl: Duration::from_secs(cli.ttl),
		log_dir: (!cli.no_log).then(|| PathBuf::from(&cli.log_dir)),
	};

	output::print_config_summary(&sources, &strategies, &resolve_config, &batch_config);

	if let Some(dir) = &batch_config.log_dir {
		std::fs::create_dir_all(dir)
			.with_context(|| format!("failed to create log directory '{}'", dir.display()))?;
	}

	let lookup = SystemLookup::new(resolve_config.timeout)?;
	let resolvers = Arc::new(Resolvers::new(resolve_config, UdpExchange, lookup));

	let mut results = RunResults::new();
	for &strategy in &strategies {
		println!("Running {}...", strategy.label());

		// One cache per strategy, kept across its inputs
		let cache = Arc::new(ResolutionCache::new(batch_config.default_ttl));
		let mut runs = Vec::new();

		for source in &sources {
			let sink = match (&batch_config.log_dir, strategy.records_steps()) {
				(Some(dir), true) => {
					let path = dir.join(format!("{}_{}.log", strategy.label(), source.label));
					TelemetrySink::create(&path)
						.with_context(|| format!("failed to create telemetry log '{}'", path.display()))?
				}
				_ => TelemetrySink::discard(),
			};
			let run = RunContext { cache: cache.clone(), sink: Arc::new(sink) };

			println!("  {}: {} domains, {} workers", source.label, source.domains.len(), batch_config.workers);
			match bench::run_batch(
				resolvers.clone(), &source.label, &source.domains, strategy, &run, batch_config.workers,
			).await {
				Some(metrics) => {
					println!(
						"  {}: {}/{} resolved",
						source.label, metrics.successfully_resolved, metrics.total_queries,
					);
					runs.push(metrics);
				}
				None => println!("  {}: no domains, skipped", source.label),
			}
		}

		if strategy.caching() {
			println!("  cache holds {} entries", cache.len());
		}
		results.insert(strategy.label().to_string(), runs);
	}

	output::print_results_table(&results);
	output::write_json(&cli.output, &results)?;

	if let Some(path) = &cli.csv {
		output::write_csv(path, &results)?;
	}

	Ok(())
}
