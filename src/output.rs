use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use comfy_table::{Table, ContentArrangement, presets::UTF8_FULL};

use crate::domains::DomainSource;
use crate::stats::BatchMetrics;
use crate::transport::{BatchConfig, ResolveConfig, Strategy};

/// Strategy label -> one metrics entry per input source, in input order
pub type RunResults = BTreeMap<String, Vec<BatchMetrics>>;

/// Print a summary of the run configuration before starting.
pub fn print_config_summary(
	sources: &[DomainSource],
	strategies: &[Strategy],
	resolve: &ResolveConfig,
	batch: &BatchConfig,
) {
	println!("DNS Resolution Comparison");
	println!("=========================");
	println!("Inputs:         {}", sources.len());
	for s in sources {
		println!("  - {} ({} domains)", s.label, s.domains.len());
	}
	let labels: Vec<&str> = strategies.iter().map(|s| s.label()).collect();
	println!("Strategies:     {}", labels.join(", "));
	println!("Root server:    {}", resolve.root);
	println!("Timeout:        {} ms", resolve.timeout.as_millis());
	println!("Max hops:       {}", resolve.max_hops);
	println!("Cache TTL:      {} s", batch.default_ttl.as_secs());
	println!("Workers:        {}", batch.workers);
	match &batch.log_dir {
		Some(dir) => println!("Telemetry dir:  {}", dir.display()),
		None => println!("Telemetry dir:  (disabled)"),
	}
	println!();
}

/// Print all batch metrics as a formatted table.
pub fn print_results_table(results: &RunResults) {
	let mut table = Table::new();
	table.load_preset(UTF8_FULL);
	table.set_content_arrangement(ContentArrangement::Dynamic);
	table.set_header(vec![
		"Strategy", "Input", "Total",
		"Resolved", "Failed",
		"Mean", "p50", "p95",
		"Throughput",
	]);

	for m in results.values().flatten() {
		table.add_row(vec![
			m.resolver.clone(),
			m.source.clone(),
			m.total_queries.to_string(),
			m.successfully_resolved.to_string(),
			m.failed_resolutions.to_string(),
			format!("{:.1} ms", m.avg_lookup_latency_ms),
			format!("{:.1} ms", m.p50_lookup_latency_ms),
			format!("{:.1} ms", m.p95_lookup_latency_ms),
			format!("{:.2} q/s", m.avg_throughput_qps),
		]);
	}

	println!("\nResults");
	println!("=======\n");
	println!("{table}");
}

/// Write the results document as pretty-printed JSON.
pub fn write_json(path: &str, results: &RunResults) -> Result<()> {
	let file = File::create(path)
		.with_context(|| format!("failed to create results file '{}'", path))?;
	serde_json::to_writer_pretty(BufWriter::new(file), results)
		.with_context(|| format!("failed to write results to '{}'", path))?;
	println!("\nResults written to: {}", path);
	Ok(())
}

/// Write batch metrics to a CSV file, one row per (strategy, input).
pub fn write_csv(path: &str, results: &RunResults) -> Result<()> {
	let mut writer = csv::Writer::from_path(path)?;
	for m in results.values().flatten() {
		writer.serialize(m)?;
	}
	writer.flush()?;
	println!("Metrics written to: {}", path);
	Ok(())
}
