//! Switchyard binary.
//!
//! `run` drives the full engine against an in-memory container that logs
//! every deployment call; `check` resolves a manifest once and deploys
//! nothing. Both print the resulting status snapshot as JSON on stdout.

mod cli;
mod manifest;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, ManifestArgs};
use manifest::Manifest;
use switchyard_registry::{ProviderStore, Reconciler};
use switchyard_whiteboard::{MemoryContainer, RuntimeStatus, Whiteboard, WhiteboardConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.default_filter()));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	match cli.command {
		Command::Run(args) => run(args).await,
		Command::Check(args) => check(args),
	}
}

async fn run(args: ManifestArgs) -> anyhow::Result<()> {
	let config = load_config(&args)?;
	let manifest = Manifest::load(&args.manifest)?;

	let container = Arc::new(MemoryContainer::new());
	let whiteboard = Whiteboard::start(config, Arc::clone(&container))?;
	for registration in manifest.registrations() {
		whiteboard.register(registration);
	}

	let status = whiteboard.settled().await.context("whiteboard stopped before the manifest was applied")?;
	print_status(&status, args.compact)?;

	let report = whiteboard.shutdown().await?;
	tracing::info!(
		passes = whiteboard.passes(),
		container_calls = container.calls().len(),
		destroyed = report.destroyed.len(),
		"switchyard.run.done"
	);
	Ok(())
}

fn check(args: ManifestArgs) -> anyhow::Result<()> {
	let config = load_config(&args)?;
	let manifest = Manifest::load(&args.manifest)?;

	let store = ProviderStore::new();
	for registration in manifest.registrations() {
		store.register(registration);
	}
	let resolution = Reconciler::new().run(&store.snapshot(), &config.initial_runtime_properties());
	print_status(&RuntimeStatus::from_resolution(&resolution, resolution.change_count, 1), args.compact)
}

fn load_config(args: &ManifestArgs) -> anyhow::Result<WhiteboardConfig> {
	match &args.config {
		Some(path) => Ok(WhiteboardConfig::load(path)?),
		None => Ok(WhiteboardConfig::default()),
	}
}

fn print_status(status: &RuntimeStatus, compact: bool) -> anyhow::Result<()> {
	let json = if compact {
		serde_json::to_string(status)?
	} else {
		serde_json::to_string_pretty(status)?
	};
	println!("{json}");
	Ok(())
}
