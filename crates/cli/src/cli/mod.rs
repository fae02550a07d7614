//! CLI schema for the switchyard binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(about = "Reconciles whiteboard registrations into deployed applications")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Debug logging for the whiteboard crates
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Start the engine, submit the manifest, wait for the pass and print the status
	Run(ManifestArgs),
	/// Resolve the manifest once without deploying anything and print the status
	Check(ManifestArgs),
}

/// Arguments shared by every subcommand.
#[derive(Args, Debug)]
pub struct ManifestArgs {
	/// TOML manifest listing `[[provider]]` registrations
	pub manifest: PathBuf,

	/// Whiteboard configuration file (defaults apply when omitted)
	#[arg(short, long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Print the status as a single line of JSON
	#[arg(long)]
	pub compact: bool,
}

impl Cli {
	/// Filter directive used when `RUST_LOG` is unset.
	pub fn default_filter(&self) -> &'static str {
		if self.verbose { "switchyard=debug" } else { "switchyard=info" }
	}
}
