//! Registration manifest.
//!
//! A manifest is a TOML document with one `[[provider]]` table per
//! registration. Each table is a plain property map:
//!
//! ```toml
//! [[provider]]
//! "service.id" = 1
//! "whiteboard.application.base" = "/shop"
//! "whiteboard.name" = "shop"
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use switchyard_registry::{Properties, Registration};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
	#[serde(default, rename = "provider")]
	pub providers: Vec<Properties>,
}

impl Manifest {
	pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
		Ok(toml::from_str(input)?)
	}

	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let input = std::fs::read_to_string(path).with_context(|| format!("reading manifest {}", path.display()))?;
		let manifest = Self::from_toml_str(&input).with_context(|| format!("parsing manifest {}", path.display()))?;
		tracing::debug!(path = %path.display(), providers = manifest.providers.len(), "switchyard.manifest.loaded");
		Ok(manifest)
	}

	pub fn registrations(&self) -> impl Iterator<Item = Registration> + '_ {
		self.providers.iter().cloned().map(Registration::new)
	}
}
