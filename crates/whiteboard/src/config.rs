//! Engine configuration.
//!
//! A [`WhiteboardConfig`] is read once at start. Its `runtime_properties`
//! seed the [`RuntimeProperties`] collaborator, which can be replaced later
//! and is re-read at the start of every pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use switchyard_registry::{Properties, keys};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },

	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("invalid value for `{field}`: {reason}")]
	Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_DEBOUNCE_MS: u64 = 50;
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WhiteboardConfig {
	/// Name of this whiteboard, exposed to container selectors as `whiteboard.name`.
	pub name: String,
	/// Quiet interval before a requested pass runs.
	pub debounce_ms: u64,
	/// Upper bound on how long shutdown waits for the final teardown.
	pub shutdown_timeout_ms: u64,
	/// Properties `whiteboard.target` selectors are evaluated against.
	pub runtime_properties: Properties,
}

impl Default for WhiteboardConfig {
	fn default() -> Self {
		Self {
			name: "switchyard".to_string(),
			debounce_ms: DEFAULT_DEBOUNCE_MS,
			shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
			runtime_properties: Properties::new(),
		}
	}
}

impl WhiteboardConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(raw: &str) -> Result<Self> {
		let config: Self = toml::from_str(raw)?;
		config.validate()?;
		Ok(config)
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::from_toml_str(&raw)?;
		tracing::debug!(path = %path.display(), name = %config.name, "whiteboard.config.loaded");
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.name.trim().is_empty() {
			return Err(ConfigError::Invalid {
				field: "name",
				reason: "must not be empty".to_string(),
			});
		}
		if self.debounce_ms == 0 {
			return Err(ConfigError::Invalid {
				field: "debounce_ms",
				reason: "must be at least 1".to_string(),
			});
		}
		if self.shutdown_timeout_ms == 0 {
			return Err(ConfigError::Invalid {
				field: "shutdown_timeout_ms",
				reason: "must be at least 1".to_string(),
			});
		}
		Ok(())
	}

	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_millis(self.shutdown_timeout_ms)
	}

	/// The configured runtime properties, with `whiteboard.name` filled in
	/// from [`Self::name`] unless set explicitly.
	pub fn initial_runtime_properties(&self) -> Properties {
		let mut props = self.runtime_properties.clone();
		if !props.contains_key(keys::NAME) {
			props.insert(keys::NAME, self.name.as_str());
		}
		props
	}
}

type Listener = Arc<dyn Fn() + Send + Sync>;

struct RuntimeInner {
	current: ArcSwap<Properties>,
	revision: AtomicU64,
	listener: RwLock<Option<Listener>>,
}

/// The whiteboard's own properties, shared between the engine and its owner.
///
/// Reads are lock-free. [`RuntimeProperties::replace`] bumps the revision and
/// notifies the engine, which schedules a pass.
///
/// The revision is bumped after the new properties are stored, so a reader
/// that loads the revision before the properties never pairs a newer
/// revision with older properties.
#[derive(Clone)]
pub struct RuntimeProperties {
	inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for RuntimeProperties {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("RuntimeProperties").field(&self.inner.current.load()).finish()
	}
}

impl RuntimeProperties {
	pub fn new(initial: Properties) -> Self {
		Self {
			inner: Arc::new(RuntimeInner {
				current: ArcSwap::from_pointee(initial),
				revision: AtomicU64::new(0),
				listener: RwLock::new(None),
			}),
		}
	}

	pub fn load(&self) -> Arc<Properties> {
		self.inner.current.load_full()
	}

	/// Number of replacements so far.
	pub fn revision(&self) -> u64 {
		self.inner.revision.load(Ordering::Acquire)
	}

	/// Publishes new properties and notifies the listener.
	pub fn replace(&self, next: Properties) {
		self.inner.current.store(Arc::new(next));
		self.inner.revision.fetch_add(1, Ordering::AcqRel);
		let listener = self.inner.listener.read().clone();
		if let Some(listener) = listener {
			listener();
		}
	}

	pub(crate) fn set_listener(&self, listener: Listener) {
		*self.inner.listener.write() = Some(listener);
	}

	pub(crate) fn clear_listener(&self) {
		*self.inner.listener.write() = None;
	}
}
