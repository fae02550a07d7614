//! Collision rules.
//!
//! # Role
//!
//! Each rule takes candidates already sorted by the total order and reports
//! which ones lose, and to whom. The winner of a group is always the earliest
//! candidate, so a single forward scan per rule suffices.
//!
//! # Invariants
//!
//! - A loser is never reported against a candidate that itself lost the same rule.
//! - Two entries sharing one id never collide on name (a registration that is
//!   both a resource and an extension).

use rustc_hash::FxHashMap;

use crate::provider::{ApplicationProvider, FailureReason, ProviderId, ProviderKind};

/// A lost collision: `loser` and `winner` index into the scanned slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
	pub loser: usize,
	pub winner: usize,
	pub rule: CollisionRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionRule {
	/// Same normalized base path.
	Path,
	/// Same name across any provider kinds.
	Name,
	/// More than one default application.
	Default,
}

impl CollisionRule {
	pub const fn reason(self) -> FailureReason {
		match self {
			Self::Path | Self::Default => FailureReason::Shadowed,
			Self::Name => FailureReason::DuplicateName,
		}
	}
}

/// Applications sharing a base path: all but the first lose.
pub fn path_collisions(apps: &[&ApplicationProvider]) -> Vec<Collision> {
	let mut winners: FxHashMap<&str, usize> = FxHashMap::default();
	let mut lost = Vec::new();
	for (idx, app) in apps.iter().enumerate() {
		match winners.get(app.base_path()) {
			Some(&winner) => lost.push(Collision {
				loser: idx,
				winner,
				rule: CollisionRule::Path,
			}),
			None => {
				winners.insert(app.base_path(), idx);
			}
		}
	}
	lost
}

/// One entry of the cross-kind name pool.
#[derive(Debug, Clone, Copy)]
pub struct NameEntry<'a> {
	pub kind: ProviderKind,
	pub id: ProviderId,
	pub name: &'a str,
	/// Default applications are left to [`default_collisions`].
	pub exempt: bool,
}

/// Providers sharing a name with an earlier provider of a different id lose.
pub fn name_collisions(pool: &[NameEntry<'_>]) -> Vec<Collision> {
	let mut winners: FxHashMap<&str, usize> = FxHashMap::default();
	let mut lost = Vec::new();
	for (idx, entry) in pool.iter().enumerate() {
		if entry.exempt {
			continue;
		}
		match winners.get(entry.name) {
			Some(&winner) if pool[winner].id != entry.id => lost.push(Collision {
				loser: idx,
				winner,
				rule: CollisionRule::Name,
			}),
			Some(_) => {}
			None => {
				winners.insert(entry.name, idx);
			}
		}
	}
	lost
}

/// Default applications after the first lose.
pub fn default_collisions(apps: &[&ApplicationProvider]) -> Vec<Collision> {
	let mut defaults = apps.iter().enumerate().filter(|(_, app)| app.is_default()).map(|(idx, _)| idx);
	let Some(winner) = defaults.next() else {
		return Vec::new();
	};
	defaults
		.map(|loser| Collision {
			loser,
			winner,
			rule: CollisionRule::Default,
		})
		.collect()
}
