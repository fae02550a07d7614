use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use switchyard_selector::Properties;

use super::collision::{self, Collision, NameEntry};
use super::deps::{DependencyGraph, Member};
use super::order::{cmp_core, cmp_pooled};
use super::{AcceptedApplication, AttachedContent, Failure, Resolution, matcher};
use crate::provider::{
	ApplicationProvider, ContentKind, ContentProvider, FailureReason, Provider, ProviderCore, ProviderId, ProviderKind, ProviderRecord, Status,
};
use crate::store::{StoreSnapshot, Stored};

/// Runs reconciliation passes.
///
/// Owns the implicit default application, whose identity is fixed for the
/// reconciler's lifetime so repeated passes over the same snapshot agree.
#[derive(Debug, Clone)]
pub struct Reconciler {
	default_application: Arc<ApplicationProvider>,
}

impl Default for Reconciler {
	fn default() -> Self {
		Self::new()
	}
}

impl Reconciler {
	pub fn new() -> Self {
		Self {
			default_application: Arc::new(ApplicationProvider::builtin_default()),
		}
	}

	/// The implicit default application injected into every pass.
	pub fn builtin_default(&self) -> &Arc<ApplicationProvider> {
		&self.default_application
	}

	/// Computes the accepted assignment for one snapshot.
	pub fn run(&self, snapshot: &StoreSnapshot, runtime: &Properties) -> Resolution {
		let builtin = Stored {
			revision: 0,
			provider: Arc::clone(&self.default_application),
		};
		let mut pass = Pass {
			runtime,
			failures: FxHashMap::default(),
		};

		let apps = pass.admit(snapshot.applications().cloned().chain(std::iter::once(builtin)), ProviderRecord::Application);
		let resources = pass.admit(snapshot.resources().cloned(), ProviderRecord::Resource);
		let extensions = pass.admit(snapshot.extensions().cloned(), ProviderRecord::Extension);

		let lost = collision::path_collisions(&app_refs(&apps));
		let apps = pass.apply(apps, &lost, ProviderRecord::Application);

		let (apps, resources, extensions) = pass.resolve_names(apps, resources, extensions);

		let lost = collision::default_collisions(&app_refs(&apps));
		let apps = pass.apply(apps, &lost, ProviderRecord::Application);

		let (accepted, default_application) = pass.assign(&apps, &resources, &extensions);
		pass.finish(snapshot.change_count, accepted, default_application)
	}
}

fn app_refs(apps: &[Stored<ApplicationProvider>]) -> Vec<&ApplicationProvider> {
	apps.iter().map(|stored| stored.provider.as_ref()).collect()
}

fn content_record(provider: &Arc<ContentProvider>) -> ProviderRecord {
	match provider.content_kind() {
		ContentKind::Resource => ProviderRecord::Resource(Arc::clone(provider)),
		ContentKind::Extension => ProviderRecord::Extension(Arc::clone(provider)),
	}
}

#[derive(Debug, Clone, Default)]
struct Placement {
	attached: usize,
	detached: bool,
	in_default: bool,
	last: Option<(FailureReason, String)>,
}

struct Pass<'r> {
	runtime: &'r Properties,
	failures: FxHashMap<(ProviderKind, ProviderId), Failure>,
}

impl Pass<'_> {
	fn fail(&mut self, provider: ProviderRecord, reason: FailureReason, detail: String) {
		tracing::trace!(kind = %provider.kind(), id = %provider.id(), %reason, %detail, "registry.pass.failed");
		self.failures.insert((provider.kind(), provider.id()), Failure { provider, reason, detail });
	}

	/// Drops providers failed at construction or excluded by the runtime, and
	/// sorts the rest by the total order.
	fn admit<T: Provider>(&mut self, candidates: impl Iterator<Item = Stored<T>>, wrap: fn(Arc<T>) -> ProviderRecord) -> Vec<Stored<T>> {
		let mut admitted: Vec<Stored<T>> = Vec::new();
		for stored in candidates {
			if let Status::Failed { reason, detail } = stored.provider.status() {
				let (reason, detail) = (*reason, detail.clone());
				self.fail(wrap(Arc::clone(&stored.provider)), reason, detail);
				continue;
			}
			if !matcher::can_handle_runtime(stored.provider.as_ref(), self.runtime) {
				tracing::trace!(kind = %stored.provider.kind(), id = %stored.provider.id(), "registry.pass.runtime_filtered");
				continue;
			}
			admitted.push(stored);
		}
		admitted.sort_by(|a, b| cmp_core(a.provider.core(), b.provider.core()));
		admitted
	}

	fn apply<T: Provider>(&mut self, candidates: Vec<Stored<T>>, lost: &[Collision], wrap: fn(Arc<T>) -> ProviderRecord) -> Vec<Stored<T>> {
		if lost.is_empty() {
			return candidates;
		}
		let mut losers = FxHashSet::default();
		for collision in lost {
			let winner = &candidates[collision.winner].provider;
			let loser = &candidates[collision.loser].provider;
			let detail = format!("lost to '{}' ({})", winner.name(), winner.id());
			self.fail(wrap(Arc::clone(loser)), collision.rule.reason(), detail);
			losers.insert(collision.loser);
		}
		candidates
			.into_iter()
			.enumerate()
			.filter(|(idx, _)| !losers.contains(idx))
			.map(|(_, stored)| stored)
			.collect()
	}

	/// Applies the name rule across all three kinds at once.
	fn resolve_names(
		&mut self,
		apps: Vec<Stored<ApplicationProvider>>,
		resources: Vec<Stored<ContentProvider>>,
		extensions: Vec<Stored<ContentProvider>>,
	) -> (Vec<Stored<ApplicationProvider>>, Vec<Stored<ContentProvider>>, Vec<Stored<ContentProvider>>) {
		let mut slots: Vec<(ProviderKind, usize)> = (0..apps.len())
			.map(|idx| (ProviderKind::Application, idx))
			.chain((0..resources.len()).map(|idx| (ProviderKind::Resource, idx)))
			.chain((0..extensions.len()).map(|idx| (ProviderKind::Extension, idx)))
			.collect();
		slots.sort_by(|a, b| {
			cmp_pooled(
				(core_at(&apps, &resources, &extensions, *a), a.0),
				(core_at(&apps, &resources, &extensions, *b), b.0),
			)
		});

		let pool: Vec<NameEntry<'_>> = slots
			.iter()
			.map(|&(kind, idx)| {
				let core = core_at(&apps, &resources, &extensions, (kind, idx));
				NameEntry {
					kind,
					id: core.id,
					name: &core.name,
					exempt: kind == ProviderKind::Application && apps[idx].provider.is_default(),
				}
			})
			.collect();

		let mut losers: FxHashSet<(ProviderKind, usize)> = FxHashSet::default();
		for collision in collision::name_collisions(&pool) {
			let winner = pool[collision.winner];
			let (kind, idx) = slots[collision.loser];
			let record = match kind {
				ProviderKind::Application => ProviderRecord::Application(Arc::clone(&apps[idx].provider)),
				ProviderKind::Resource => content_record(&resources[idx].provider),
				ProviderKind::Extension => content_record(&extensions[idx].provider),
			};
			let detail = format!("name '{}' already taken by {} {}", winner.name, winner.kind, winner.id);
			self.fail(record, collision.rule.reason(), detail);
			losers.insert((kind, idx));
		}

		(
			survivors(apps, ProviderKind::Application, &losers),
			survivors(resources, ProviderKind::Resource, &losers),
			survivors(extensions, ProviderKind::Extension, &losers),
		)
	}

	/// Attaches content, resolves dependencies per application and returns the
	/// accepted applications with the effective default's id.
	fn assign(
		&mut self,
		apps: &[Stored<ApplicationProvider>],
		resources: &[Stored<ContentProvider>],
		extensions: &[Stored<ContentProvider>],
	) -> (Vec<AcceptedApplication>, Option<ProviderId>) {
		let effective = apps
			.iter()
			.position(|app| app.provider.is_default())
			.or_else(|| apps.iter().position(|app| app.provider.is_shadowing_default()));

		let content: Vec<&Stored<ContentProvider>> = resources.iter().chain(extensions).collect();
		let mut members: Vec<Vec<usize>> = vec![Vec::new(); apps.len()];
		let mut placement: Vec<Placement> = vec![Placement::default(); content.len()];

		for (ci, stored) in content.iter().enumerate() {
			let provider = &stored.provider;
			let mut targets: Vec<usize> = apps
				.iter()
				.enumerate()
				.filter(|(ai, app)| matcher::can_attach(provider, &app.provider, Some(*ai) == effective))
				.map(|(ai, _)| ai)
				.collect();
			if targets.is_empty() && provider.accepts_default_fallback() {
				targets.extend(effective);
			}
			if targets.is_empty() {
				let detail = match provider.application_select() {
					Some(select) => format!("no application matches {select}"),
					None => "no application available".to_string(),
				};
				self.fail(content_record(provider), FailureReason::RequiredApplicationUnavailable, detail);
				continue;
			}
			for ai in targets {
				members[ai].push(ci);
				placement[ci].attached += 1;
				placement[ci].in_default |= Some(ai) == effective;
			}
		}

		let order: Vec<usize> = (0..apps.len()).filter(|ai| Some(*ai) != effective).chain(effective).collect();
		let mut accepted = Vec::with_capacity(apps.len());
		for ai in order {
			if Some(ai) == effective {
				for (ci, place) in placement.iter_mut().enumerate() {
					if place.attached == 0 && place.detached && !place.in_default && content[ci].provider.accepts_default_fallback() {
						members[ai].push(ci);
						place.attached += 1;
						place.in_default = true;
					}
				}
				members[ai].sort_unstable();
			}
			if let Some(app) = self.resolve_application(&apps[ai], &members[ai], &content, &mut placement) {
				accepted.push(app);
			}
		}

		for (ci, place) in placement.iter_mut().enumerate() {
			if place.attached == 0
				&& let Some((reason, detail)) = place.last.take()
			{
				self.fail(content_record(&content[ci].provider), reason, detail);
			}
		}

		let default_id = effective.map(|ai| apps[ai].provider.id());
		(accepted, default_id)
	}

	fn resolve_application(
		&mut self,
		app: &Stored<ApplicationProvider>,
		member_idx: &[usize],
		content: &[&Stored<ContentProvider>],
		placement: &mut [Placement],
	) -> Option<AcceptedApplication> {
		let members: Vec<Member<'_>> = member_idx
			.iter()
			.map(|&ci| {
				let provider = &content[ci].provider;
				Member {
					kind: provider.content_kind(),
					properties: provider.properties(),
					selectors: provider.dependency_selectors(),
				}
			})
			.collect();
		let outcome = DependencyGraph::check(app.provider.properties(), app.provider.dependency_selectors(), &members, self.runtime);

		for (mi, broken) in &outcome.removed {
			let detail = format!("unsatisfied {} in application '{}'", broken.selector, app.provider.name());
			detach(&mut placement[member_idx[*mi]], FailureReason::RequiredExtensionsUnavailable, detail);
		}

		if let Some(broken) = &outcome.application {
			self.fail(
				ProviderRecord::Application(Arc::clone(&app.provider)),
				FailureReason::RequiredExtensionsUnavailable,
				format!("unsatisfied {}", broken.selector),
			);
			for (mi, &ci) in member_idx.iter().enumerate() {
				if outcome.is_member_removed(mi) {
					continue;
				}
				let reason = match members[mi].kind {
					ContentKind::Extension => FailureReason::RequiredExtensionsUnavailable,
					ContentKind::Resource => FailureReason::RequiredApplicationUnavailable,
				};
				detach(&mut placement[ci], reason, format!("application '{}' is unavailable", app.provider.name()));
			}
			return None;
		}

		let mut accepted = AcceptedApplication {
			application: Arc::clone(&app.provider),
			revision: app.revision,
			resources: Vec::new(),
			extensions: Vec::new(),
		};
		for (mi, &ci) in member_idx.iter().enumerate() {
			if outcome.is_member_removed(mi) {
				continue;
			}
			let attached = AttachedContent {
				provider: Arc::clone(&content[ci].provider),
				revision: content[ci].revision,
			};
			match members[mi].kind {
				ContentKind::Resource => accepted.resources.push(attached),
				ContentKind::Extension => accepted.extensions.push(attached),
			}
		}
		Some(accepted)
	}

	fn finish(self, change_count: u64, mut applications: Vec<AcceptedApplication>, default_id: Option<ProviderId>) -> Resolution {
		applications.sort_by(|a, b| a.base_path().cmp(b.base_path()));
		let default_application = default_id.filter(|id| applications.iter().any(|app| app.application.id() == *id));

		let mut resolution = Resolution {
			change_count,
			applications,
			default_application,
			..Resolution::default()
		};
		for failure in self.failures.into_values() {
			match failure.provider.kind() {
				ProviderKind::Application => resolution.failed_applications.push(failure),
				ProviderKind::Resource => resolution.failed_resources.push(failure),
				ProviderKind::Extension => resolution.failed_extensions.push(failure),
			}
		}
		for list in [
			&mut resolution.failed_applications,
			&mut resolution.failed_resources,
			&mut resolution.failed_extensions,
		] {
			list.sort_by(|a, b| a.provider.as_provider().total_order_cmp(b.provider.as_provider()));
		}

		tracing::debug!(
			change_count,
			accepted = resolution.applications.len(),
			failed_applications = resolution.failed_applications.len(),
			failed_resources = resolution.failed_resources.len(),
			failed_extensions = resolution.failed_extensions.len(),
			"registry.pass.completed"
		);
		resolution
	}
}

fn survivors<T>(items: Vec<T>, kind: ProviderKind, losers: &FxHashSet<(ProviderKind, usize)>) -> Vec<T> {
	items
		.into_iter()
		.enumerate()
		.filter(|(idx, _)| !losers.contains(&(kind, *idx)))
		.map(|(_, item)| item)
		.collect()
}

fn detach(place: &mut Placement, reason: FailureReason, detail: String) {
	place.attached = place.attached.saturating_sub(1);
	place.detached = true;
	place.last = Some((reason, detail));
}

fn core_at<'a>(
	apps: &'a [Stored<ApplicationProvider>],
	resources: &'a [Stored<ContentProvider>],
	extensions: &'a [Stored<ContentProvider>],
	(kind, idx): (ProviderKind, usize),
) -> &'a ProviderCore {
	match kind {
		ProviderKind::Application => apps[idx].provider.core(),
		ProviderKind::Resource => resources[idx].provider.core(),
		ProviderKind::Extension => extensions[idx].provider.core(),
	}
}
