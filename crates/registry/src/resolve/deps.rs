//! Per-application dependency fixpoint.
//!
//! # Role
//!
//! Given one application and the content tentatively attached to it, decides
//! which members survive their dependency selectors. The graph is built once
//! per application per pass and discarded afterwards.
//!
//! # Mental Model
//!
//! Node 0 is the application, nodes `1..` are the attached members. Every
//! dependency selector of a node becomes a requirement holding the extension
//! nodes that satisfy it; a requirement satisfied by the application's or the
//! runtime's properties is ambient and can never break. Removing a node may
//! break requirements of its dependents, which are then re-checked against the
//! nodes still alive. The loop ends when no alive node has a broken
//! requirement, which yields the largest self-consistent set.
//!
//! # Invariants
//!
//! - Resources never satisfy a requirement, so removing one cascades nowhere.
//! - A node never satisfies its own requirement.
//! - The result does not depend on member order.

use switchyard_selector::{Properties, Selector};

use super::matcher;
use crate::provider::ContentKind;

const APPLICATION: usize = 0;

/// One attached content provider as seen by the graph.
#[derive(Debug, Clone, Copy)]
pub struct Member<'a> {
	pub kind: ContentKind,
	pub properties: &'a Properties,
	pub selectors: &'a [Selector],
}

#[derive(Debug)]
struct Requirement {
	selector: usize,
	ambient: bool,
	providers: Vec<usize>,
}

/// A node removed by the fixpoint and the selector it could not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broken {
	pub selector: Selector,
}

/// Outcome for one application.
#[derive(Debug, Default)]
pub struct DependencyOutcome {
	/// Set when the application itself lost a requirement.
	pub application: Option<Broken>,
	/// Members removed by their own requirements, as `(member index, cause)`,
	/// in removal order.
	pub removed: Vec<(usize, Broken)>,
}

impl DependencyOutcome {
	pub fn is_member_removed(&self, member: usize) -> bool {
		self.removed.iter().any(|(idx, _)| *idx == member)
	}
}

pub struct DependencyGraph<'a> {
	app_selectors: &'a [Selector],
	members: &'a [Member<'a>],
	requirements: Vec<Vec<Requirement>>,
	dependents: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
	/// Resolves one application, skipping the graph when nothing is broken
	/// to begin with.
	pub fn check(app_properties: &Properties, app_selectors: &'a [Selector], members: &'a [Member<'a>], runtime: &Properties) -> DependencyOutcome {
		let extensions = |skip: Option<usize>| {
			members
				.iter()
				.enumerate()
				.filter(move |(idx, member)| Some(*idx) != skip && member.kind == ContentKind::Extension)
				.map(|(_, member)| member.properties)
		};
		let intact = matcher::dependencies_satisfied(app_selectors, extensions(None), app_properties, runtime)
			&& members
				.iter()
				.enumerate()
				.all(|(idx, member)| matcher::dependencies_satisfied(member.selectors, extensions(Some(idx)), app_properties, runtime));
		if intact {
			return DependencyOutcome::default();
		}
		Self::build(app_properties, app_selectors, members, runtime).resolve()
	}

	pub fn build(app_properties: &Properties, app_selectors: &'a [Selector], members: &'a [Member<'a>], runtime: &Properties) -> Self {
		let node_count = members.len() + 1;
		let mut requirements = Vec::with_capacity(node_count);
		let mut dependents = vec![Vec::new(); node_count];

		for node in 0..node_count {
			let selectors = if node == APPLICATION { app_selectors } else { members[node - 1].selectors };
			let mut reqs = Vec::with_capacity(selectors.len());
			for (selector_idx, selector) in selectors.iter().enumerate() {
				let ambient = matcher::satisfied_by_context(selector, app_properties, runtime);
				let providers = if ambient {
					Vec::new()
				} else {
					let extensions = members
						.iter()
						.enumerate()
						.map(|(idx, member)| (idx + 1, member))
						.filter(|(other, member)| *other != node && member.kind == ContentKind::Extension)
						.map(|(other, member)| (other, member.properties));
					matcher::satisfying_siblings(selector, extensions)
				};
				for &provider in &providers {
					dependents[provider].push(node);
				}
				reqs.push(Requirement {
					selector: selector_idx,
					ambient,
					providers,
				});
			}
			requirements.push(reqs);
		}

		Self {
			app_selectors,
			members,
			requirements,
			dependents,
		}
	}

	/// Runs removal to a fixpoint.
	pub fn resolve(&self) -> DependencyOutcome {
		let mut alive = vec![true; self.requirements.len()];
		let mut outcome = DependencyOutcome::default();
		let mut worklist: Vec<usize> = (0..self.requirements.len()).rev().collect();

		while let Some(node) = worklist.pop() {
			if !alive[node] {
				continue;
			}
			let Some(broken) = self.first_broken(node, &alive) else {
				continue;
			};
			alive[node] = false;
			let cause = Broken {
				selector: self.selector(node, broken).clone(),
			};
			if node == APPLICATION {
				outcome.application = Some(cause);
			} else {
				outcome.removed.push((node - 1, cause));
			}
			worklist.extend(self.dependents[node].iter().rev().copied().filter(|dependent| alive[*dependent]));
		}

		outcome
	}

	fn first_broken(&self, node: usize, alive: &[bool]) -> Option<usize> {
		self.requirements[node]
			.iter()
			.find(|req| !req.ambient && !req.providers.iter().any(|provider| alive[*provider]))
			.map(|req| req.selector)
	}

	fn selector(&self, node: usize, idx: usize) -> &Selector {
		if node == APPLICATION {
			&self.app_selectors[idx]
		} else {
			&self.members[node - 1].selectors[idx]
		}
	}
}
