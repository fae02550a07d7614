use switchyard_selector::Properties;

use super::*;

fn app(props: Properties) -> ApplicationProvider {
	ApplicationProvider::new(props)
}

#[test]
fn registered_ids_sort_before_generated() {
	let registered = ProviderId::from_properties(&Properties::new().with(keys::SERVICE_ID, 7));
	let generated = ProviderId::from_properties(&Properties::new());
	assert_eq!(registered, ProviderId::Registered(7));
	assert!(matches!(generated, ProviderId::Generated(_)));
	assert!(registered < generated);
	assert_eq!(registered.cmp_stable(&generated), Ordering::Less);
	assert_eq!(generated.cmp_stable(&ProviderId::generate()), Ordering::Equal);
}

#[test]
fn generated_ids_never_collide() {
	let a = ProviderId::generate();
	let b = ProviderId::generate();
	assert_ne!(a, b);
}

#[test]
fn base_path_normalization() {
	for (raw, expected) in [
		("", "/"),
		("/", "/"),
		("/*", "/"),
		("*", "/"),
		(" orders ", "/orders"),
		("/orders/", "/orders"),
		("/orders/*", "/orders"),
		("/api/v1//", "/api/v1"),
	] {
		assert_eq!(normalize_base_path(raw), expected, "normalizing {raw:?}");
	}
}

#[test]
fn application_defaults_and_flags() {
	let orders = app(Properties::new().with(keys::APPLICATION_BASE, "orders"));
	assert_eq!(orders.base_path(), "/orders");
	assert_eq!(orders.priority(), 0);
	assert!(orders.has_generated_name());
	assert!(orders.name().starts_with(".generated.application."));
	assert!(orders.status().is_ok());
	assert!(!orders.is_default());
	assert!(!orders.is_shadowing_default());

	let root = app(Properties::new().with(keys::APPLICATION_BASE, "/").with(keys::NAME, "root"));
	assert!(root.is_shadowing_default());

	let default = app(Properties::new().with(keys::APPLICATION_BASE, "/").with(keys::NAME, keys::DEFAULT_APPLICATION_NAME));
	assert!(default.is_default());
	assert!(!default.is_shadowing_default());
	assert!(default.status().is_ok());
}

#[test]
fn application_without_base_fails_validation() {
	let broken = app(Properties::new().with(keys::NAME, "orphan"));
	assert_eq!(broken.status().failure(), Some(FailureReason::ValidationFailed));
}

#[test]
fn ranking_is_clamped_and_lenient() {
	let high = app(Properties::new().with(keys::APPLICATION_BASE, "/a").with(keys::SERVICE_RANKING, i64::MAX));
	assert_eq!(high.priority(), i32::MAX);
	let text = app(Properties::new().with(keys::APPLICATION_BASE, "/a").with(keys::SERVICE_RANKING, "12"));
	assert_eq!(text.priority(), 12);
	let junk = app(Properties::new().with(keys::APPLICATION_BASE, "/a").with(keys::SERVICE_RANKING, "high"));
	assert_eq!(junk.priority(), 0);
}

#[test]
fn reserved_prefix_is_rejected_for_content() {
	let props = Properties::new()
		.with(keys::RESOURCE, true)
		.with(keys::NAME, keys::DEFAULT_APPLICATION_NAME);
	let resource = ContentProvider::resource(props, None);
	assert_eq!(resource.status().failure(), Some(FailureReason::ValidationFailed));

	let dotted = app(Properties::new().with(keys::APPLICATION_BASE, "/x").with(keys::NAME, ".hidden"));
	assert_eq!(dotted.status().failure(), Some(FailureReason::ValidationFailed));
}

#[test]
fn malformed_selectors_fail_validation() {
	let props = Properties::new()
		.with(keys::RESOURCE, true)
		.with(keys::APPLICATION_SELECT, "(whiteboard.name=orders");
	let resource = ContentProvider::resource(props, None);
	let Status::Failed { reason, detail } = resource.status() else {
		panic!("expected failure");
	};
	assert_eq!(*reason, FailureReason::ValidationFailed);
	assert!(detail.contains(keys::APPLICATION_SELECT));

	let props = Properties::new()
		.with(keys::EXTENSION, true)
		.with(keys::OBJECT_CLASS, vec!["ContainerRequestFilter"])
		.with(keys::EXTENSION_SELECT, vec!["(a=1)", "(b="]);
	let extension = ContentProvider::extension(props, None);
	assert_eq!(extension.status().failure(), Some(FailureReason::ValidationFailed));
}

#[test]
fn marker_select_is_recognised_structurally() {
	let marker = ContentProvider::resource(
		Properties::new()
			.with(keys::RESOURCE, true)
			.with(keys::APPLICATION_SELECT, " ( whiteboard.name=.default) "),
		None,
	);
	assert!(marker.targets_default());
	assert!(marker.accepts_default_fallback());

	// Item values keep their whitespace, so a padded name is a different name.
	let padded = ContentProvider::resource(
		Properties::new()
			.with(keys::RESOURCE, true)
			.with(keys::APPLICATION_SELECT, "(whiteboard.name=.default )"),
		None,
	);
	assert!(!padded.targets_default());
	assert!(!padded.accepts_default_fallback());

	let other = ContentProvider::resource(
		Properties::new()
			.with(keys::RESOURCE, true)
			.with(keys::APPLICATION_SELECT, "(whiteboard.name=orders)"),
		None,
	);
	assert!(!other.targets_default());
	assert!(!other.accepts_default_fallback());
}

#[test]
fn scope_parsing() {
	let props = |scope: &str| Properties::new().with(keys::RESOURCE, true).with(keys::SERVICE_SCOPE, scope);
	assert!(ContentProvider::resource(Properties::new().with(keys::RESOURCE, true), None).is_singleton());
	assert_eq!(ContentProvider::resource(props("prototype"), None).scope(), Scope::Prototype);
	assert_eq!(ContentProvider::resource(props("Bundle"), None).scope(), Scope::Bundle);
	let bad = ContentProvider::resource(props("request"), None);
	assert_eq!(bad.status().failure(), Some(FailureReason::ValidationFailed));
}

#[test]
fn classification_releases_the_lease_and_caches() {
	let source = StaticObject::new(ObjectClass::new("com.acme.AuditFilter", &["javax.ws.rs.container.ContainerRequestFilter"]));
	let props = Properties::new()
		.with(keys::EXTENSION, true)
		.with(keys::OBJECT_CLASS, vec!["javax.ws.rs.container.ContainerRequestFilter"]);
	let extension = ContentProvider::extension(props, Some(source.clone()));

	assert!(extension.status().is_ok());
	assert_eq!(extension.contract_types(), vec![ContractType::ContainerRequestFilter]);
	assert_eq!(source.outstanding(), 0);
	assert_eq!(source.acquisitions(), 1);

	let _ = extension.status();
	let _ = extension.object_class();
	assert_eq!(source.acquisitions(), 1);
}

#[test]
fn unobtainable_object_fails_not_gettable() {
	let props = Properties::new().with(keys::RESOURCE, true);
	let resource = ContentProvider::resource(props, Some(StaticObject::unobtainable()));
	assert_eq!(resource.status().failure(), Some(FailureReason::ServiceNotGettable));
}

#[test]
fn extension_without_contract_is_rejected() {
	let props = Properties::new()
		.with(keys::EXTENSION, true)
		.with(keys::OBJECT_CLASS, vec!["com.acme.Helper"]);
	let extension = ContentProvider::extension(props, None);
	assert_eq!(extension.status().failure(), Some(FailureReason::NotAnExtensionType));

	let source = StaticObject::new(ObjectClass::new("com.acme.Helper", &[]));
	let props = Properties::new()
		.with(keys::EXTENSION, true)
		.with(keys::OBJECT_CLASS, vec!["ExceptionMapper"]);
	let lying = ContentProvider::extension(props, Some(source));
	assert_eq!(lying.status().failure(), Some(FailureReason::NotAnExtensionType));
}

#[test]
fn validation_failure_takes_precedence_over_classification() {
	let source = StaticObject::unobtainable();
	let props = Properties::new().with(keys::RESOURCE, true).with(keys::NAME, ".bad");
	let resource = ContentProvider::resource(props, Some(source.clone()));
	assert_eq!(resource.status().failure(), Some(FailureReason::ValidationFailed));
	assert_eq!(source.acquisitions(), 0);
}

#[test]
fn registration_yields_one_provider_per_declared_kind() {
	let props = Properties::new()
		.with(keys::SERVICE_ID, 40)
		.with(keys::RESOURCE, true)
		.with(keys::EXTENSION, "true")
		.with(keys::OBJECT_CLASS, vec!["Feature"]);
	let records = Registration::new(props).into_records();
	let kinds: Vec<_> = records.iter().map(ProviderRecord::kind).collect();
	assert_eq!(kinds, vec![ProviderKind::Resource, ProviderKind::Extension]);
	assert!(records.iter().all(|record| record.id() == ProviderId::Registered(40)));

	let generated = Registration::new(Properties::new().with(keys::RESOURCE, true).with(keys::EXTENSION, true)).into_records();
	assert_eq!(generated[0].id(), generated[1].id());

	let pinned = Registration::new(Properties::new().with(keys::APPLICATION_BASE, "/a"))
		.with_id(ProviderId::Generated(99))
		.into_records();
	assert_eq!(pinned[0].id(), ProviderId::Generated(99));
	assert!(Registration::new(Properties::new()).into_records().is_empty());
}

#[test]
fn reason_codes_are_stable() {
	let codes: Vec<_> = [
		FailureReason::ServiceNotGettable,
		FailureReason::Shadowed,
		FailureReason::ValidationFailed,
		FailureReason::RequiredExtensionsUnavailable,
		FailureReason::DuplicateName,
		FailureReason::RequiredApplicationUnavailable,
		FailureReason::NotAnExtensionType,
	]
	.into_iter()
	.map(FailureReason::code)
	.collect();
	assert_eq!(codes, vec![1, 2, 3, 4, 5, 6, 7]);
	assert_eq!(FailureReason::DuplicateName.to_string(), "duplicate-name");
}
