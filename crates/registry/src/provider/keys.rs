//! Registration property keys understood by the reconciler.

pub const SERVICE_ID: &str = "service.id";
pub const SERVICE_RANKING: &str = "service.ranking";
pub const SERVICE_SCOPE: &str = "service.scope";
pub const OBJECT_CLASS: &str = "objectClass";

pub const NAME: &str = "whiteboard.name";
pub const APPLICATION_BASE: &str = "whiteboard.application.base";
pub const APPLICATION_SELECT: &str = "whiteboard.application.select";
pub const EXTENSION_SELECT: &str = "whiteboard.extension.select";
pub const TARGET: &str = "whiteboard.target";
pub const RESOURCE: &str = "whiteboard.resource";
pub const EXTENSION: &str = "whiteboard.extension";

/// Name carried by the default application.
pub const DEFAULT_APPLICATION_NAME: &str = ".default";

/// Explicit names may not start with this prefix; generated names always do.
pub const RESERVED_NAME_PREFIX: &str = ".";
