/// Common constants used across the permission store.
///
/// These defaults are used for configuration when explicit values
/// are not provided.
pub const ROOT_NAME: &str = "ROOT";

/// Separator between the segments of a permission name and of a parent chain.
pub const PATH_SEPARATOR: char = ':';

/// Type assigned to new permissions when no application declares one.
pub const DEFAULT_PERMISSION_TYPE: &str = "matrix";

pub const DEFAULT_TABLE: &str = "perms";
pub const DEFAULT_CACHE_PREFIX: &str = "perm_sql";

/// Bump when the serialized form of a cached record changes.
pub const DEFAULT_CACHE_VERSION: u32 = 2;

/// One day.
pub const DEFAULT_CACHE_LIFETIME_SECS: u64 = 86_400;
pub const DEFAULT_MAX_ADD_ATTEMPTS: u32 = 3;
pub const DEFAULT_MEMORY_CACHE_CAPACITY: usize = 1_000;
