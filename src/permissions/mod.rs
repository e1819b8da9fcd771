// permissions module

pub mod path_codec;
pub mod record;
pub mod registry;
pub mod store;
pub mod types;

pub use path_codec::{AncestorTree, ParentChain};
pub use record::{PermissionRecord, WriteHandle};
pub use registry::{
    ApplicationPermissions, ApplicationRegistry, DefaultReason, RegistryError, StaticRegistry,
    TypeResolution,
};
pub use store::{PermissionStore, StoreConnections};
pub use types::{PermId, PermissionData};
