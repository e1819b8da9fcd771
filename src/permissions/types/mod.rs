pub mod id;
pub mod policy;

pub use id::PermId;
pub use policy::{
    PermissionData, PERMS_ALL, PERMS_DELETE, PERMS_EDIT, PERMS_READ, PERMS_SHOW,
};
