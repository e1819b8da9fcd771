// Table storage for permission rows
pub mod core;
mod table;

pub use self::core::SledPermissionTable;
pub use table::{PermissionRow, PermissionTable};
