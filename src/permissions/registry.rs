//! Application permission registry.
//!
//! Applications declare the type (and optional parameters) of the
//! permissions they own. The store consults the registry when building a new
//! permission, and falls back to the default type whenever it cannot.

use crate::constants::{DEFAULT_PERMISSION_TYPE, PATH_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Permission declarations of one application, keyed by full permission name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPermissions {
    #[serde(default, rename = "type")]
    pub types: HashMap<String, String>,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

impl ApplicationPermissions {
    pub fn with_type<N: Into<String>, T: Into<String>>(mut self, name: N, kind: T) -> Self {
        self.types.insert(name.into(), kind.into());
        self
    }

    pub fn with_params<N: Into<String>>(mut self, name: N, params: serde_json::Value) -> Self {
        self.params.insert(name.into(), params);
        self
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown application: {0}")]
    UnknownApplication(String),

    #[error("Registry error: {0}")]
    Backend(String),
}

/// Port to the registry of application-declared permissions.
pub trait ApplicationRegistry: Send + Sync {
    fn application_permissions(&self, app: &str) -> Result<ApplicationPermissions, RegistryError>;
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    apps: RwLock<HashMap<String, ApplicationPermissions>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: Into<String>>(&self, app: S, permissions: ApplicationPermissions) {
        let mut apps = self
            .apps
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apps.insert(app.into(), permissions);
    }
}

impl ApplicationRegistry for StaticRegistry {
    fn application_permissions(&self, app: &str) -> Result<ApplicationPermissions, RegistryError> {
        let apps = self
            .apps
            .read()
            .map_err(|_| RegistryError::Backend("registry lock poisoned".to_string()))?;
        apps.get(app)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownApplication(app.to_string()))
    }
}

/// Why a new permission got the default type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultReason {
    /// The name has no application segment.
    TopLevel,
    NoRegistry,
    /// The application declares nothing for this name.
    NotDeclared,
    /// The registry lookup failed; the error is swallowed.
    RegistryFailed(String),
}

/// Outcome of resolving a new permission's type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeResolution {
    Resolved {
        kind: String,
        params: Option<serde_json::Value>,
    },
    Defaulted(DefaultReason),
}

impl TypeResolution {
    pub fn kind(&self) -> &str {
        match self {
            TypeResolution::Resolved { kind, .. } => kind,
            TypeResolution::Defaulted(_) => DEFAULT_PERMISSION_TYPE,
        }
    }

    pub fn params(&self) -> Option<&serde_json::Value> {
        match self {
            TypeResolution::Resolved { params, .. } => params.as_ref(),
            TypeResolution::Defaulted(_) => None,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, TypeResolution::Defaulted(_))
    }
}

/// Looks up `name` in the declarations of the application owning it (the
/// segment before the first `:`).
pub fn resolve_type(registry: Option<&dyn ApplicationRegistry>, name: &str) -> TypeResolution {
    let app = match name.find(PATH_SEPARATOR) {
        Some(pos) if pos > 0 => &name[..pos],
        _ => return TypeResolution::Defaulted(DefaultReason::TopLevel),
    };
    let registry = match registry {
        Some(registry) => registry,
        None => return TypeResolution::Defaulted(DefaultReason::NoRegistry),
    };

    match registry.application_permissions(app) {
        Ok(info) => {
            let kind = info.types.get(name).cloned();
            let params = info.params.get(name).cloned();
            if kind.is_none() && params.is_none() {
                return TypeResolution::Defaulted(DefaultReason::NotDeclared);
            }
            TypeResolution::Resolved {
                kind: kind.unwrap_or_else(|| DEFAULT_PERMISSION_TYPE.to_string()),
                params,
            }
        }
        Err(e) => {
            log::debug!("Permission type lookup for '{}' failed: {}", name, e);
            TypeResolution::Defaulted(DefaultReason::RegistryFailed(e.to_string()))
        }
    }
}
