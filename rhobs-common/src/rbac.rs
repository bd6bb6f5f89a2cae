//! Authorization types
//!
//! These mirror the access-control file consumed by the observatorium API
//! server. Field names and nesting are a wire contract with that server.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Logical tenant (customer or team) in the access-control model
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Cow<'static, str>);

impl TenantId {
    /// Tenant id usable in `const` position
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signal type a tenant may access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Metrics,
    Logs,
    Probes,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::Logs => "logs",
            Self::Probes => "probes",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub resources: Vec<String>,
    pub tenants: Vec<String>,
    pub permissions: Vec<Permission>,
}

/// Principal kind. Service accounts authenticate as users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    User,
    Group,
}

/// Principal matched against the `user` claim of an incoming token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub kind: SubjectKind,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SubjectKind::User,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SubjectKind::Group,
        }
    }
}

/// Binding of roles to subjects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub name: String,
    pub roles: Vec<String>,
    pub subjects: Vec<Subject>,
}

/// Complete access-control document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacDocument {
    pub roles: Vec<Role>,
    #[serde(rename = "roleBindings")]
    pub role_bindings: Vec<RoleBinding>,
}

impl RbacDocument {
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn binding(&self, name: &str) -> Option<&RoleBinding> {
        self.role_bindings.iter().find(|b| b.name == name)
    }

    /// Render as pretty JSON, the format read by the API server
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render as YAML for embedding in a ConfigMap
    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
