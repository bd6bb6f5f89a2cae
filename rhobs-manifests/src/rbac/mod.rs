//! Role-Based Access Control document generation
//!
//! Grants are folded into a deduplicated set of roles, one per
//! (tenant, resource, permission) triple, and one binding per grant.

pub mod catalog;

use rhobs_common::rbac::{Permission, RbacDocument, Resource, Role, RoleBinding, Subject, TenantId};
use rhobs_common::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Deployment environment a service account exists in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Testing,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Self::Staging, Self::Production, Self::Testing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Testing => "testing",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to bind a service account to a tenant's resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub name: String,
    pub tenant: TenantId,
    pub resources: Vec<Resource>,
    pub permissions: Vec<Permission>,
    pub environments: Vec<Environment>,
    pub skip_convention_check: bool,
    pub concrete_name: bool,
}

impl Grant {
    /// The binding name doubles as the service account name, so renaming a
    /// grant breaks the tenant's authentication.
    pub fn new(name: impl Into<String>, tenant: TenantId) -> Self {
        Self {
            name: name.into(),
            tenant,
            resources: Vec::new(),
            permissions: Vec::new(),
            environments: Vec::new(),
            skip_convention_check: false,
            concrete_name: false,
        }
    }

    pub fn resources(mut self, resources: impl IntoIterator<Item = Resource>) -> Self {
        self.resources = resources.into_iter().collect();
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    pub fn environments(mut self, environments: impl IntoIterator<Item = Environment>) -> Self {
        self.environments = environments.into_iter().collect();
        self
    }

    /// Allow a name that ends in an environment suffix
    pub fn skip_convention_check(mut self) -> Self {
        self.skip_convention_check = true;
        self
    }

    /// Use `service-account-<name>` in every environment
    pub fn concrete_name(mut self) -> Self {
        self.concrete_name = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RoleKey {
    tenant: TenantId,
    resource: Resource,
    permission: Permission,
}

/// Check that `name` carries no environment suffix.
///
/// Returns the suggested name when it does.
pub fn name_follows_convention(name: &str) -> std::result::Result<(), String> {
    for env in Environment::ALL {
        if let Some(stripped) = name.strip_suffix(env.as_str()) {
            return Err(stripped.trim_end_matches('-').to_string());
        }
    }
    Ok(())
}

/// Generation context for one RBAC document
#[derive(Debug, Default)]
pub struct RbacGenerator {
    role_names: HashMap<RoleKey, String>,
    document: RbacDocument,
}

impl RbacGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the role for the triple, creating it on first use
    pub fn get_or_create_role_name(
        &mut self,
        tenant: &TenantId,
        resource: Resource,
        permission: Permission,
    ) -> String {
        let key = RoleKey {
            tenant: tenant.clone(),
            resource,
            permission,
        };

        if let Some(name) = self.role_names.get(&key) {
            return name.clone();
        }

        let name = format!("{tenant}-{resource}-{permission}");
        self.document.roles.push(Role {
            name: name.clone(),
            resources: vec![resource.to_string()],
            tenants: vec![tenant.to_string()],
            permissions: vec![permission],
        });
        self.role_names.insert(key, name.clone());
        name
    }

    fn ensure_unique_binding(&self, name: &str) -> Result<()> {
        if self.document.binding(name).is_some() {
            return Err(Error::DuplicateBinding(name.to_string()));
        }
        Ok(())
    }

    /// Add the binding for `grant`.
    ///
    /// The grant is validated before any role is created, so a rejected grant
    /// leaves the document unchanged.
    pub fn attach_binding(&mut self, grant: &Grant) -> Result<()> {
        self.ensure_unique_binding(&grant.name)?;

        if !grant.skip_convention_check && !grant.environments.is_empty() {
            if let Err(suggestion) = name_follows_convention(&grant.name) {
                return Err(Error::NamingConvention {
                    name: grant.name.clone(),
                    suggestion,
                });
            }
        }

        if grant.resources.is_empty() || grant.permissions.is_empty() {
            tracing::warn!(binding = %grant.name, "Binding grants no roles");
        }

        let mut roles = Vec::with_capacity(grant.resources.len() * grant.permissions.len());
        for resource in &grant.resources {
            for permission in &grant.permissions {
                roles.push(self.get_or_create_role_name(&grant.tenant, *resource, *permission));
            }
        }

        let subjects = grant
            .environments
            .iter()
            .map(|env| {
                if *env == Environment::Production || grant.concrete_name {
                    Subject::user(format!("service-account-{}", grant.name))
                } else {
                    Subject::user(format!("service-account-{}-{}", grant.name, env))
                }
            })
            .collect();

        self.document.role_bindings.push(RoleBinding {
            name: grant.name.clone(),
            roles,
            subjects,
        });
        Ok(())
    }

    /// Add a hand-written binding of existing or new roles to a group
    pub fn attach_group_binding(
        &mut self,
        name: &str,
        roles: &[(TenantId, Resource, Permission)],
        group: &str,
    ) -> Result<()> {
        self.ensure_unique_binding(name)?;

        let roles = roles
            .iter()
            .map(|(tenant, resource, permission)| {
                self.get_or_create_role_name(tenant, *resource, *permission)
            })
            .collect();

        self.document.role_bindings.push(RoleBinding {
            name: name.to_string(),
            roles,
            subjects: vec![Subject::group(group)],
        });
        Ok(())
    }

    pub fn document(&self) -> &RbacDocument {
        &self.document
    }

    pub fn finish(self) -> RbacDocument {
        self.document
    }
}

/// Fold `grants` into an RBAC document, in input order
pub fn generate_rbac(grants: &[Grant]) -> Result<RbacDocument> {
    let mut generator = RbacGenerator::new();
    for grant in grants {
        generator.attach_binding(grant)?;
    }
    Ok(generator.finish())
}

/// RBAC document for a single cluster's gateway.
///
/// Cluster service accounts are named concretely, so every grant is treated
/// as production-only with the convention check disabled.
pub fn generate_cluster_rbac(grants: Vec<Grant>) -> Result<RbacDocument> {
    let grants: Vec<Grant> = grants
        .into_iter()
        .map(|mut grant| {
            grant.skip_convention_check = true;
            grant.environments = vec![Environment::Production];
            grant
        })
        .collect();
    generate_rbac(&grants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhobs_common::rbac::SubjectKind;

    const ACME: TenantId = TenantId::from_static("acme");

    #[test]
    fn test_role_name_format() {
        let mut generator = RbacGenerator::new();
        let name = generator.get_or_create_role_name(&ACME, Resource::Logs, Permission::Write);
        assert_eq!(name, "acme-logs-write");
        let role = generator.document().role(&name).unwrap();
        assert_eq!(role.resources, vec!["logs"]);
        assert_eq!(role.tenants, vec!["acme"]);
        assert_eq!(role.permissions, vec![Permission::Write]);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut generator = RbacGenerator::new();
        let first = generator.get_or_create_role_name(&ACME, Resource::Metrics, Permission::Read);
        let second = generator.get_or_create_role_name(&ACME, Resource::Metrics, Permission::Read);
        assert_eq!(first, second);
        assert_eq!(generator.finish().roles.len(), 1);
    }

    #[test]
    fn test_cross_product_of_resources_and_permissions() {
        let grant = Grant::new("svc", ACME)
            .resources([Resource::Metrics, Resource::Logs])
            .permissions([Permission::Read, Permission::Write])
            .environments([Environment::Production]);
        let doc = generate_rbac(&[grant]).unwrap();
        assert_eq!(doc.roles.len(), 4);
        assert_eq!(
            doc.role_bindings[0].roles,
            vec![
                "acme-metrics-read",
                "acme-metrics-write",
                "acme-logs-read",
                "acme-logs-write"
            ]
        );
    }

    #[test]
    fn test_convention_suggestion() {
        assert_eq!(name_follows_convention("foo-staging"), Err("foo".to_string()));
        assert_eq!(name_follows_convention("footesting"), Err("foo".to_string()));
        assert_eq!(name_follows_convention("foo-production"), Err("foo".to_string()));
        assert!(name_follows_convention("observatorium-rhobs").is_ok());
    }

    #[test]
    fn test_convention_not_checked_without_environments() {
        let grant = Grant::new("foo-staging", ACME)
            .resources([Resource::Metrics])
            .permissions([Permission::Read]);
        let doc = generate_rbac(&[grant]).unwrap();
        assert!(doc.role_bindings[0].subjects.is_empty());
    }

    #[test]
    fn test_empty_permissions_yield_binding_without_roles() {
        let grant = Grant::new("placeholder", ACME)
            .resources([Resource::Metrics])
            .environments([Environment::Staging]);
        let doc = generate_rbac(&[grant]).unwrap();
        assert!(doc.roles.is_empty());
        assert!(doc.role_bindings[0].roles.is_empty());
        assert_eq!(
            doc.role_bindings[0].subjects,
            vec![Subject::user("service-account-placeholder-staging")]
        );
    }

    #[test]
    fn test_group_binding_reuses_roles() {
        let mut generator = RbacGenerator::new();
        generator
            .attach_binding(
                &Grant::new("reader", ACME)
                    .resources([Resource::Metrics])
                    .permissions([Permission::Read])
                    .environments([Environment::Production]),
            )
            .unwrap();
        generator
            .attach_group_binding(
                "admins",
                &[(ACME, Resource::Metrics, Permission::Read)],
                "team@example.com",
            )
            .unwrap();

        let doc = generator.finish();
        assert_eq!(doc.roles.len(), 1);
        let admins = doc.binding("admins").unwrap();
        assert_eq!(admins.roles, vec!["acme-metrics-read"]);
        assert_eq!(admins.subjects[0].kind, SubjectKind::Group);
    }

    #[test]
    fn test_group_binding_rejects_duplicate_name() {
        let mut generator = RbacGenerator::new();
        generator.attach_group_binding("admins", &[], "a").unwrap();
        let err = generator.attach_group_binding("admins", &[], "b").unwrap_err();
        assert!(matches!(err, Error::DuplicateBinding(name) if name == "admins"));
    }

    #[test]
    fn test_cluster_rbac_forces_production_subjects() {
        let doc = generate_cluster_rbac(vec![Grant::new("svc-staging", ACME)
            .resources([Resource::Metrics])
            .permissions([Permission::Write])
            .environments([Environment::Staging, Environment::Testing])])
        .unwrap();
        assert_eq!(
            doc.role_bindings[0].subjects,
            vec![Subject::user("service-account-svc-staging")]
        );
    }
}
