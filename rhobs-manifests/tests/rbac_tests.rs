//! RBAC Generation Tests
//! Role deduplication, binding uniqueness and subject naming

use rhobs_common::rbac::{Permission, RbacDocument, Resource, Role, RoleBinding, Subject, TenantId};
use rhobs_common::Error;
use rhobs_manifests::rbac::catalog::{environment_grants, environment_rbac, ADMIN_BINDING};
use rhobs_manifests::rbac::{generate_rbac, Environment, Grant, RbacGenerator};
use std::collections::HashSet;

const ACME: TenantId = TenantId::from_static("acme");

fn reader(name: &str) -> Grant {
    Grant::new(name, ACME)
        .resources([Resource::Metrics])
        .permissions([Permission::Read])
        .environments([Environment::Staging, Environment::Production])
}

// ============== Role Deduplication ==============

#[test]
fn test_roles_deduplicated_across_grants() {
    let grants: Vec<Grant> = (0..10).map(|i| reader(&format!("svc-{i}"))).collect();
    let doc = generate_rbac(&grants).unwrap();

    assert_eq!(doc.roles.len(), 1);
    assert_eq!(doc.roles[0].name, "acme-metrics-read");
    assert_eq!(doc.role_bindings.len(), 10);
    assert!(doc
        .role_bindings
        .iter()
        .all(|b| b.roles == vec!["acme-metrics-read"]));
}

#[test]
fn test_role_names_unique_in_catalog() {
    let doc = environment_rbac().unwrap();
    let names: HashSet<_> = doc.roles.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names.len(), doc.roles.len());

    // every referenced role exists
    for binding in &doc.role_bindings {
        for role in &binding.roles {
            assert!(doc.role(role).is_some(), "{} references unknown role {role}", binding.name);
        }
    }
}

// ============== Binding Uniqueness ==============

#[test]
fn test_duplicate_binding_rejected_without_partial_mutation() {
    let mut generator = RbacGenerator::new();
    generator.attach_binding(&reader("svc")).unwrap();
    let before = generator.document().clone();

    let conflicting = Grant::new("svc", TenantId::new("other"))
        .resources([Resource::Logs])
        .permissions([Permission::Write])
        .environments([Environment::Production]);
    let err = generator.attach_binding(&conflicting).unwrap_err();

    assert!(matches!(err, Error::DuplicateBinding(ref name) if name == "svc"));
    assert_eq!(generator.document(), &before);
}

#[test]
fn test_catalog_binding_names_unique() {
    let doc = environment_rbac().unwrap();
    let names: HashSet<_> = doc.role_bindings.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names.len(), doc.role_bindings.len());
}

// ============== Subject Naming ==============

#[test]
fn test_production_subject_is_unsuffixed() {
    let doc = generate_rbac(&[Grant::new("x", ACME)
        .resources([Resource::Metrics])
        .permissions([Permission::Read])
        .environments([Environment::Staging, Environment::Production])])
    .unwrap();
    assert_eq!(
        doc.role_bindings[0].subjects,
        vec![
            Subject::user("service-account-x-staging"),
            Subject::user("service-account-x")
        ]
    );
}

#[test]
fn test_concrete_name_drops_suffix() {
    let doc = generate_rbac(&[Grant::new("x", ACME)
        .resources([Resource::Metrics])
        .permissions([Permission::Read])
        .environments([Environment::Staging])
        .concrete_name()])
    .unwrap();
    assert_eq!(
        doc.role_bindings[0].subjects,
        vec![Subject::user("service-account-x")]
    );
}

#[test]
fn test_testing_environment_suffix() {
    let doc = generate_rbac(&[Grant::new("x", ACME)
        .resources([Resource::Probes])
        .permissions([Permission::Write])
        .environments([Environment::Testing])])
    .unwrap();
    assert_eq!(
        doc.role_bindings[0].subjects,
        vec![Subject::user("service-account-x-testing")]
    );
}

// ============== Convention Check ==============

#[test]
fn test_convention_violation_fails_fast() {
    let grant = Grant::new("foo-staging", ACME)
        .resources([Resource::Metrics])
        .permissions([Permission::Read])
        .environments([Environment::Staging]);

    let mut generator = RbacGenerator::new();
    let err = generator.attach_binding(&grant).unwrap_err();
    match err {
        Error::NamingConvention { name, suggestion } => {
            assert_eq!(name, "foo-staging");
            assert_eq!(suggestion, "foo");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(generator.document(), &RbacDocument::default());

    let doc = generate_rbac(&[grant.skip_convention_check()]).unwrap();
    assert_eq!(doc.role_bindings[0].name, "foo-staging");
}

// ============== End to End ==============

#[test]
fn test_single_grant_document() {
    let doc = generate_rbac(&[Grant::new("svc-read", ACME)
        .resources([Resource::Metrics])
        .permissions([Permission::Read])
        .environments([Environment::Staging, Environment::Production])])
    .unwrap();

    let expected = RbacDocument {
        roles: vec![Role {
            name: "acme-metrics-read".to_string(),
            resources: vec!["metrics".to_string()],
            tenants: vec!["acme".to_string()],
            permissions: vec![Permission::Read],
        }],
        role_bindings: vec![RoleBinding {
            name: "svc-read".to_string(),
            roles: vec!["acme-metrics-read".to_string()],
            subjects: vec![
                Subject::user("service-account-svc-read-staging"),
                Subject::user("service-account-svc-read"),
            ],
        }],
    };
    assert_eq!(doc, expected);

    let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
    assert_eq!(json["roleBindings"][0]["subjects"][1]["name"], "service-account-svc-read");
    assert_eq!(json["roles"][0]["permissions"][0], "read");
}

#[test]
fn test_environment_document_has_admin_binding() {
    let doc = environment_rbac().unwrap();
    let admin = doc.binding(ADMIN_BINDING).unwrap();
    assert!(!admin.roles.is_empty());
    assert_eq!(doc.role_bindings.len(), environment_grants().len() + 1);
}
