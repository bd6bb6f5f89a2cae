//! Environment-wide service account grants

use super::{Environment, Grant, RbacGenerator};
use rhobs_common::rbac::{RbacDocument, Resource, TenantId};
use rhobs_common::Result;

pub const CNVQE: TenantId = TenantId::from_static("cnvqe");
pub const TELEMETER: TenantId = TenantId::from_static("telemeter");
pub const RHOBS: TenantId = TenantId::from_static("rhobs");
pub const PSIOCP: TenantId = TenantId::from_static("psiocp");
pub const RHODS: TenantId = TenantId::from_static("rhods");
pub const RHACS: TenantId = TenantId::from_static("rhacs");
pub const ODFMS: TenantId = TenantId::from_static("odfms");
pub const REFERENCE_ADDON: TenantId = TenantId::from_static("reference-addon");
pub const RHTAP: TenantId = TenantId::from_static("rhtap");
pub const RHEL: TenantId = TenantId::from_static("rhel");
pub const HCP: TenantId = TenantId::from_static("hcp");

pub const ADMIN_BINDING: &str = "rhobs-admin";
pub const ADMIN_GROUP: &str = "team-monitoring@redhat.com";

use super::Environment::{Production, Staging, Testing};
use rhobs_common::rbac::Permission::{Read, Write};

fn metrics(name: &str, tenant: TenantId) -> Grant {
    Grant::new(name, tenant).resources([Resource::Metrics])
}

/// Read-only telemeter access for service accounts named by client id
fn telemeter_reader(client_id: &str) -> Grant {
    metrics(client_id, TELEMETER)
        .permissions([Read])
        .environments([Production])
        .skip_convention_check()
}

fn telemeter_writer(client_id: &str, environments: &[Environment]) -> Grant {
    metrics(client_id, TELEMETER)
        .permissions([Write])
        .environments(environments.iter().copied())
        .skip_convention_check()
}

/// Grants emitted before the admin group binding
fn leading_grants() -> Vec<Grant> {
    vec![
        metrics("observatorium-cnv-qe", CNVQE)
            .permissions([Write, Read])
            .environments([Staging, Production]),
        // Starburst
        metrics("observatorium-starburst-isv-write", RHODS)
            .permissions([Write])
            .environments([Staging]),
        metrics("observatorium-starburst-isv-read", RHODS)
            .permissions([Read])
            .environments([Staging]),
        metrics("observatorium-rhacs-metrics", RHACS)
            .permissions([Write, Read])
            .environments([Staging, Production]),
        metrics("observatorium-rhacs-grafana", RHACS)
            .permissions([Read])
            .environments([Staging, Production]),
        metrics("observatorium-rhobs", RHOBS)
            .permissions([Write, Read])
            .environments([Testing, Staging, Production]),
        metrics("observatorium-rhobs-mst", RHOBS)
            .permissions([Write, Read])
            .environments([Staging, Production]),
    ]
}

fn trailing_grants() -> Vec<Grant> {
    let mut grants = vec![
        metrics("telemeter-service", TELEMETER)
            .permissions([Write, Read])
            .environments([Staging, Production]),
        metrics("observatorium-ccx-processing", TELEMETER)
            .permissions([Read])
            .environments([Staging, Production]),
        metrics("observatorium-sdtcs", TELEMETER)
            .permissions([Read])
            .environments([Staging, Production]),
        metrics("observatorium-subwatch", TELEMETER)
            .permissions([Read])
            .environments([Staging, Production]),
        metrics("observatorium-psiocp", PSIOCP)
            .permissions([Write, Read])
            .environments([Staging]),
        metrics("observatorium-odfms-write", ODFMS)
            .permissions([Write])
            .environments([Production]),
        metrics("observatorium-odfms-read", ODFMS)
            .permissions([Read])
            .environments([Production]),
        metrics("observatorium-odfms", ODFMS)
            .permissions([Read, Write])
            .environments([Staging]),
        metrics("observatorium-reference-addon", REFERENCE_ADDON)
            .permissions([Write, Read])
            .environments([Staging, Production]),
    ];

    grants.extend(
        [
            "7f7f912e-0429-4639-8e70-609ecf65b280",
            "8f7aa5e1-aa08-493d-82eb-cf24834fc08f",
            "4bfe1a9f-e875-4d37-9c6a-d2faff2a69dc",
            "f6b3e12c-bb50-4bfc-89fe-330a28820fa9",
            "1a45eb31-bcc6-4bb7-8a38-88f00aa718ee",
            "e7c2f772-e418-4ef3-9568-ea09b1acb929",
            "e07f5b10-e62b-47a2-9698-e245d1198a3b",
            "8a5cc14c-570c-4106-9a3b-cb2fcf4e3de4",
            "plmshift",
            "9baf25c1-f61e-4b0d-b3a5-41802dbc061e",
            "cefb23fb-d0a2-4c8f-9180-d95c259e79a3",
        ]
        .into_iter()
        .map(telemeter_reader),
    );

    grants.push(telemeter_writer(
        "875c08bc-d313-417f-a044-295212338e81",
        &[Staging, Production],
    ));
    grants.push(telemeter_writer("4cbd24b0-3aed-4b03-839a-f4515b199a5d", &[Production]));
    grants.push(telemeter_writer("0174b0a8-649a-4a95-bdff-9592f41b0de4", &[Production]));

    grants.extend([
        metrics("observatorium-rhtap", RHTAP)
            .permissions([Read, Write])
            .environments([Staging, Production]),
        metrics("aed46b58-abb5-4b1e-831f-a5678de691e0", RHTAP)
            .permissions([Read, Write])
            .environments([Staging])
            .skip_convention_check()
            .concrete_name(),
        metrics("observatorium-rhel-read", RHEL)
            .permissions([Read])
            .environments([Staging, Production]),
        metrics("observatorium-rhel-write", RHEL)
            .permissions([Write])
            .environments([Staging, Production]),
    ]);
    grants
}

/// Every environment-wide grant, in emission order
pub fn environment_grants() -> Vec<Grant> {
    let mut grants = leading_grants();
    grants.extend(trailing_grants());
    grants
}

/// RBAC document served by the environment-wide gateways, including the
/// monitoring team's admin binding
pub fn environment_rbac() -> Result<RbacDocument> {
    let mut generator = RbacGenerator::new();
    for grant in leading_grants() {
        generator.attach_binding(&grant)?;
    }

    generator.attach_group_binding(
        ADMIN_BINDING,
        &[
            (TELEMETER, Resource::Metrics, Read),
            (RHOBS, Resource::Metrics, Read),
        ],
        ADMIN_GROUP,
    )?;

    for grant in trailing_grants() {
        generator.attach_binding(&grant)?;
    }
    Ok(generator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhobs_common::rbac::{Subject, SubjectKind};
    use std::collections::HashSet;

    #[test]
    fn test_environment_rbac_generates() {
        let doc = environment_rbac().unwrap();
        assert_eq!(doc.role_bindings.len(), environment_grants().len() + 1);

        let names: HashSet<_> = doc.roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), doc.roles.len());
    }

    #[test]
    fn test_admin_binding_follows_rhobs_grants() {
        let doc = environment_rbac().unwrap();
        let position = doc
            .role_bindings
            .iter()
            .position(|b| b.name == ADMIN_BINDING)
            .unwrap();
        assert_eq!(doc.role_bindings[position - 1].name, "observatorium-rhobs-mst");

        let admin = &doc.role_bindings[position];
        assert_eq!(admin.roles, vec!["telemeter-metrics-read", "rhobs-metrics-read"]);
        assert_eq!(admin.subjects[0].kind, SubjectKind::Group);
        assert_eq!(admin.subjects[0].name, ADMIN_GROUP);
    }

    #[test]
    fn test_rhobs_binding_has_three_subjects() {
        let doc = environment_rbac().unwrap();
        let rhobs = doc.binding("observatorium-rhobs").unwrap();
        assert_eq!(
            rhobs.subjects,
            vec![
                Subject::user("service-account-observatorium-rhobs-testing"),
                Subject::user("service-account-observatorium-rhobs-staging"),
                Subject::user("service-account-observatorium-rhobs"),
            ]
        );
    }

    #[test]
    fn test_concrete_rhtap_account() {
        let doc = environment_rbac().unwrap();
        let binding = doc.binding("aed46b58-abb5-4b1e-831f-a5678de691e0").unwrap();
        assert_eq!(
            binding.subjects,
            vec![Subject::user("service-account-aed46b58-abb5-4b1e-831f-a5678de691e0")]
        );
    }
}
