//! Gateway tenant definitions, rendered into the tenants.yaml secret

use serde::{Deserialize, Serialize};

/// OIDC settings for a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantOidc {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    #[serde(rename = "issuerURL")]
    pub issuer_url: String,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    #[serde(rename = "usernameClaim")]
    pub username_claim: String,
}

/// Tenant known to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oidc: Option<TenantOidc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenants {
    pub tenants: Vec<Tenant>,
}

impl Tenants {
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenants_yaml_keys() {
        let tenants = Tenants {
            tenants: vec![Tenant {
                name: "hcp".to_string(),
                id: "EFD08939-FE1D-41A1-A28A-BE9A9BC68003".to_string(),
                oidc: Some(TenantOidc {
                    client_id: "${CLIENT_ID}".to_string(),
                    client_secret: "${CLIENT_SECRET}".to_string(),
                    issuer_url: "https://sso.example.com/auth".to_string(),
                    redirect_url: "https://gw.example.com/oidc/hcp/callback".to_string(),
                    username_claim: "client_id".to_string(),
                }),
            }],
        };

        let yaml = tenants.to_yaml().unwrap();
        assert!(yaml.contains("clientID: ${CLIENT_ID}"));
        assert!(yaml.contains("usernameClaim: client_id"));
        assert!(!tenants.is_empty());
    }

    #[test]
    fn test_tenant_without_oidc_omits_block() {
        let tenants = Tenants {
            tenants: vec![Tenant {
                name: "plain".to_string(),
                id: "1".to_string(),
                oidc: None,
            }],
        };
        assert!(!tenants.to_yaml().unwrap().contains("oidc"));
    }
}
