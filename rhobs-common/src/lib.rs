//! Common types and utilities shared between rhobs-manifests and rhobs-cli

pub mod rbac;
pub mod tenants;

/// Workspace-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Generation error types
///
/// Every variant is a fail-fast condition: a generation run that hits one
/// produces no output for the cluster being built.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("template parameter '{key}' not found in {category}")]
    MissingTemplateKey { category: String, key: String },

    #[error("found duplicate binding name: {0}")]
    DuplicateBinding(String),

    #[error("found name breaking conventions with environment suffix: {name}, should be: {suggestion}")]
    NamingConvention { name: String, suggestion: String },

    #[error("cluster already registered: {0}")]
    DuplicateCluster(String),

    #[error("cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("unknown build step '{0}'")]
    UnknownBuildStep(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_message_names_key_and_category() {
        let err = Error::MissingTemplateKey {
            category: "images".to_string(),
            key: "QUERY".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("QUERY"));
        assert!(msg.contains("images"));
    }

    #[test]
    fn test_naming_convention_message() {
        let err = Error::NamingConvention {
            name: "foo-staging".to_string(),
            suggestion: "foo".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "found name breaking conventions with environment suffix: foo-staging, should be: foo"
        );
    }

    #[test]
    fn test_serde_errors_convert() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
