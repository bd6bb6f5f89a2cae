//! Input validation for cluster definitions and configuration

use rhobs_common::Error;
use regex::Regex;
use std::sync::LazyLock;

/// Kubernetes label values and DNS labels are capped at 63 characters
pub const MAX_DNS_LABEL_LENGTH: usize = 63;
pub const MAX_HOSTNAME_LENGTH: usize = 253;

static DNS_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap()
});

static HOSTNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$").unwrap()
});

static API_GROUP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+$").unwrap()
});

/// Validation result type
pub type ValidationResult<T> = Result<T, Error>;

fn validate_dns_label(kind: &str, value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("{} cannot be empty", kind)));
    }

    if value.len() > MAX_DNS_LABEL_LENGTH {
        return Err(Error::Validation(format!(
            "{} too long (max {} characters)",
            kind, MAX_DNS_LABEL_LENGTH
        )));
    }

    if !DNS_LABEL_REGEX.is_match(value) {
        return Err(Error::Validation(format!(
            "{} '{}' must consist of lower case alphanumeric characters or '-'",
            kind, value
        )));
    }

    Ok(())
}

/// Cluster names end up in directory names and resource labels
pub fn validate_cluster_name(name: &str) -> ValidationResult<()> {
    validate_dns_label("Cluster name", name)
}

/// Namespace validation (RFC 1123 label)
pub fn validate_namespace(namespace: &str) -> ValidationResult<()> {
    validate_dns_label("Namespace", namespace)
}

/// Hostname validation
pub fn validate_hostname(hostname: &str) -> ValidationResult<()> {
    if hostname.is_empty() {
        return Err(Error::Validation("Hostname cannot be empty".to_string()));
    }

    if hostname.len() > MAX_HOSTNAME_LENGTH {
        return Err(Error::Validation(format!(
            "Hostname too long (max {} characters)",
            MAX_HOSTNAME_LENGTH
        )));
    }

    if !HOSTNAME_REGEX.is_match(hostname) {
        return Err(Error::Validation(format!(
            "Invalid hostname format: {}",
            hostname
        )));
    }

    Ok(())
}

/// URL validation
pub fn validate_url(url: &str) -> ValidationResult<()> {
    if url.is_empty() {
        return Err(Error::Validation("URL cannot be empty".to_string()));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::Validation(
            "URL must start with http:// or https://".to_string(),
        ));
    }

    url::Url::parse(url).map_err(|e| Error::Validation(format!("Invalid URL: {}", e)))?;

    Ok(())
}

/// API group of the monitoring CRDs, e.g. `monitoring.rhobs`
pub fn validate_api_group(group: &str) -> ValidationResult<()> {
    if !API_GROUP_REGEX.is_match(group) {
        return Err(Error::Validation(format!("Invalid API group: {}", group)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_cluster_name() {
        assert!(validate_cluster_name("rhobss01ue1").is_ok());
        assert!(validate_cluster_name("").is_err());
        assert!(validate_cluster_name("Cluster").is_err());
        assert!(validate_cluster_name("-leading").is_err());
        assert!(validate_cluster_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("rhobs-production").is_ok());
        assert!(validate_namespace("rhobs_prod").is_err());
        assert!(validate_namespace("trailing-").is_err());
    }

    #[test]
    fn test_validate_hostname() {
        assert!(validate_hostname("rhobs.us-east-1-0.api.openshift.com").is_ok());
        assert!(validate_hostname("").is_err());
        assert!(validate_hostname("bad host").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://api.openshift.com").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_validate_api_group() {
        assert!(validate_api_group("monitoring.rhobs").is_ok());
        assert!(validate_api_group("monitoring").is_err());
    }
}
