//! Component keys shared by every parameter map

pub const MEMCACHED_EXPORTER: &str = "MEMCACHED_EXPORTER";
pub const API_CACHE: &str = "API_CACHE";
pub const JAEGER: &str = "JAEGER_AGENT";
pub const OBSERVATORIUM_API: &str = "OBSERVATORIUM_API";
pub const OPA_AMS: &str = "OPA_AMS";
pub const SYNTHETICS_API: &str = "SYNTHETICS_API";

// Thanos
pub const THANOS_OPERATOR: &str = "THANOS_OPERATOR";
pub const KUBE_RBAC_PROXY: &str = "KUBE_RBAC_PROXY";
pub const STORE_DEFAULT: &str = "STORE_DEFAULT";
pub const RECEIVE_ROUTER: &str = "RECEIVE_ROUTER";
pub const RECEIVE_INGESTOR_DEFAULT: &str = "RECEIVE_INGESTOR_DEFAULT";
pub const RULER: &str = "RULER";
pub const COMPACT_DEFAULT: &str = "COMPACT_DEFAULT";
pub const QUERY: &str = "QUERY";
pub const QUERY_FRONTEND: &str = "QUERY_FRONTEND";
pub const MANAGER: &str = "MANAGER";

// Loki
pub const LOKI_CONFIG: &str = "LOKI_CONFIG";

// Object storage
pub const DEFAULT_BUCKET: &str = "DEFAULT_BUCKET";

/// Log levels accepted by the observability components
pub const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
