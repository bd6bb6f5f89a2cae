//! Template parameter maps and the override chain
//!
//! A [`TemplateMaps`] holds one parameter map per attribute category, all keyed
//! by component key (see [`keys`]). Clusters start from a shared base and apply
//! sparse overrides with [`TemplateMaps::override_with`]. Overrides never touch
//! the base: each category sits behind an `Arc` and is cloned on the first write
//! within an override chain.

pub mod base;
pub mod keys;

pub use base::{default_base_template, production_maps, resource_requirements, stage_maps};

use k8s_openapi::api::core::v1::ResourceRequirements;
use rhobs_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Component key to value mapping for one attribute category
pub type ParamMap<T> = BTreeMap<String, T>;

/// Persistent volume size, e.g. "10Gi"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageSize(pub String);

impl From<&str> for StorageSize {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for StorageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to the secret holding an object storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStorageConfig {
    pub name: String,
    pub key: String,
    pub optional: bool,
}

impl ObjectStorageConfig {
    pub fn new(name: &str, key: &str) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            optional: false,
        }
    }
}

/// Per-component settings of the log-aggregation stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LokiComponentSpec {
    pub replicas: i32,
}

/// Log-aggregation limits. Zero and empty values mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LokiLimitOverrides {
    pub ingestion_rate_limit_mb: i32,
    pub ingestion_burst_size_mb: i32,
    pub max_line_size: i32,
    pub per_stream_rate_limit_mb: i32,
    pub per_stream_burst_size_mb: i32,
    pub query_timeout: String,
}

/// Nested log-aggregation overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LokiOverrides {
    pub limits: LokiLimitOverrides,
    pub router: LokiComponentSpec,
    pub ingest: LokiComponentSpec,
    pub query: LokiComponentSpec,
    pub query_frontend: LokiComponentSpec,
}

/// Attribute category, used to name the map in lookup errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Images,
    Versions,
    LogLevels,
    Replicas,
    ResourceRequirements,
    StorageSize,
    ObjectStorageBucket,
    LokiOverrides,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Versions => "versions",
            Self::LogLevels => "log levels",
            Self::Replicas => "replicas",
            Self::ResourceRequirements => "resource requirements",
            Self::StorageSize => "storage sizes",
            Self::ObjectStorageBucket => "object storage buckets",
            Self::LokiOverrides => "loki overrides",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up `key` in `map`. A missing key is a configuration authoring bug and
/// is reported as [`Error::MissingTemplateKey`]; there is no default.
pub fn lookup<T: Clone>(category: Category, key: &str, map: &ParamMap<T>) -> Result<T> {
    map.get(key).cloned().ok_or_else(|| Error::MissingTemplateKey {
        category: category.to_string(),
        key: key.to_string(),
    })
}

/// All parameter maps for one environment or cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateMaps {
    pub images: Arc<ParamMap<String>>,
    pub versions: Arc<ParamMap<String>>,
    pub log_levels: Arc<ParamMap<String>>,
    pub replicas: Arc<ParamMap<i32>>,
    pub resource_requirements: Arc<ParamMap<ResourceRequirements>>,
    pub storage_size: Arc<ParamMap<StorageSize>>,
    pub object_storage_bucket: Arc<ParamMap<ObjectStorageConfig>>,
    pub loki_overrides: Arc<ParamMap<LokiOverrides>>,
}

impl TemplateMaps {
    /// Apply `overrides` left to right and return the result. Later overrides
    /// win on key collisions; `self` is left untouched.
    pub fn override_with(&self, overrides: &[&dyn TemplateOverride]) -> TemplateMaps {
        overrides
            .iter()
            .fold(self.clone(), |maps, o| o.apply(maps))
    }

    pub fn image(&self, key: &str) -> Result<String> {
        lookup(Category::Images, key, &self.images)
    }

    pub fn version(&self, key: &str) -> Result<String> {
        lookup(Category::Versions, key, &self.versions)
    }

    pub fn log_level(&self, key: &str) -> Result<String> {
        lookup(Category::LogLevels, key, &self.log_levels)
    }

    pub fn replicas(&self, key: &str) -> Result<i32> {
        lookup(Category::Replicas, key, &self.replicas)
    }

    pub fn resources(&self, key: &str) -> Result<ResourceRequirements> {
        lookup(Category::ResourceRequirements, key, &self.resource_requirements)
    }

    pub fn storage_size(&self, key: &str) -> Result<StorageSize> {
        lookup(Category::StorageSize, key, &self.storage_size)
    }

    pub fn bucket(&self, key: &str) -> Result<ObjectStorageConfig> {
        lookup(Category::ObjectStorageBucket, key, &self.object_storage_bucket)
    }

    pub fn loki(&self, key: &str) -> Result<LokiOverrides> {
        lookup(Category::LokiOverrides, key, &self.loki_overrides)
    }
}

/// A sparse, typed override of one attribute category
pub trait TemplateOverride {
    fn apply(&self, maps: TemplateMaps) -> TemplateMaps;
}

fn replace_all<T: Clone>(target: &mut Arc<ParamMap<T>>, values: &ParamMap<T>) {
    if values.is_empty() {
        return;
    }
    let map = Arc::make_mut(target);
    for (k, v) in values {
        map.insert(k.clone(), v.clone());
    }
}

macro_rules! replacing_override {
    ($(#[$doc:meta])* $name:ident, $field:ident, $ty:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name(pub ParamMap<$ty>);

        impl<K: Into<String>, const N: usize> From<[(K, $ty); N]> for $name {
            fn from(entries: [(K, $ty); N]) -> Self {
                Self(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
            }
        }

        impl TemplateOverride for $name {
            fn apply(&self, mut maps: TemplateMaps) -> TemplateMaps {
                replace_all(&mut maps.$field, &self.0);
                maps
            }
        }
    };
}

replacing_override!(
    /// Image reference override
    Images, images, String
);
replacing_override!(
    /// Version tag override
    Versions, versions, String
);
replacing_override!(
    /// Log level override
    LogLevels, log_levels, String
);
replacing_override!(
    /// Replica count override
    Replicas, replicas, i32
);
replacing_override!(
    /// Resource requirement override. Each entry replaces the whole value.
    Resources, resource_requirements, ResourceRequirements
);
replacing_override!(
    /// Storage size override. Each entry replaces the whole value.
    StorageSizes, storage_size, StorageSize
);
replacing_override!(
    /// Object storage bucket override
    ObjectStorageBuckets, object_storage_bucket, ObjectStorageConfig
);

/// Log-aggregation override. Merged field by field into any existing entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LokiOverridesMap(pub ParamMap<LokiOverrides>);

impl<K: Into<String>, const N: usize> From<[(K, LokiOverrides); N]> for LokiOverridesMap {
    fn from(entries: [(K, LokiOverrides); N]) -> Self {
        Self(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl TemplateOverride for LokiOverridesMap {
    fn apply(&self, mut maps: TemplateMaps) -> TemplateMaps {
        if self.0.is_empty() {
            return maps;
        }
        let target = Arc::make_mut(&mut maps.loki_overrides);
        for (key, update) in &self.0 {
            let existing = target.get(key).cloned().unwrap_or_default();
            target.insert(key.clone(), merge_loki_overrides(existing, update));
        }
        maps
    }
}

fn merge_i32(existing: &mut i32, update: i32) {
    if update != 0 {
        *existing = update;
    }
}

fn merge_component(existing: &mut LokiComponentSpec, update: &LokiComponentSpec) {
    merge_i32(&mut existing.replicas, update.replicas);
}

fn merge_limits(existing: &mut LokiLimitOverrides, update: &LokiLimitOverrides) {
    merge_i32(&mut existing.ingestion_rate_limit_mb, update.ingestion_rate_limit_mb);
    merge_i32(&mut existing.ingestion_burst_size_mb, update.ingestion_burst_size_mb);
    merge_i32(&mut existing.max_line_size, update.max_line_size);
    merge_i32(&mut existing.per_stream_rate_limit_mb, update.per_stream_rate_limit_mb);
    merge_i32(&mut existing.per_stream_burst_size_mb, update.per_stream_burst_size_mb);
    if !update.query_timeout.is_empty() {
        existing.query_timeout = update.query_timeout.clone();
    }
}

/// Merge `update` into `existing`, keeping existing values wherever the update
/// leaves a field at its zero value
pub fn merge_loki_overrides(mut existing: LokiOverrides, update: &LokiOverrides) -> LokiOverrides {
    merge_limits(&mut existing.limits, &update.limits);
    merge_component(&mut existing.router, &update.router);
    merge_component(&mut existing.ingest, &update.ingest);
    merge_component(&mut existing.query, &update.query);
    merge_component(&mut existing.query_frontend, &update.query_frontend);
    existing
}
