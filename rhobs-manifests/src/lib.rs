//! RHOBS manifest generator library
//!
//! Builds the Kubernetes manifests of every RHOBS cluster from layered
//! template maps and generated gateway RBAC.

// Core modules
pub mod config;
pub mod error;
pub mod validation;

// Template maps and their override engine
pub mod template;

// Gateway RBAC generation
pub mod rbac;

// Cluster catalog and registry
pub mod clusters;

// Manifest builders and the build pipeline
pub mod manifests;
pub mod output;
pub mod pipeline;

// Logging configuration
pub mod logging;

pub use clusters::{ClusterConfig, ClusterEnvironment, ClusterName, ClusterRegistry};
pub use error::{BuildError, BuildResult};
pub use pipeline::{BuildStep, Builder};
pub use template::TemplateMaps;
