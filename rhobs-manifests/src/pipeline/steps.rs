//! Named build steps and the standard step lists

use rhobs_common::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One unit of manifest generation for a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStep {
    ThanosOperatorCrds,
    ThanosOperator,
    DefaultThanosStack,
    LokiOperatorCrds,
    LokiOperator,
    DefaultLokiStack,
    ServiceMonitors,
    Alertmanager,
    Secrets,
    Gateway,
    Memcached,
    SyntheticsApi,
    NoOp,
}

impl BuildStep {
    pub const ALL: [BuildStep; 13] = [
        Self::ThanosOperatorCrds,
        Self::ThanosOperator,
        Self::DefaultThanosStack,
        Self::LokiOperatorCrds,
        Self::LokiOperator,
        Self::DefaultLokiStack,
        Self::ServiceMonitors,
        Self::Alertmanager,
        Self::Secrets,
        Self::Gateway,
        Self::Memcached,
        Self::SyntheticsApi,
        Self::NoOp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThanosOperatorCrds => "thanos-operator-crds",
            Self::ThanosOperator => "thanos-operator",
            Self::DefaultThanosStack => "default-thanos-stack",
            Self::LokiOperatorCrds => "loki-operator-crds",
            Self::LokiOperator => "loki-operator",
            Self::DefaultLokiStack => "default-loki-stack",
            Self::ServiceMonitors => "servicemonitors",
            Self::Alertmanager => "alertmanager",
            Self::Secrets => "secrets",
            Self::Gateway => "gateway",
            Self::Memcached => "memcached",
            Self::SyntheticsApi => "synthetics-api",
            Self::NoOp => "no-op",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ThanosOperatorCrds => "Thanos operator CRDs",
            Self::ThanosOperator => "Thanos operator deployment",
            Self::DefaultThanosStack => "Thanos query, receive, compact, ruler and store",
            Self::LokiOperatorCrds => "Loki operator CRDs",
            Self::LokiOperator => "Loki operator subscription",
            Self::DefaultLokiStack => "LokiStack",
            Self::ServiceMonitors => "ServiceMonitors for the Thanos components",
            Self::Alertmanager => "Alertmanager",
            Self::Secrets => "Object storage and cache secrets",
            Self::Gateway => "Observatorium API gateway",
            Self::Memcached => "Gateway API cache",
            Self::SyntheticsApi => "Synthetics API",
            Self::NoOp => "Does nothing",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| Error::UnknownBuildStep(s.to_string()))
    }
}

pub fn default_metrics_build_steps() -> Vec<BuildStep> {
    vec![
        BuildStep::ThanosOperatorCrds,
        BuildStep::ThanosOperator,
        BuildStep::DefaultThanosStack,
    ]
}

pub fn default_logging_build_steps() -> Vec<BuildStep> {
    vec![
        BuildStep::LokiOperatorCrds,
        BuildStep::LokiOperator,
        BuildStep::DefaultLokiStack,
    ]
}

pub fn default_synthetics_build_steps() -> Vec<BuildStep> {
    vec![BuildStep::SyntheticsApi]
}

/// Full step list: metrics, logging and synthetics stacks followed by the
/// shared components
pub fn default_build_steps() -> Vec<BuildStep> {
    let mut steps = default_metrics_build_steps();
    steps.extend(default_logging_build_steps());
    steps.extend(default_synthetics_build_steps());
    steps.extend([
        BuildStep::ServiceMonitors,
        BuildStep::Alertmanager,
        BuildStep::Secrets,
        BuildStep::Memcached,
        BuildStep::Gateway,
    ]);
    steps
}

/// Remove every step found in `remove` from `from`, keeping the order
pub fn prune(from: &[BuildStep], remove: &[&[BuildStep]]) -> Vec<BuildStep> {
    from.iter()
        .copied()
        .filter(|step| !remove.iter().any(|list| list.contains(step)))
        .collect()
}

/// Parse a comma separated step list such as `gateway,secrets`
pub fn parse_steps(list: &str) -> Result<Vec<BuildStep>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
