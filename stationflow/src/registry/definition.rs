//! Declarative station definitions and their validated form.

use crate::core::StationType;
use crate::errors::{ConfigurationError, ErrorInfo};
use crate::pipeline::RetryPolicy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

const STATION_ID_PATTERN: &str = "^[A-Za-z0-9][A-Za-z0-9_-]*$";

fn station_id_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    PATTERN.get_or_init(|| Regex::new(STATION_ID_PATTERN).expect("station id pattern compiles"))
}

/// Output-length tier for AI-generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    /// Short-form output.
    Short,
    /// Medium-form output.
    Medium,
    /// Long-form output.
    Long,
}

impl ComplexityTier {
    /// The bounds key holding the tier's minimum length.
    #[must_use]
    pub fn min_key(&self) -> String {
        format!("{self}_min")
    }

    /// The bounds key holding the tier's maximum length.
    #[must_use]
    pub fn max_key(&self) -> String {
        format!("{self}_max")
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => write!(f, "short"),
            Self::Medium => write!(f, "medium"),
            Self::Long => write!(f, "long"),
        }
    }
}

/// Validated output-length bounds handed to processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBounds {
    /// The complexity tier the bounds belong to.
    pub tier: ComplexityTier,
    /// Minimum output length.
    pub min: u32,
    /// Maximum output length.
    pub max: u32,
}

/// A station as written in the registry source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDefinition {
    /// Unique station id.
    pub id: String,
    /// The station type.
    #[serde(rename = "type")]
    pub station_type: StationType,
    /// Ids of stations whose output this station consumes.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Retry policy for failed attempts.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Output-length tier, required for generation and enhancement stations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexityTier>,
    /// Raw numeric bounds such as `short_min` / `short_max`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bounds: BTreeMap<String, u32>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StationDefinition {
    /// Creates a definition with no dependencies and the default retry policy.
    #[must_use]
    pub fn new(id: impl Into<String>, station_type: StationType) -> Self {
        Self {
            id: id.into(),
            station_type,
            depends_on: Vec::new(),
            retry: RetryPolicy::default(),
            complexity: None,
            bounds: BTreeMap::new(),
            description: None,
        }
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.depends_on.push(dep.into());
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the complexity tier.
    #[must_use]
    pub fn with_complexity(mut self, tier: ComplexityTier) -> Self {
        self.complexity = Some(tier);
        self
    }

    /// Sets a raw bound.
    #[must_use]
    pub fn with_bound(mut self, key: impl Into<String>, value: u32) -> Self {
        self.bounds.insert(key.into(), value);
        self
    }

    /// Sets both bounds for a tier.
    #[must_use]
    pub fn with_bounds(self, tier: ComplexityTier, min: u32, max: u32) -> Self {
        self.with_complexity(tier)
            .with_bound(tier.min_key(), min)
            .with_bound(tier.max_key(), max)
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validates the definition in isolation.
    ///
    /// Cross-station checks (unknown dependencies, cycles, duplicates) belong
    /// to the registry builder.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid id, a self-dependency, an invalid
    /// retry policy, or missing/inverted output bounds.
    pub fn validate(&self) -> Result<Station, ConfigurationError> {
        if !station_id_regex().is_match(&self.id) {
            return Err(ConfigurationError::new(format!(
                "Station id '{}' must match {STATION_ID_PATTERN}",
                self.id
            ))
            .with_stations(vec![self.id.clone()])
            .with_error_info(ErrorInfo::new("CONFIG-INVALID-ID", "Invalid station id")));
        }

        let dependencies: BTreeSet<String> = self.depends_on.iter().cloned().collect();
        if dependencies.contains(&self.id) {
            return Err(ConfigurationError::new(format!(
                "Station '{}' cannot depend on itself",
                self.id
            ))
            .with_stations(vec![self.id.clone()])
            .with_error_info(ErrorInfo::new("CONFIG-SELF-DEP", "Self dependency")));
        }

        self.retry.validate(&self.id)?;
        let output_bounds = self.resolve_bounds()?;

        Ok(Station {
            id: self.id.clone(),
            station_type: self.station_type,
            dependencies,
            retry: self.retry.clone(),
            output_bounds,
            description: self.description.clone(),
        })
    }

    fn resolve_bounds(&self) -> Result<Option<OutputBounds>, ConfigurationError> {
        let tier = match self.complexity {
            Some(tier) => tier,
            None if self.station_type.requires_output_bounds() => {
                return Err(self.missing_bound("complexity"));
            }
            None => return Ok(None),
        };

        let min_key = tier.min_key();
        let max_key = tier.max_key();
        let min = *self.bounds.get(&min_key).ok_or_else(|| self.missing_bound(&min_key))?;
        let max = *self.bounds.get(&max_key).ok_or_else(|| self.missing_bound(&max_key))?;

        if min > max {
            return Err(ConfigurationError::new(format!(
                "Station '{}' has {min_key} = {min} greater than {max_key} = {max}",
                self.id
            ))
            .with_stations(vec![self.id.clone()])
            .with_error_info(
                ErrorInfo::new("CONFIG-INVALID-BOUND", "Inverted output bounds")
                    .with_context_entry("tier", tier.to_string()),
            ));
        }

        Ok(Some(OutputBounds { tier, min, max }))
    }

    fn missing_bound(&self, key: &str) -> ConfigurationError {
        ConfigurationError::new(format!(
            "Station '{}' ({}) is missing required bound '{key}'",
            self.id, self.station_type
        ))
        .with_stations(vec![self.id.clone()])
        .with_error_info(
            ErrorInfo::new("CONFIG-MISSING-BOUND", format!("Required bound '{key}' is absent"))
                .with_fix_hint("Declare the bound explicitly; bounds are never defaulted.")
                .with_context_entry("bound", key),
        )
    }
}

/// A validated, immutable station.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    id: String,
    station_type: StationType,
    dependencies: BTreeSet<String>,
    retry: RetryPolicy,
    output_bounds: Option<OutputBounds>,
    description: Option<String>,
}

impl Station {
    /// The station id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The station type.
    #[must_use]
    pub fn station_type(&self) -> StationType {
        self.station_type
    }

    /// Declared dependencies, sorted.
    #[must_use]
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// The retry policy.
    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The validated output bounds, if any.
    #[must_use]
    pub fn output_bounds(&self) -> Option<OutputBounds> {
        self.output_bounds
    }

    /// The description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
