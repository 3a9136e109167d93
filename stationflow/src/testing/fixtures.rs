//! Registry and payload fixtures.

use serde_json::json;

use crate::config::OrchestratorConfig;
use crate::core::{Payload, StationType};
use crate::errors::{ConfigurationError, StationflowError};
use crate::pipeline::RetryPolicy;
use crate::registry::{StationDefinition, StationRegistry};

/// A six-station audio-drama analysis pipeline.
///
/// `episode_analysis` feeds `energy_mapping` and `pacing_analysis`, which
/// both feed `scene_rewrites`; `dialogue_polish` refines the rewrites and
/// `continuity_check` validates the result.
pub const DRAMA_CONFIG: &str = r#"{
    "engine": { "max_concurrency": 4, "attempt_timeout_ms": 5000 },
    "stations": [
        { "id": "episode_analysis", "type": "analysis",
          "retry": { "max_attempts": 3, "base_backoff_ms": 1, "max_backoff_ms": 4 } },
        { "id": "energy_mapping", "type": "analysis", "depends_on": ["episode_analysis"],
          "retry": { "max_attempts": 3, "base_backoff_ms": 1, "max_backoff_ms": 4 } },
        { "id": "pacing_analysis", "type": "analysis", "depends_on": ["episode_analysis"],
          "retry": { "max_attempts": 3, "base_backoff_ms": 1, "max_backoff_ms": 4 } },
        { "id": "scene_rewrites", "type": "generation",
          "depends_on": ["energy_mapping", "pacing_analysis"],
          "complexity": "medium", "bounds": { "medium_min": 400, "medium_max": 1600 },
          "retry": { "max_attempts": 2, "base_backoff_ms": 1, "max_backoff_ms": 4 } },
        { "id": "dialogue_polish", "type": "enhancement", "depends_on": ["scene_rewrites"],
          "complexity": "short", "bounds": { "short_min": 100, "short_max": 600 },
          "retry": { "max_attempts": 2, "base_backoff_ms": 1, "max_backoff_ms": 4 } },
        { "id": "continuity_check", "type": "validation", "depends_on": ["dialogue_polish"],
          "retry": { "max_attempts": 1 } }
    ]
}"#;

/// Builds the registry described by [`DRAMA_CONFIG`].
///
/// # Errors
///
/// Returns an error if the embedded configuration fails to parse or validate.
pub fn drama_registry() -> Result<StationRegistry, StationflowError> {
    Ok(OrchestratorConfig::from_json_str(DRAMA_CONFIG)?.build_registry()?)
}

/// A retry policy with millisecond backoff.
#[must_use]
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(max_attempts)
        .with_base_backoff_ms(1)
        .with_max_backoff_ms(4)
}

/// `a` with dependents `b` and `c`, all using `policy`.
///
/// # Errors
///
/// Never fails for a valid policy.
pub fn fan_out_registry(policy: &RetryPolicy) -> Result<StationRegistry, ConfigurationError> {
    StationRegistry::from_definitions([
        StationDefinition::new("a", StationType::Analysis).with_retry(policy.clone()),
        StationDefinition::new("b", StationType::Analysis)
            .with_dependency("a")
            .with_retry(policy.clone()),
        StationDefinition::new("c", StationType::Analysis)
            .with_dependency("a")
            .with_retry(policy.clone()),
    ])
}

/// A chain where each station depends on the previous one.
///
/// # Errors
///
/// Returns an error if an id is invalid or repeated.
pub fn linear_registry(ids: &[&str], policy: &RetryPolicy) -> Result<StationRegistry, ConfigurationError> {
    StationRegistry::from_definitions(ids.iter().enumerate().map(|(i, id)| {
        let definition = StationDefinition::new(*id, StationType::Analysis).with_retry(policy.clone());
        match i.checked_sub(1).and_then(|prev| ids.get(prev)) {
            Some(prev) => definition.with_dependency(*prev),
            None => definition,
        }
    }))
}

/// An episode entry as analysis stations emit it.
#[must_use]
pub fn episode(number: u32, scene_count: u32, energy: Option<f64>) -> Payload {
    let mut entry = json!({
        "number": number,
        "title": format!("Episode {number}"),
        "scene_count": scene_count,
    });
    if let (Some(energy), Some(map)) = (energy, entry.as_object_mut()) {
        map.insert("energy".to_string(), json!(energy));
    }
    entry
}

/// Wraps episode entries in an analysis payload.
#[must_use]
pub fn episodes_payload(episodes: impl IntoIterator<Item = Payload>) -> Payload {
    json!({ "episodes": episodes.into_iter().collect::<Vec<_>>() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drama_registry() {
        let registry = drama_registry().unwrap();
        assert_eq!(registry.len(), 6);
        assert_eq!(
            registry.get("scene_rewrites").unwrap().station_type(),
            StationType::Generation
        );
        assert_eq!(registry.get("continuity_check").unwrap().retry().max_attempts, 1);
    }

    #[test]
    fn test_linear_registry() {
        let registry = linear_registry(&["x", "y", "z"], &fast_retry(2)).unwrap();
        assert!(registry.get("x").unwrap().dependencies().is_empty());
        assert!(registry.get("z").unwrap().dependencies().contains("y"));
    }

    #[test]
    fn test_episode_payload() {
        let payload = episodes_payload([episode(1, 3, Some(5.5)), episode(2, 1, None)]);
        assert_eq!(payload["episodes"][0]["energy"], json!(5.5));
        assert!(payload["episodes"][1].get("energy").is_none());
        assert_eq!(payload["episodes"][1]["scene_count"], json!(1));
    }
}
