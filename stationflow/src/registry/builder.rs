//! Registry builder with validation.

use super::{Station, StationDefinition, StationRegistry};
use crate::errors::{ConfigurationError, CycleDetectedError, ErrorInfo};
use std::collections::HashMap;

/// Builder for creating a validated station registry.
///
/// Definitions may be added in any order; cross-station checks run in
/// [`RegistryBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    /// Validated stations by id.
    stations: HashMap<String, Station>,
    /// Declaration order.
    order: Vec<String>,
}

impl RegistryBuilder {
    /// Creates a new registry builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a station definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid or its id is taken.
    pub fn station(mut self, definition: StationDefinition) -> Result<Self, ConfigurationError> {
        self.add_definition(definition)?;
        Ok(self)
    }

    /// Adds a station definition in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid or its id is taken.
    pub fn add_definition(&mut self, definition: StationDefinition) -> Result<(), ConfigurationError> {
        let station = definition.validate()?;

        if self.stations.contains_key(station.id()) {
            return Err(ConfigurationError::new(format!(
                "Station '{}' is defined more than once",
                station.id()
            ))
            .with_stations(vec![station.id().to_string()])
            .with_error_info(
                ErrorInfo::new("CONFIG-DUPLICATE", "Duplicate station id")
                    .with_fix_hint("Give every station a unique id."),
            ));
        }

        self.order.push(station.id().to_string());
        self.stations.insert(station.id().to_string(), station);
        Ok(())
    }

    /// Returns the number of stations added so far.
    #[must_use]
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is empty, a dependency is unknown,
    /// or the dependencies form a cycle.
    pub fn build(self) -> Result<StationRegistry, ConfigurationError> {
        if self.stations.is_empty() {
            return Err(ConfigurationError::new("Station registry has no stations")
                .with_error_info(
                    ErrorInfo::new("CONFIG-EMPTY", "Cannot build an empty registry")
                        .with_fix_hint("Define at least one station."),
                ));
        }

        for id in &self.order {
            let station = &self.stations[id];
            for dep in station.dependencies() {
                if !self.stations.contains_key(dep) {
                    return Err(ConfigurationError::new(format!(
                        "Station '{id}' depends on unknown station '{dep}'"
                    ))
                    .with_stations(vec![id.clone(), dep.clone()])
                    .with_error_info(
                        ErrorInfo::new(
                            "CONFIG-MISSING-DEP",
                            format!("Dependency '{dep}' not found"),
                        )
                        .with_fix_hint("Check the dependency id for typos."),
                    ));
                }
            }
        }

        if let Some(cycle) = self.find_cycle() {
            return Err(CycleDetectedError::new(cycle).into());
        }

        Ok(StationRegistry::new(self.stations, self.order))
    }

    /// Walks dependency edges depth first and returns the first cycle found,
    /// as a path that starts and ends on the same station.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks: HashMap<&str, Walk> = HashMap::new();

        for root in &self.order {
            if marks.contains_key(root.as_str()) {
                continue;
            }
            marks.insert(root.as_str(), Walk::OnTrail);
            // Each frame holds a station and the dependencies still to visit.
            let mut trail: Vec<(&str, Vec<&str>)> = vec![(root.as_str(), self.dependencies_of(root))];

            while let Some((station, unvisited)) = trail.last_mut() {
                let station = *station;
                let Some(dep) = unvisited.pop() else {
                    marks.insert(station, Walk::Done);
                    trail.pop();
                    continue;
                };
                match marks.get(dep) {
                    Some(Walk::Done) => {}
                    Some(Walk::OnTrail) => {
                        let start = trail.iter().position(|(id, _)| *id == dep).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            trail[start..].iter().map(|(id, _)| (*id).to_string()).collect();
                        cycle.push(dep.to_string());
                        return Some(cycle);
                    }
                    None => {
                        marks.insert(dep, Walk::OnTrail);
                        trail.push((dep, self.dependencies_of(dep)));
                    }
                }
            }
        }

        None
    }

    /// Dependencies in reverse id order, so popping visits them in id order.
    fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.stations
            .get(id)
            .map(|station| station.dependencies().iter().rev().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
enum Walk {
    OnTrail,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StationType;

    fn analysis(id: &str, deps: &[&str]) -> StationDefinition {
        StationDefinition::new(id, StationType::Analysis).with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_builder_creation() {
        let builder = RegistryBuilder::new();
        assert_eq!(builder.station_count(), 0);
    }

    #[test]
    fn test_builder_accepts_any_order() {
        let registry = RegistryBuilder::new()
            .station(analysis("b", &["a"]))
            .unwrap()
            .station(analysis("a", &[]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), ["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_builder_duplicate() {
        let err = RegistryBuilder::new()
            .station(analysis("a", &[]))
            .unwrap()
            .station(analysis("a", &[]))
            .unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-DUPLICATE"));
    }

    #[test]
    fn test_builder_missing_dependency() {
        let err = RegistryBuilder::new()
            .station(analysis("a", &["missing"]))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONFIG-MISSING-DEP"));
        assert_eq!(err.stations, vec!["a".to_string(), "missing".to_string()]);
    }

    #[test]
    fn test_builder_cycle_detection() {
        let err = RegistryBuilder::new()
            .station(analysis("a", &["c"]))
            .unwrap()
            .station(analysis("b", &["a"]))
            .unwrap()
            .station(analysis("c", &["b"]))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONFIG-CYCLE"));
        assert_eq!(err.stations, vec!["a", "c", "b"]);
        assert!(err.to_string().contains("a -> c -> b -> a"));
    }

    #[test]
    fn test_cycle_behind_acyclic_prefix() {
        let err = RegistryBuilder::new()
            .station(analysis("root", &[]))
            .unwrap()
            .station(analysis("x", &["root", "y"]))
            .unwrap()
            .station(analysis("y", &["x"]))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONFIG-CYCLE"));
        assert_eq!(err.stations, vec!["x", "y"]);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let registry = RegistryBuilder::new()
            .station(analysis("top", &[]))
            .unwrap()
            .station(analysis("left", &["top"]))
            .unwrap()
            .station(analysis("right", &["top"]))
            .unwrap()
            .station(analysis("bottom", &["left", "right"]))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_builder_empty_build() {
        let err = RegistryBuilder::new().build().unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-EMPTY"));
    }

    #[test]
    fn test_builder_propagates_definition_errors() {
        let err = RegistryBuilder::new()
            .station(StationDefinition::new("gen", StationType::Generation))
            .unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-MISSING-BOUND"));
    }
}
