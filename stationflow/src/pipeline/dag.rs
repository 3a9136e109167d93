//! Dependency resolution over the station registry.
//!
//! Stations are grouped into topological layers: a station's layer is one
//! more than the deepest of its dependencies. Within a layer, stations keep
//! registry declaration order, so every derived ordering is deterministic.

use crate::core::RunStatus;
use crate::errors::{ConfigurationError, ErrorInfo};
use crate::registry::StationRegistry;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// The dependency graph of a registry.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Topological order (concatenated layers).
    order: Vec<String>,
    /// Topological layers.
    layers: Vec<Vec<String>>,
    /// Direct dependencies by station.
    dependencies: HashMap<String, BTreeSet<String>>,
    /// Direct dependents by station.
    dependents: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Builds the graph. The registry is already validated as acyclic.
    #[must_use]
    pub fn new(registry: &StationRegistry) -> Self {
        let mut dependencies: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut dependents: HashMap<String, BTreeSet<String>> = HashMap::new();

        for station in registry.iter() {
            dependencies.insert(station.id().to_string(), station.dependencies().clone());
            dependents.entry(station.id().to_string()).or_default();
            for dep in station.dependencies() {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .insert(station.id().to_string());
            }
        }

        // Kahn's algorithm, tracking the longest path to each station.
        let mut in_degree: HashMap<&str, usize> = dependencies
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.len()))
            .collect();
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut queue: VecDeque<&str> = registry
            .ids()
            .iter()
            .map(String::as_str)
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        while let Some(id) = queue.pop_front() {
            let next_depth = depth.get(id).copied().unwrap_or(0) + 1;
            depth.entry(id).or_insert(0);
            if let Some(children) = dependents.get(id) {
                for child in children {
                    let child_depth = depth.entry(child.as_str()).or_insert(0);
                    *child_depth = (*child_depth).max(next_depth);
                    if let Some(count) = in_degree.get_mut(child.as_str()) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            queue.push_back(child.as_str());
                        }
                    }
                }
            }
        }

        let layer_count = depth.values().max().map_or(0, |max| max + 1);
        let mut layers: Vec<Vec<String>> = vec![Vec::new(); layer_count];
        for id in registry.ids() {
            if let Some(&d) = depth.get(id.as_str()) {
                layers[d].push(id.clone());
            }
        }
        let order = layers.concat();

        Self {
            order,
            layers,
            dependencies,
            dependents,
        }
    }

    /// Returns the topological order.
    #[must_use]
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    /// Returns the topological layers.
    #[must_use]
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    /// Returns a station's direct dependencies.
    #[must_use]
    pub fn dependencies(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.dependencies.get(id)
    }

    /// Returns a station's direct dependents.
    #[must_use]
    pub fn dependents(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.dependents.get(id)
    }

    /// Returns every station that depends on `id`, directly or transitively.
    #[must_use]
    pub fn transitive_dependents(&self, id: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut stack: Vec<&str> = vec![id];

        while let Some(current) = stack.pop() {
            if let Some(children) = self.dependents.get(current) {
                for child in children {
                    if found.insert(child.clone()) {
                        stack.push(child.as_str());
                    }
                }
            }
        }

        found
    }

    /// Resolves a request into the stations to run, in topological order.
    ///
    /// The request is closed over transitive dependencies. An empty request
    /// selects every station.
    ///
    /// # Errors
    ///
    /// Returns an error if a requested station is not registered.
    pub fn plan(&self, requested: &[String]) -> Result<Vec<String>, ConfigurationError> {
        if requested.is_empty() {
            return Ok(self.order.clone());
        }

        let mut selected: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();

        for id in requested {
            if !self.dependencies.contains_key(id) {
                return Err(ConfigurationError::new(format!(
                    "Requested station '{id}' is not registered"
                ))
                .with_stations(vec![id.clone()])
                .with_error_info(ErrorInfo::new(
                    "CONFIG-UNKNOWN-STATION",
                    format!("Unknown station '{id}'"),
                )));
            }
            stack.push(id.as_str());
        }

        while let Some(id) = stack.pop() {
            if selected.insert(id) {
                if let Some(deps) = self.dependencies.get(id) {
                    stack.extend(deps.iter().map(String::as_str));
                }
            }
        }

        Ok(self
            .order
            .iter()
            .filter(|id| selected.contains(id.as_str()))
            .cloned()
            .collect())
    }

    /// Returns the pending stations of `plan` whose dependencies have all
    /// succeeded, in plan order.
    pub fn runnable<F>(&self, plan: &[String], status_of: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<RunStatus>,
    {
        plan.iter()
            .filter(|id| status_of(id.as_str()) == Some(RunStatus::Pending))
            .filter(|id| {
                self.dependencies.get(id.as_str()).is_some_and(|deps| {
                    deps.iter()
                        .all(|dep| status_of(dep.as_str()) == Some(RunStatus::Succeeded))
                })
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StationType;
    use crate::registry::StationDefinition;

    /// `("id", "dep1,dep2")` pairs.
    fn registry(spec: &[(&str, &str)]) -> StationRegistry {
        StationRegistry::from_definitions(spec.iter().map(|(id, deps)| {
            StationDefinition::new(*id, StationType::Analysis)
                .with_dependencies(deps.split(',').filter(|d| !d.is_empty()))
        }))
        .unwrap()
    }

    fn ids(values: &str) -> Vec<String> {
        values.split(',').map(str::to_string).collect()
    }

    #[test]
    fn test_layers_follow_longest_path() {
        let graph = DependencyGraph::new(&registry(&[
            ("report", "pacing,energy"),
            ("episodes", ""),
            ("pacing", "episodes"),
            ("energy", "episodes,pacing"),
        ]));

        assert_eq!(
            graph.layers(),
            &[ids("episodes"), ids("pacing"), ids("energy"), ids("report")]
        );
        assert_eq!(graph.topological_order(), ids("episodes,pacing,energy,report"));
    }

    #[test]
    fn test_layer_order_is_declaration_order() {
        let graph = DependencyGraph::new(&registry(&[("c", ""), ("a", ""), ("b", "")]));
        assert_eq!(graph.layers(), &[ids("c,a,b")]);
    }

    #[test]
    fn test_plan_closes_over_dependencies() {
        let graph = DependencyGraph::new(&registry(&[
            ("a", ""),
            ("b", "a"),
            ("c", "b"),
            ("d", ""),
        ]));

        assert_eq!(graph.plan(&ids("c")).unwrap(), ids("a,b,c"));
        assert_eq!(graph.plan(&[]).unwrap(), ids("a,d,b,c"));
    }

    #[test]
    fn test_plan_unknown_station() {
        let graph = DependencyGraph::new(&registry(&[("a", "")]));
        let err = graph.plan(&ids("zzz")).unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-UNKNOWN-STATION"));
    }

    #[test]
    fn test_runnable_requires_succeeded_dependencies() {
        let graph = DependencyGraph::new(&registry(&[("a", ""), ("b", "a"), ("c", "a")]));
        let plan = graph.plan(&[]).unwrap();

        let statuses: HashMap<&str, RunStatus> = [
            ("a", RunStatus::Running),
            ("b", RunStatus::Pending),
            ("c", RunStatus::Pending),
        ]
        .into_iter()
        .collect();
        assert!(graph.runnable(&plan, |id| statuses.get(id).copied()).is_empty());

        let statuses: HashMap<&str, RunStatus> = [
            ("a", RunStatus::Succeeded),
            ("b", RunStatus::Pending),
            ("c", RunStatus::Pending),
        ]
        .into_iter()
        .collect();
        assert_eq!(graph.runnable(&plan, |id| statuses.get(id).copied()), ids("b,c"));
    }

    #[test]
    fn test_runnable_is_deterministic() {
        let graph = DependencyGraph::new(&registry(&[("x", ""), ("y", ""), ("z", "")]));
        let plan = graph.plan(&[]).unwrap();
        let first = graph.runnable(&plan, |_| Some(RunStatus::Pending));
        let second = graph.runnable(&plan, |_| Some(RunStatus::Pending));
        assert_eq!(first, second);
        assert_eq!(first, ids("x,y,z"));
    }

    #[test]
    fn test_transitive_dependents() {
        let graph = DependencyGraph::new(&registry(&[
            ("a", ""),
            ("b", "a"),
            ("c", "b"),
            ("d", ""),
        ]));

        let dependents: Vec<String> = graph.transitive_dependents("a").into_iter().collect();
        assert_eq!(dependents, ids("b,c"));
        assert!(graph.transitive_dependents("d").is_empty());
    }
}
