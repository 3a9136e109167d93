//! Report synthesis.
//!
//! A finished session's succeeded outputs and error records are condensed
//! into an [`AnalysisReport`] with five fixed sections. Every computation
//! tolerates missing data: no episodes means zero counts and averages, and
//! too few energy ratings means an `Insufficient data` trend.

mod metrics;
mod render;

pub use metrics::{average, classify_trend, collect_episodes, severity_for, EpisodeData};

use crate::core::{Payload, RunStatus, SessionId, SessionResult, SessionStatus};
use crate::errors::StoreError;
use crate::pipeline::ErrorRecord;
use crate::store::StateStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use std::fmt;
use tracing::{debug, warn};

/// Section headings, in the order they appear.
pub const SECTION_HEADINGS: [&str; 5] = [
    "Executive Summary",
    "Energy Analysis",
    "Problem Zones Identified",
    "Pacing Fixes Recommended",
    "Errors Encountered",
];

fn default_dead_zone_energy() -> f64 {
    4.0
}

fn default_overload_energy() -> f64 {
    8.0
}

fn default_stable_band() -> f64 {
    0.5
}

fn default_high_severity_distance() -> f64 {
    2.0
}

fn default_medium_severity_distance() -> f64 {
    1.0
}

/// Numeric thresholds used by the synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportThresholds {
    /// Energy below this marks a dead zone.
    #[serde(default = "default_dead_zone_energy")]
    pub dead_zone_energy: f64,
    /// Energy above this marks an overload zone.
    #[serde(default = "default_overload_energy")]
    pub overload_energy: f64,
    /// Successive ratings closer than this are neither a rise nor a fall.
    #[serde(default = "default_stable_band")]
    pub stable_band: f64,
    /// Distance past a threshold that makes a zone high severity.
    #[serde(default = "default_high_severity_distance")]
    pub high_severity_distance: f64,
    /// Distance past a threshold that makes a zone medium severity.
    #[serde(default = "default_medium_severity_distance")]
    pub medium_severity_distance: f64,
}

impl Default for ReportThresholds {
    fn default() -> Self {
        Self {
            dead_zone_energy: default_dead_zone_energy(),
            overload_energy: default_overload_energy(),
            stable_band: default_stable_band(),
            high_severity_distance: default_high_severity_distance(),
            medium_severity_distance: default_medium_severity_distance(),
        }
    }
}

/// Energy trend across rated episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyTrend {
    /// Fewer than two rated episodes.
    InsufficientData,
    /// Rises and falls balance out.
    Stable,
    /// More rises than falls.
    Rising,
    /// More falls than rises.
    Falling,
}

impl fmt::Display for EnergyTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InsufficientData => "Insufficient data",
            Self::Stable => "Stable",
            Self::Rising => "Rising",
            Self::Falling => "Falling",
        })
    }
}

/// Severity of a problem zone, also the priority of a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor.
    Low,
    /// Noticeable.
    #[default]
    Medium,
    /// Needs attention first.
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// The kind of problem zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    /// Energy too low to hold the listener.
    DeadZone,
    /// Energy sustained too high for too long.
    Overload,
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DeadZone => "Dead zone",
            Self::Overload => "Overload zone",
        })
    }
}

/// A stretch of the production with an energy problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemZone {
    /// Dead zone or overload.
    pub kind: ZoneKind,
    /// The affected episode, if known.
    #[serde(default)]
    pub episode: Option<u32>,
    /// The energy rating that triggered the zone, if known.
    #[serde(default)]
    pub energy: Option<f64>,
    /// How serious the zone is.
    #[serde(default)]
    pub severity: Severity,
    /// Human-readable explanation.
    #[serde(default)]
    pub description: String,
}

/// A recommended pacing fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Priority tier.
    #[serde(default)]
    pub priority: Severity,
    /// The affected episode, if any.
    #[serde(default)]
    pub episode: Option<u32>,
    /// What to do.
    pub action: String,
}

/// Headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    /// Session status at the fixed point.
    pub session_status: SessionStatus,
    /// Distinct episodes analysed.
    pub episodes_analyzed: usize,
    /// Scenes across all episodes.
    pub total_scenes: u64,
    /// Mean scenes per episode, 0.0 with no episodes.
    pub average_scenes: f64,
    /// Stations that succeeded.
    pub stations_succeeded: usize,
    /// Stations in the plan.
    pub stations_total: usize,
    /// Stations that failed terminally.
    pub stations_failed: usize,
    /// Stations skipped because of upstream failures.
    pub stations_skipped: usize,
}

/// An episode and its energy rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedEpisode {
    /// Episode label.
    pub label: String,
    /// Energy rating.
    pub energy: f64,
}

/// Energy statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyAnalysis {
    /// Episodes with an energy rating.
    pub rated_episodes: usize,
    /// Mean energy, 0.0 with no ratings.
    pub average_energy: f64,
    /// Highest-rated episode.
    pub peak: Option<RatedEpisode>,
    /// Lowest-rated episode.
    pub lowest: Option<RatedEpisode>,
    /// Trend across rated episodes in episode order.
    pub trend: EnergyTrend,
}

/// The synthesized report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// The session the report describes.
    pub session_id: SessionId,
    /// Executive summary.
    pub summary: ExecutiveSummary,
    /// Energy analysis.
    pub energy: EnergyAnalysis,
    /// Problem zones, derived ones in episode order followed by declared ones.
    pub problem_zones: Vec<ProblemZone>,
    /// Fixes, highest priority first.
    pub fixes: Vec<Fix>,
    /// Terminal failures, verbatim.
    pub errors: Vec<ErrorRecord>,
}

/// Builds reports from finished sessions.
#[derive(Debug, Clone, Default)]
pub struct ReportSynthesizer {
    thresholds: ReportThresholds,
}

impl ReportSynthesizer {
    /// Creates a synthesizer with the given thresholds.
    #[must_use]
    pub fn new(thresholds: ReportThresholds) -> Self {
        Self { thresholds }
    }

    /// Returns the thresholds.
    #[must_use]
    pub fn thresholds(&self) -> &ReportThresholds {
        &self.thresholds
    }

    /// Reads the session's succeeded outputs from the store and builds the report.
    ///
    /// An output missing from the store is logged and left out.
    ///
    /// # Errors
    ///
    /// Returns any store error other than `NotFound`.
    pub async fn synthesize(
        &self,
        result: &SessionResult,
        store: &dyn StateStore,
    ) -> Result<AnalysisReport, StoreError> {
        let mut payloads = Vec::new();

        for station in result.stations_with_status(RunStatus::Succeeded) {
            match store.get(result.session_id, station).await {
                Ok(payload) => payloads.push((station.to_string(), payload)),
                Err(StoreError::NotFound { .. }) => {
                    warn!(session_id = %result.session_id, station, "Succeeded station has no stored output");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(self.from_payloads(result, &payloads))
    }

    /// Builds the report from already-loaded outputs, given in plan order.
    #[must_use]
    pub fn from_payloads(&self, result: &SessionResult, payloads: &[(String, Payload)]) -> AnalysisReport {
        let episodes = collect_episodes(payloads.iter().map(|(_, payload)| payload));
        debug!(
            session_id = %result.session_id,
            outputs = payloads.len(),
            episodes = episodes.len(),
            "Synthesizing report"
        );

        let summary = summarize(result, &episodes);
        let energy = self.analyze_energy(&episodes);

        let mut problem_zones = self.derive_zones(&episodes);
        problem_zones.extend(declared::<ProblemZone>(payloads, "problem_zones"));

        let mut fixes: Vec<Fix> = problem_zones.iter().map(fix_for).collect();
        fixes.extend(declared::<Fix>(payloads, "recommended_fixes"));
        fixes.sort_by_key(|fix| Reverse(fix.priority));

        AnalysisReport {
            session_id: result.session_id,
            summary,
            energy,
            problem_zones,
            fixes,
            errors: result.errors.clone(),
        }
    }

    fn analyze_energy(&self, episodes: &[EpisodeData]) -> EnergyAnalysis {
        let rated: Vec<(&EpisodeData, f64)> = episodes
            .iter()
            .filter_map(|episode| episode.energy.map(|energy| (episode, energy)))
            .collect();
        let ratings: Vec<f64> = rated.iter().map(|(_, energy)| *energy).collect();

        let rated_episode = |(episode, energy): &(&EpisodeData, f64)| RatedEpisode {
            label: episode.label(),
            energy: *energy,
        };
        // Ties keep the earliest episode.
        let peak = rated
            .iter()
            .fold(None::<&(&EpisodeData, f64)>, |best, candidate| match best {
                Some(best) if best.1 >= candidate.1 => Some(best),
                _ => Some(candidate),
            })
            .map(rated_episode);
        let lowest = rated
            .iter()
            .fold(None::<&(&EpisodeData, f64)>, |best, candidate| match best {
                Some(best) if best.1 <= candidate.1 => Some(best),
                _ => Some(candidate),
            })
            .map(rated_episode);

        EnergyAnalysis {
            rated_episodes: ratings.len(),
            average_energy: average(&ratings),
            peak,
            lowest,
            trend: classify_trend(&ratings, self.thresholds.stable_band),
        }
    }

    fn derive_zones(&self, episodes: &[EpisodeData]) -> Vec<ProblemZone> {
        let t = &self.thresholds;
        episodes
            .iter()
            .filter_map(|episode| {
                let energy = episode.energy?;
                let (kind, distance, description) = if energy < t.dead_zone_energy {
                    (
                        ZoneKind::DeadZone,
                        t.dead_zone_energy - energy,
                        format!(
                            "{} sits at energy {energy:.1}, below the dead-zone threshold of {:.1}",
                            episode.label(),
                            t.dead_zone_energy
                        ),
                    )
                } else if energy > t.overload_energy {
                    (
                        ZoneKind::Overload,
                        energy - t.overload_energy,
                        format!(
                            "{} sits at energy {energy:.1}, above the overload threshold of {:.1}",
                            episode.label(),
                            t.overload_energy
                        ),
                    )
                } else {
                    return None;
                };

                Some(ProblemZone {
                    kind,
                    episode: Some(episode.number),
                    energy: Some(energy),
                    severity: severity_for(distance, t),
                    description,
                })
            })
            .collect()
    }
}

fn summarize(result: &SessionResult, episodes: &[EpisodeData]) -> ExecutiveSummary {
    let total_scenes: u64 = episodes.iter().map(|e| u64::from(e.scene_count)).sum();
    let scene_counts: Vec<f64> = episodes.iter().map(|e| f64::from(e.scene_count)).collect();

    ExecutiveSummary {
        session_status: result.status,
        episodes_analyzed: episodes.len(),
        total_scenes,
        average_scenes: average(&scene_counts),
        stations_succeeded: result.count(RunStatus::Succeeded),
        stations_total: result.plan.len(),
        stations_failed: result.count(RunStatus::Failed),
        stations_skipped: result.count(RunStatus::Skipped),
    }
}

/// Collects well-formed entries of an explicit array from every payload.
fn declared<T: serde::de::DeserializeOwned>(payloads: &[(String, Payload)], key: &str) -> Vec<T> {
    payloads
        .iter()
        .filter_map(|(_, payload)| payload.get(key).and_then(Value::as_array))
        .flatten()
        .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect()
}

fn fix_for(zone: &ProblemZone) -> Fix {
    let target = zone
        .episode
        .map_or_else(|| "the affected stretch".to_string(), |n| format!("episode {n}"));
    let action = match zone.kind {
        ZoneKind::DeadZone => format!(
            "Raise the stakes in {target}: tighten or cut low-energy scenes and bring a conflict beat forward"
        ),
        ZoneKind::Overload => format!(
            "Give {target} room to breathe: add a quieter scene or split the sustained high-intensity run"
        ),
    };

    Fix {
        priority: zone.severity,
        episode: zone.episode,
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StationRun;
    use crate::errors::ProcessingError;
    use crate::store::InMemoryStateStore;
    use crate::testing::{episode, episodes_payload};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn session_result(statuses: &[(&str, RunStatus)], errors: Vec<ErrorRecord>) -> SessionResult {
        let session_id = SessionId::new();
        let runs: BTreeMap<String, StationRun> = statuses
            .iter()
            .map(|(id, status)| {
                let mut run = StationRun::new(session_id, *id);
                run.status = *status;
                ((*id).to_string(), run)
            })
            .collect();
        SessionResult {
            session_id,
            status: SessionStatus::derive(statuses.iter().map(|(_, s)| *s), false),
            plan: statuses.iter().map(|(id, _)| (*id).to_string()).collect(),
            runs,
            errors,
            duration_ms: 1.0,
        }
    }

    #[test]
    fn test_scene_average_one_decimal() {
        let result = session_result(&[("episode_analysis", RunStatus::Succeeded)], Vec::new());
        let payloads = vec![(
            "episode_analysis".to_string(),
            episodes_payload([episode(1, 1, None), episode(2, 2, None), episode(3, 1, None)]),
        )];

        let report = ReportSynthesizer::default().from_payloads(&result, &payloads);
        assert_eq!(report.summary.episodes_analyzed, 3);
        assert_eq!(report.summary.total_scenes, 4);
        assert_eq!(format!("{:.1}", report.summary.average_scenes), "1.3");
    }

    #[test]
    fn test_no_ratings_is_insufficient_data() {
        let result = session_result(&[("a", RunStatus::Failed)], Vec::new());
        let report = ReportSynthesizer::default().from_payloads(&result, &[]);

        assert_eq!(report.energy.trend, EnergyTrend::InsufficientData);
        assert_eq!(report.energy.rated_episodes, 0);
        assert_eq!(report.energy.average_energy, 0.0);
        assert_eq!(report.summary.average_scenes, 0.0);
        assert!(report.energy.peak.is_none());
        assert!(report.problem_zones.is_empty());
        assert!(report.fixes.is_empty());
    }

    #[test]
    fn test_zones_and_fix_priorities() {
        let result = session_result(&[("energy", RunStatus::Succeeded)], Vec::new());
        let payloads = vec![(
            "energy".to_string(),
            episodes_payload([
                episode(1, 3, Some(3.5)),
                episode(2, 3, Some(6.0)),
                episode(3, 3, Some(1.5)),
                episode(4, 3, Some(9.2)),
            ]),
        )];

        let report = ReportSynthesizer::default().from_payloads(&result, &payloads);

        let zones: Vec<(ZoneKind, Option<u32>, Severity)> = report
            .problem_zones
            .iter()
            .map(|z| (z.kind, z.episode, z.severity))
            .collect();
        assert_eq!(
            zones,
            vec![
                (ZoneKind::DeadZone, Some(1), Severity::Low),
                (ZoneKind::DeadZone, Some(3), Severity::High),
                (ZoneKind::Overload, Some(4), Severity::Medium),
            ]
        );

        let fixes: Vec<(Severity, Option<u32>)> =
            report.fixes.iter().map(|f| (f.priority, f.episode)).collect();
        assert_eq!(
            fixes,
            vec![
                (Severity::High, Some(3)),
                (Severity::Medium, Some(4)),
                (Severity::Low, Some(1)),
            ]
        );

        assert_eq!(report.energy.peak.as_ref().map(|p| p.energy), Some(9.2));
        assert_eq!(report.energy.lowest.as_ref().map(|p| p.energy), Some(1.5));
    }

    #[test]
    fn test_declared_zones_and_fixes_are_merged() {
        let result = session_result(&[("pacing", RunStatus::Succeeded)], Vec::new());
        let payloads = vec![(
            "pacing".to_string(),
            json!({
                "problem_zones": [
                    {"kind": "overload", "episode": 2, "severity": "high", "description": "Back-to-back chase scenes"},
                    {"kind": "not-a-kind"}
                ],
                "recommended_fixes": [
                    {"priority": "low", "action": "Trim the cold open"},
                    {"action": "Move the reveal to act two"},
                    {"priority": "high"}
                ]
            }),
        )];

        let report = ReportSynthesizer::default().from_payloads(&result, &payloads);
        assert_eq!(report.problem_zones.len(), 1);
        assert_eq!(report.problem_zones[0].severity, Severity::High);

        let actions: Vec<(Severity, &str)> = report
            .fixes
            .iter()
            .map(|f| (f.priority, f.action.as_str()))
            .collect();
        assert_eq!(actions[0].0, Severity::High);
        assert_eq!(actions[1], (Severity::Medium, "Move the reveal to act two"));
        assert_eq!(actions[2], (Severity::Low, "Trim the cold open"));
        assert_eq!(actions.len(), 3);
    }

    #[test]
    fn test_summary_counts_and_errors() {
        let error = ErrorRecord::new("a", &ProcessingError::failed("boom"), 3);
        let result = session_result(
            &[
                ("a", RunStatus::Failed),
                ("b", RunStatus::Skipped),
                ("c", RunStatus::Skipped),
                ("d", RunStatus::Succeeded),
            ],
            vec![error.clone()],
        );

        let report = ReportSynthesizer::default().from_payloads(&result, &[]);
        assert_eq!(report.summary.session_status, SessionStatus::Partial);
        assert_eq!(report.summary.stations_total, 4);
        assert_eq!(report.summary.stations_succeeded, 1);
        assert_eq!(report.summary.stations_failed, 1);
        assert_eq!(report.summary.stations_skipped, 2);
        assert_eq!(report.errors, vec![error]);
    }

    #[tokio::test]
    async fn test_synthesize_reads_succeeded_outputs_only() {
        let store = InMemoryStateStore::new();
        let result = session_result(
            &[
                ("episodes", RunStatus::Succeeded),
                ("missing", RunStatus::Succeeded),
                ("failed", RunStatus::Failed),
            ],
            Vec::new(),
        );
        store
            .put(result.session_id, "episodes", episodes_payload([episode(1, 2, Some(5.0))]))
            .await
            .unwrap();
        store
            .put(result.session_id, "failed", episodes_payload([episode(9, 9, Some(0.0))]))
            .await
            .unwrap();

        let report = ReportSynthesizer::default()
            .synthesize(&result, &store)
            .await
            .unwrap();
        assert_eq!(report.summary.episodes_analyzed, 1);
        assert_eq!(report.summary.total_scenes, 2);
    }

    #[test]
    fn test_thresholds_deserialize_with_defaults() {
        let thresholds: ReportThresholds = serde_json::from_str(r#"{"dead_zone_energy": 3.0}"#).unwrap();
        assert_eq!(thresholds.dead_zone_energy, 3.0);
        assert_eq!(thresholds.overload_energy, 8.0);
        assert_eq!(thresholds.stable_band, 0.5);
    }
}
