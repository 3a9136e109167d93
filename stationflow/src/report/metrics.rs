//! Episode extraction and the numeric rules behind the report.

use super::{EnergyTrend, ReportThresholds, Severity};
use crate::core::Payload;
use serde_json::Value;
use std::collections::BTreeMap;

/// One analysed episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeData {
    /// Episode number.
    pub number: u32,
    /// Episode title, if given.
    pub title: Option<String>,
    /// Number of scenes.
    pub scene_count: u32,
    /// Energy rating on a 0-10 scale, if rated.
    pub energy: Option<f64>,
}

impl EpisodeData {
    fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let number = entry.get("number").and_then(count_value)?;
        let scene_count = entry.get("scene_count").and_then(count_value).unwrap_or(0);
        let energy = entry
            .get("energy")
            .and_then(Value::as_f64)
            .filter(|energy| energy.is_finite());
        let title = entry.get("title").and_then(Value::as_str).map(str::to_string);

        Some(Self {
            number,
            title,
            scene_count,
            energy,
        })
    }

    /// Returns "Episode N" or "Episode N (title)".
    #[must_use]
    pub fn label(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() && *title != format!("Episode {}", self.number) => {
                format!("Episode {} ({title})", self.number)
            }
            _ => format!("Episode {}", self.number),
        }
    }
}

/// Reads a non-negative whole number, accepting integral floats such as `2.0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count_value(value: &Value) -> Option<u32> {
    if let Some(count) = value.as_u64() {
        return u32::try_from(count).ok();
    }
    value
        .as_f64()
        .filter(|count| count.fract() == 0.0 && *count >= 0.0 && *count <= f64::from(u32::MAX))
        .map(|count| count as u32)
}

/// Collects episodes from every payload's `episodes` array.
///
/// The first occurrence of an episode number wins; entries without a usable
/// number are ignored and an unreadable scene count counts as zero. The result is ordered by episode number.
pub fn collect_episodes<'a>(payloads: impl IntoIterator<Item = &'a Payload>) -> Vec<EpisodeData> {
    let mut episodes: BTreeMap<u32, EpisodeData> = BTreeMap::new();

    for payload in payloads {
        let Some(entries) = payload.get("episodes").and_then(Value::as_array) else {
            continue;
        };
        for episode in entries.iter().filter_map(EpisodeData::from_value) {
            episodes.entry(episode.number).or_insert(episode);
        }
    }

    episodes.into_values().collect()
}

/// Arithmetic mean, or 0.0 for no values.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Classifies successive ratings.
///
/// Deltas within `stable_band` count as neither rise nor fall.
#[must_use]
pub fn classify_trend(ratings: &[f64], stable_band: f64) -> EnergyTrend {
    if ratings.len() < 2 {
        return EnergyTrend::InsufficientData;
    }

    let (rises, falls) = ratings
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0usize, 0usize), |(rises, falls), delta| {
            if delta > stable_band {
                (rises + 1, falls)
            } else if delta < -stable_band {
                (rises, falls + 1)
            } else {
                (rises, falls)
            }
        });

    match rises.cmp(&falls) {
        std::cmp::Ordering::Greater => EnergyTrend::Rising,
        std::cmp::Ordering::Less => EnergyTrend::Falling,
        std::cmp::Ordering::Equal => EnergyTrend::Stable,
    }
}

/// Severity of a zone by how far its energy lies past the threshold.
#[must_use]
pub fn severity_for(distance: f64, thresholds: &ReportThresholds) -> Severity {
    if distance >= thresholds.high_severity_distance {
        Severity::High
    } else if distance >= thresholds.medium_severity_distance {
        Severity::Medium
    } else {
        Severity::Low
    }
}
