//! Markdown rendering.

use super::{AnalysisReport, RatedEpisode, SECTION_HEADINGS};
use std::fmt::{self, Write};

const EMPTY_SECTION: &str = "_None._";

impl AnalysisReport {
    /// Renders the report as Markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        self.to_string()
    }

    fn write_summary(&self, out: &mut impl Write) -> fmt::Result {
        let s = &self.summary;
        writeln!(out, "- Session: {}", self.session_id)?;
        writeln!(out, "- Status: {}", s.session_status)?;
        writeln!(out, "- Episodes analyzed: {}", s.episodes_analyzed)?;
        writeln!(out, "- Total scenes: {}", s.total_scenes)?;
        writeln!(out, "- Average scenes per episode: {:.1}", s.average_scenes)?;
        writeln!(
            out,
            "- Stations succeeded: {} of {}",
            s.stations_succeeded, s.stations_total
        )?;
        writeln!(out, "- Stations failed: {}", s.stations_failed)?;
        writeln!(out, "- Stations skipped: {}", s.stations_skipped)
    }

    fn write_energy(&self, out: &mut impl Write) -> fmt::Result {
        let e = &self.energy;
        writeln!(out, "- Rated episodes: {}", e.rated_episodes)?;
        writeln!(out, "- Average energy: {:.1}", e.average_energy)?;
        if let Some(RatedEpisode { label, energy }) = &e.peak {
            writeln!(out, "- Peak: {label} ({energy:.1})")?;
        }
        if let Some(RatedEpisode { label, energy }) = &e.lowest {
            writeln!(out, "- Lowest: {label} ({energy:.1})")?;
        }
        writeln!(out, "- Trend: {}", e.trend)
    }

    fn write_zones(&self, out: &mut impl Write) -> fmt::Result {
        if self.problem_zones.is_empty() {
            return writeln!(out, "{EMPTY_SECTION}");
        }
        for zone in &self.problem_zones {
            write!(out, "- [{}] {}", zone.severity, zone.kind)?;
            if let Some(episode) = zone.episode {
                write!(out, " in episode {episode}")?;
            }
            if let Some(energy) = zone.energy {
                write!(out, " (energy {energy:.1})")?;
            }
            if zone.description.is_empty() {
                writeln!(out)?;
            } else {
                writeln!(out, ": {}", zone.description)?;
            }
        }
        Ok(())
    }

    fn write_fixes(&self, out: &mut impl Write) -> fmt::Result {
        if self.fixes.is_empty() {
            return writeln!(out, "{EMPTY_SECTION}");
        }
        for (rank, fix) in self.fixes.iter().enumerate() {
            writeln!(out, "{}. [{}] {}", rank + 1, fix.priority, fix.action)?;
        }
        Ok(())
    }

    fn write_errors(&self, out: &mut impl Write) -> fmt::Result {
        if self.errors.is_empty() {
            return writeln!(out, "{EMPTY_SECTION}");
        }
        for record in &self.errors {
            writeln!(out, "- {record}")?;
        }
        Ok(())
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Audio Drama Analysis Report")?;

        for (index, heading) in SECTION_HEADINGS.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "## {heading}")?;
            writeln!(f)?;
            match index {
                0 => self.write_summary(f)?,
                1 => self.write_energy(f)?,
                2 => self.write_zones(f)?,
                3 => self.write_fixes(f)?,
                _ => self.write_errors(f)?,
            }
        }
        Ok(())
    }
}
