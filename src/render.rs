//! Colored terminal rendering for plans and reports.

use ha365_core::cycle::CycleReport;
use ha365_core::event::format_time_range;
use ha365_core::marker::Prefixes;
use ha365_core::reconcile::{
    OperationKind, OperationPlan, PlannedOperation, SyncReport, changed_fields,
};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for OperationKind {
    fn render(&self) -> String {
        let symbol = self.symbol();
        match self {
            OperationKind::Create => symbol.green().to_string(),
            OperationKind::Update => symbol.yellow().to_string(),
            OperationKind::Delete => symbol.red().to_string(),
        }
    }
}

fn colorize(kind: OperationKind, text: &str) -> String {
    match kind {
        OperationKind::Create => text.green().to_string(),
        OperationKind::Update => text.yellow().to_string(),
        OperationKind::Delete => text.red().to_string(),
    }
}

impl Render for PlannedOperation<'_> {
    fn render(&self) -> String {
        let kind = self.kind();
        let time = format_time_range(self.start(), self.end());

        format!(
            "{} {} {}",
            kind.render(),
            colorize(kind, self.label()),
            time.dimmed()
        )
    }
}

impl Render for SyncReport {
    fn render(&self) -> String {
        let mut line = format!(
            "{} created, {} updated, {} deleted",
            self.created.green(),
            self.updated.yellow(),
            self.deleted.red()
        );
        if !self.is_clean() {
            line.push_str(&format!(", {}", format!("{} failed", self.failed()).red().bold()));
        }

        let mut lines = vec![line];
        for failure in &self.failures {
            lines.push(format!("   {} {}", "✗".red(), failure.to_string().dimmed()));
        }
        lines.join("\n")
    }
}

impl Render for CycleReport {
    fn render(&self) -> String {
        let mut out = self.sync.render();
        if !self.skipped.is_empty() {
            out.push_str(&format!(
                "\n{}",
                format!("{} invalid {} skipped", self.skipped.len(), pluralize(self.skipped.len())).yellow()
            ));
        }
        out
    }
}

/// Above this many operations, show counts instead of events unless verbose.
const COMPACT_THRESHOLD: usize = 5;

fn pluralize(count: usize) -> &'static str {
    if count == 1 { "event" } else { "events" }
}

pub trait PlanRender {
    fn render(&self, prefixes: &Prefixes, verbose: bool) -> String;
}

impl PlanRender for OperationPlan {
    fn render(&self, prefixes: &Prefixes, verbose: bool) -> String {
        if self.is_empty() {
            return "   Everything up to date".dimmed().to_string();
        }

        let mut lines = Vec::new();

        if verbose || self.len() <= COMPACT_THRESHOLD {
            for operation in self.operations() {
                lines.push(format!("   {}", operation.render()));

                if let PlannedOperation::Update { existing, source } = operation {
                    let prefix = prefixes.for_calendar(&source.source_calendar);
                    for change in changed_fields(existing, source, prefix) {
                        lines.push(format!(
                            "      {}: {} → {}",
                            change.field.dimmed(),
                            change.old.red(),
                            change.new.green()
                        ));
                    }
                }
            }
        } else {
            let (creates, updates, deletes) = self.counts();
            let summaries = [
                (OperationKind::Create, creates, "new"),
                (OperationKind::Update, updates, "changed"),
                (OperationKind::Delete, deletes, "removed"),
            ];
            for (kind, count, adjective) in summaries {
                if count > 0 {
                    let label = format!("({count} {adjective} {})", pluralize(count));
                    lines.push(format!("   {} {}", kind.render(), colorize(kind, &label)));
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ha365_core::{SourceEvent, SyncedEvent};

    fn source(uid: &str, summary: &str) -> SourceEvent {
        SourceEvent {
            uid: uid.to_string(),
            summary: summary.to_string(),
            description: String::new(),
            location: String::new(),
            start: Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
            all_day: false,
            source_calendar: "calendar.family".to_string(),
        }
    }

    fn strip(text: &str) -> String {
        let mut out = String::new();
        let mut in_escape = false;
        for c in text.chars() {
            match (in_escape, c) {
                (false, '\u{1b}') => in_escape = true,
                (true, 'm') => in_escape = false,
                (true, _) => {}
                (false, c) => out.push(c),
            }
        }
        out
    }

    #[test]
    fn test_update_shows_changed_fields() {
        let new = source("a", "Dentist (moved)");
        let existing = SyncedEvent {
            destination_id: "x".to_string(),
            uid: "a".to_string(),
            title: "[HA] Dentist".to_string(),
            description: String::new(),
            location: String::new(),
            start: new.start,
            end: new.end,
        };
        let plan = OperationPlan {
            to_update: vec![(existing, new)],
            ..OperationPlan::default()
        };

        let out = strip(&plan.render(&Prefixes::new("[HA]"), false));
        assert!(out.contains("~ Dentist (moved) 2024-06-03 09:00 - 10:00"));
        assert!(out.contains("summary: [HA] Dentist → [HA] Dentist (moved)"));
    }

    #[test]
    fn test_large_plans_are_compacted() {
        let plan = OperationPlan {
            to_create: (0..6).map(|i| source(&i.to_string(), "Event")).collect(),
            ..OperationPlan::default()
        };

        let out = strip(&plan.render(&Prefixes::new("[HA]"), false));
        assert_eq!(out, "   + (6 new events)");

        let verbose = strip(&plan.render(&Prefixes::new("[HA]"), true));
        assert_eq!(verbose.lines().count(), 6);
    }

    #[test]
    fn test_report_lists_failures() {
        use ha365_core::error::{DestinationError, DestinationOperation};

        let report = SyncReport {
            created: 1,
            failures: vec![DestinationError::new(DestinationOperation::Delete, "x", "500")],
            ..SyncReport::default()
        };

        let out = strip(&report.render());
        assert!(out.starts_with("1 created, 0 updated, 0 deleted, 1 failed"));
        assert!(out.contains("delete failed for 'x': 500"));
    }
}
