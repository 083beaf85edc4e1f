use std::fmt;

use chrono::{DateTime, Local};

/// Why an entity was not persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingId,
    Enrichment(String),
    RenderExhausted { attempts: u32, last_error: String },
    Persist(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingId => f.write_str("missing id"),
            SkipReason::Enrichment(r) => write!(f, "skipped by enrichment: {}", r),
            SkipReason::RenderExhausted { attempts, last_error } => {
                write!(f, "render failed after {} attempts: {}", attempts, last_error)
            }
            SkipReason::Persist(e) => write!(f, "persist failed: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedEntity {
    pub category: String,
    pub index: usize,
    pub id: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CategoryOutcome {
    Completed,
    Aborted(String),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub category: String,
    pub outcome: CategoryOutcome,
    pub total: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub retries: usize,
    pub snapshots: usize,
    pub snapshot_failures: usize,
}

impl CategoryReport {
    pub fn new(category: &str) -> Self {
        CategoryReport {
            category: category.to_string(),
            outcome: CategoryOutcome::Completed,
            total: 0,
            persisted: 0,
            skipped: 0,
            retries: 0,
            snapshots: 0,
            snapshot_failures: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub categories: Vec<CategoryReport>,
    pub skipped: Vec<SkippedEntity>,
    pub cancelled: bool,
}

impl Default for RunReport {
    fn default() -> Self {
        RunReport {
            started_at: Local::now(),
            finished_at: None,
            categories: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
        }
    }
}

impl RunReport {
    pub fn category(&self, name: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == name)
    }

    pub fn is_clean(&self) -> bool {
        self.categories
            .iter()
            .all(|c| !matches!(c.outcome, CategoryOutcome::Aborted(_)))
    }

    pub fn persisted(&self) -> usize {
        self.categories.iter().map(|c| c.persisted).sum()
    }

    pub fn lines(&self) -> Vec<String> {
        let mut out = vec![format!(
            "{:<8} | {:<10} | {:>6} | {:>9} | {:>7} | {:>7} | {:>9}",
            "Category", "Outcome", "Total", "Persisted", "Skipped", "Retries", "Snapshots"
        )];
        out.push("-".repeat(74));
        for c in &self.categories {
            let outcome = match &c.outcome {
                CategoryOutcome::Completed => "done",
                CategoryOutcome::Aborted(_) => "ABORTED",
                CategoryOutcome::Cancelled => "cancelled",
            };
            out.push(format!(
                "{:<8} | {:<10} | {:>6} | {:>9} | {:>7} | {:>7} | {:>9}",
                c.category, outcome, c.total, c.persisted, c.skipped, c.retries, c.snapshots
            ));
        }
        for c in &self.categories {
            if let CategoryOutcome::Aborted(why) = &c.outcome {
                out.push(format!("  {} aborted: {}", c.category, why));
            }
        }
        if !self.skipped.is_empty() {
            out.push(String::new());
            out.push("--- Skipped ---".to_string());
            for s in &self.skipped {
                out.push(format!(
                    "  [{}] #{} (id {}): {}",
                    s.category,
                    s.index,
                    s.id.as_deref().unwrap_or("?"),
                    s.reason
                ));
            }
        }
        out
    }

    pub fn print(&self) {
        for line in self.lines() {
            println!("{}", line);
        }
        if self.cancelled {
            println!("\nRun cancelled before completion.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_aborts_and_skips() {
        let mut report = RunReport::default();
        let mut spell = CategoryReport::new("spell");
        spell.total = 3;
        spell.persisted = 2;
        spell.skipped = 1;
        report.categories.push(spell);
        let mut site = CategoryReport::new("site");
        site.outcome = CategoryOutcome::Aborted("data never became ready".into());
        report.categories.push(site);
        report.skipped.push(SkippedEntity {
            category: "spell".into(),
            index: 1,
            id: Some("40".into()),
            reason: SkipReason::Enrichment("invalid school".into()),
        });

        let lines = report.lines();
        assert!(lines.iter().any(|l| l.starts_with("spell") && l.contains("done")));
        assert!(lines.iter().any(|l| l.contains("site aborted: data never became ready")));
        assert!(lines
            .iter()
            .any(|l| l == "  [spell] #1 (id 40): skipped by enrichment: invalid school"));
        assert!(!report.is_clean());
        assert_eq!(report.persisted(), 2);
    }

    #[test]
    fn render_exhaustion_reason_reads_well() {
        let r = SkipReason::RenderExhausted { attempts: 2, last_error: "render timed out".into() };
        assert_eq!(r.to_string(), "render failed after 2 attempts: render timed out");
    }
}
