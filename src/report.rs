// 📊 Processing report
// Counts over one pipeline run, for the CLI and for hosts that want a
// quick sanity check before importing.

use crate::pipeline::PipelineOutput;
use crate::record::{AccountType, ClassificationConfidence, EntityCategory, RootType};
use crate::warnings::WarningKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingReport {
    pub total_records: usize,
    pub groups: usize,
    pub roots: usize,
    pub by_root_type: BTreeMap<RootType, usize>,
    pub by_account_type: BTreeMap<AccountType, usize>,
    pub by_confidence: BTreeMap<ClassificationConfidence, usize>,
    /// Records with Standard or Extended applicability per category
    pub entity_applicability: BTreeMap<EntityCategory, usize>,
    /// Accounts per selected template, by template name
    pub template_sizes: BTreeMap<String, usize>,
    pub warnings: BTreeMap<WarningKind, usize>,
    pub fingerprint: String,
}

impl ProcessingReport {
    pub fn build(output: &PipelineOutput) -> serde_json::Result<Self> {
        let mut report = ProcessingReport {
            total_records: output.classifications.len(),
            groups: 0,
            roots: 0,
            by_root_type: BTreeMap::new(),
            by_account_type: BTreeMap::new(),
            by_confidence: BTreeMap::new(),
            entity_applicability: EntityCategory::ALL.into_iter().map(|c| (c, 0)).collect(),
            template_sizes: output
                .templates
                .iter()
                .map(|t| (t.name.clone(), t.len()))
                .collect(),
            warnings: output.warnings.counts(),
            fingerprint: output.classifications.fingerprint()?,
        };

        for item in output.classifications.iter() {
            if item.is_group {
                report.groups += 1;
            }
            if item.is_root() {
                report.roots += 1;
            }
            *report.by_root_type.entry(item.root_type).or_insert(0) += 1;
            *report.by_account_type.entry(item.account_type).or_insert(0) += 1;
            *report.by_confidence.entry(item.classification_confidence).or_insert(0) += 1;

            for category in EntityCategory::ALL {
                if item.record.is_applicable_for(category) {
                    *report.entity_applicability.entry(category).or_insert(0) += 1;
                }
            }
        }

        Ok(report)
    }

    pub fn inferred(&self) -> usize {
        self.by_confidence
            .get(&ClassificationConfidence::Inferred)
            .copied()
            .unwrap_or(0)
    }

    /// One line: totals plus root-type distribution
    pub fn summary(&self) -> String {
        let distribution = self
            .by_root_type
            .iter()
            .map(|(root_type, count)| format!("{} {}", root_type.as_str(), count))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{} records ({} groups, {} inferred): {}",
            self.total_records,
            self.groups,
            self.inferred(),
            distribution
        )
    }
}

impl fmt::Display for ProcessingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📊 Processing Report")?;
        writeln!(f, "   Total records: {}", self.total_records)?;
        writeln!(f, "   Groups: {}  Roots: {}", self.groups, self.roots)?;

        writeln!(f, "   Root type distribution:")?;
        for (root_type, count) in &self.by_root_type {
            writeln!(f, "     {}: {}", root_type.as_str(), count)?;
        }

        writeln!(f, "   Account type distribution:")?;
        for (account_type, count) in &self.by_account_type {
            writeln!(f, "     {}: {}", account_type.as_str(), count)?;
        }

        writeln!(f, "   Entity applicability:")?;
        for (category, count) in &self.entity_applicability {
            writeln!(f, "     {}: {}", category, count)?;
        }

        writeln!(f, "   Templates:")?;
        for (name, size) in &self.template_sizes {
            writeln!(f, "     {}: {} accounts", name, size)?;
        }

        writeln!(f, "   Inferred classifications: {}", self.inferred())?;
        writeln!(f, "   Warnings: {}", self.warnings.values().sum::<usize>())?;
        write!(f, "   Fingerprint: {}", self.fingerprint)
    }
}
