// ⚠️ Warnings - recoverable conditions collected during a pipeline run
//
// Nothing recoverable is swallowed: every fallback, orphan or unknown value
// becomes a PipelineWarning that travels back to the caller next to the
// result. Warnings are grouped by kind so a front end can say
// "3 orphaned nodes found" instead of dumping a log.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// WARNING KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// Numeric field could not be parsed; a documented default was used
    UnparsableField,
    /// Field absent from every source; a documented default was used
    MissingField,
    /// Raw value outside a closed vocabulary (status, applicability)
    UnknownVocabulary,
    /// Row dropped before it became a record (e.g. empty code)
    SkippedRow,
    /// Field-specification row for a code the canonical list lacks
    UnknownSpecCode,
    /// Concept row for a code the canonical list lacks
    UnknownConceptCode,
    /// Field-specification value disagrees with the canonical value
    FieldConflict,
    /// Derived parent code is not in the dataset
    OrphanedNode,
    /// Code does not follow the 1 + 3n character layout
    MalformedCode,
    /// Level-5 record that other records name as parent
    LeafWithChildren,
    /// Group record without any children
    EmptyGroup,
    /// Ancestor pulled into a template only to keep it a tree
    ForcedAncestor,
    /// Template include/exclude override naming a code that does not exist
    UnknownOverrideCode,
}

impl WarningKind {
    /// Noun phrase used when summarizing a group of warnings
    fn describe(&self, count: usize) -> String {
        let plural = count != 1;
        let text = match self {
            WarningKind::UnparsableField => {
                if plural { "unparsable fields" } else { "unparsable field" }
            }
            WarningKind::MissingField => if plural { "missing fields" } else { "missing field" },
            WarningKind::UnknownVocabulary => {
                if plural { "unknown vocabulary values" } else { "unknown vocabulary value" }
            }
            WarningKind::SkippedRow => if plural { "rows skipped" } else { "row skipped" },
            WarningKind::UnknownSpecCode => {
                if plural { "field-spec rows for unknown codes" } else { "field-spec row for an unknown code" }
            }
            WarningKind::UnknownConceptCode => {
                if plural { "concept rows for unknown codes" } else { "concept row for an unknown code" }
            }
            WarningKind::FieldConflict => if plural { "field conflicts" } else { "field conflict" },
            WarningKind::OrphanedNode => {
                if plural { "orphaned nodes found" } else { "orphaned node found" }
            }
            WarningKind::MalformedCode => if plural { "malformed codes" } else { "malformed code" },
            WarningKind::LeafWithChildren => {
                if plural { "leaf records with children" } else { "leaf record with children" }
            }
            WarningKind::EmptyGroup => {
                if plural { "groups without children" } else { "group without children" }
            }
            WarningKind::ForcedAncestor => {
                if plural { "ancestors added to close a template" } else { "ancestor added to close a template" }
            }
            WarningKind::UnknownOverrideCode => {
                if plural { "template overrides for unknown codes" } else { "template override for an unknown code" }
            }
        };
        format!("{} {}", count, text)
    }
}

// ============================================================================
// PIPELINE WARNING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineWarning {
    pub kind: WarningKind,
    /// Hierarchical code the warning is about, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Canonical field name, when the warning is about one field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl PipelineWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        PipelineWarning {
            kind,
            code: None,
            field: None,
            message: message.into(),
        }
    }

    /// Builder: attach the code this warning is about
    pub fn for_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Builder: attach the field this warning is about
    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

// ============================================================================
// WARNINGS COLLECTION
// ============================================================================

/// Ordered list of warnings for one pipeline run.
///
/// Owned by the run, never shared, so concurrent runs cannot see each
/// other's warnings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Warnings {
    items: Vec<PipelineWarning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and mirror it to the log
    pub fn push(&mut self, warning: PipelineWarning) {
        tracing::warn!(
            kind = ?warning.kind,
            code = warning.code.as_deref().unwrap_or(""),
            "{}",
            warning.message
        );
        self.items.push(warning);
    }

    pub fn extend(&mut self, other: Warnings) {
        self.items.extend(other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipelineWarning> {
        self.items.iter()
    }

    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &PipelineWarning> {
        self.items.iter().filter(move |w| w.kind == kind)
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Warning counts grouped by kind
    pub fn counts(&self) -> BTreeMap<WarningKind, usize> {
        let mut counts = BTreeMap::new();
        for warning in &self.items {
            *counts.entry(warning.kind).or_insert(0) += 1;
        }
        counts
    }

    /// One sentence per kind, joined with "; "
    pub fn summary(&self) -> String {
        if self.items.is_empty() {
            return "no warnings".to_string();
        }

        self.counts()
            .iter()
            .map(|(kind, count)| kind.describe(*count))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl IntoIterator for Warnings {
    type Item = PipelineWarning;
    type IntoIter = std::vec::IntoIter<PipelineWarning>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

// ============================================================================
// TESTS
// ============================================================================
