// RGS MKB Classification Engine - Core Library
// Reference codes in, ERPNext-ready chart of accounts out.
// Exposes all modules for use in the CLI and in tests.

pub mod error;      // Fatal load errors
pub mod warnings;   // Recoverable conditions, grouped by kind
pub mod record;     // Canonical data model + closed vocabularies
pub mod rules;      // Classification rules as data
pub mod config;     // Engine configuration (root letters, vocabularies, tables)
pub mod parser;     // Source adapters (canonical JSON, field-spec CSV, concept CSV)
pub mod loader;     // Reconciliation into one ReferenceDataset
pub mod hierarchy;  // Parent derivation from the code string
pub mod classify;   // Root/account/report type + normal balance
pub mod template;   // Entity and ad hoc subsets with ancestor closure
pub mod pipeline;   // Explicit run context: loader → resolver → engine → selector
pub mod coa;        // ERPNext chart-of-accounts JSON
pub mod report;     // Processing report

// Re-export commonly used types
pub use error::{LoadError, LoadResult};
pub use warnings::{PipelineWarning, WarningKind, Warnings};
pub use record::{
    AccountType, Applicability, ClassificationConfidence, ConceptMapping, EntityCategory,
    EntityFlags, NormalBalance, RecordStatus, ReferenceRecord, ReportType,
    ResolvedClassification, RootType,
};
pub use rules::{AccountTypeRule, ConceptKeywordRule, ConceptMarker, MatchField, RootTypeRule};
pub use config::EngineConfig;
pub use parser::{
    SourceAdapter, FileValidator, SourceBatch, SourceKind, RawRecord, RawConcept,
    detect_source, get_adapter, get_validator,
    CanonicalJsonAdapter, FieldSpecAdapter, ConceptTableAdapter,
};
pub use loader::{ReferenceDataset, ReferenceLoader};
pub use hierarchy::{derive_parent_code, Hierarchy};
pub use classify::{ClassificationEngine, ClassificationSet, RootTypeDecision};
pub use template::{TemplateRequest, TemplateSelection, TemplateSelector};
pub use pipeline::{read_detected, read_source, Pipeline, PipelineOutput};
pub use coa::{build_chart, build_chart_with, ChartOptions};
pub use report::ProcessingReport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
