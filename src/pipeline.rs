// 🔁 Pipeline
// Loader → Hierarchy → Classification → Templates, threaded through one
// explicit context. A run owns its warnings and shares no mutable state,
// so concurrent runs are independent.

use crate::classify::{ClassificationEngine, ClassificationSet};
use crate::config::EngineConfig;
use crate::error::LoadResult;
use crate::hierarchy::Hierarchy;
use crate::loader::{ReferenceDataset, ReferenceLoader};
use crate::parser::{detect_source, get_adapter, SourceBatch, SourceKind};
use crate::record::EntityCategory;
use crate::template::{TemplateRequest, TemplateSelection, TemplateSelector};
use crate::warnings::Warnings;
use serde::Serialize;
use std::path::Path;

// ============================================================================
// OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub classifications: ClassificationSet,
    /// One template per entity category, in category order
    pub templates: Vec<TemplateSelection>,
    pub warnings: Warnings,
}

impl PipelineOutput {
    pub fn template(&self, category: EntityCategory) -> Option<&TemplateSelection> {
        self.templates.iter().find(|t| t.category == Some(category))
    }

    /// e.g. "1598 records classified; 14 used inferred classification; 3 orphaned nodes found"
    pub fn summary(&self) -> String {
        format!(
            "{} records classified; {} used inferred classification; {}",
            self.classifications.len(),
            self.classifications.inferred_count(),
            self.warnings.summary()
        )
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: EngineConfig,
}

impl Pipeline {
    pub fn new(config: EngineConfig) -> Self {
        Pipeline { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reconcile source batches and run every stage.
    /// Only a duplicate canonical code aborts.
    pub fn run(&self, batches: &[SourceBatch]) -> LoadResult<PipelineOutput> {
        let mut warnings = Warnings::new();
        let dataset = ReferenceLoader::new(&self.config).load(batches, &mut warnings)?;
        Ok(self.finish(&dataset, warnings))
    }

    /// Run every stage on an already loaded dataset
    pub fn run_dataset(&self, dataset: &ReferenceDataset) -> PipelineOutput {
        self.finish(dataset, Warnings::new())
    }

    /// Read files (kind detected from the file name) and run
    pub fn run_files<P: AsRef<Path>>(&self, paths: &[P]) -> LoadResult<PipelineOutput> {
        let batches = paths
            .iter()
            .map(|path| read_detected(path.as_ref()))
            .collect::<LoadResult<Vec<_>>>()?;
        self.run(&batches)
    }

    /// Resolution and classification only
    pub fn classify_dataset(&self, dataset: &ReferenceDataset) -> (ClassificationSet, Warnings) {
        let mut warnings = Warnings::new();
        let classifications = self.classify_into(dataset, &mut warnings);
        (classifications, warnings)
    }

    /// Ad hoc template over an existing classification set
    pub fn select(&self, classifications: &ClassificationSet, request: &TemplateRequest) -> (TemplateSelection, Warnings) {
        let mut warnings = Warnings::new();
        let selection = TemplateSelector::new(classifications).select(request, &mut warnings);
        (selection, warnings)
    }

    fn classify_into(&self, dataset: &ReferenceDataset, warnings: &mut Warnings) -> ClassificationSet {
        let hierarchy = Hierarchy::resolve(dataset, warnings);
        ClassificationEngine::new(&self.config).classify_all(dataset, &hierarchy)
    }

    fn finish(&self, dataset: &ReferenceDataset, mut warnings: Warnings) -> PipelineOutput {
        let classifications = self.classify_into(dataset, &mut warnings);
        let templates = TemplateSelector::new(&classifications).entity_templates(&mut warnings);

        let output = PipelineOutput {
            classifications,
            templates,
            warnings,
        };
        tracing::info!("{}", output.summary());
        output
    }
}

// ============================================================================
// FILE HELPERS
// ============================================================================

/// Parse one file with the adapter for `kind`
pub fn read_source(kind: SourceKind, path: &Path) -> LoadResult<SourceBatch> {
    let adapter = get_adapter(kind);
    tracing::info!(path = %path.display(), source = kind.name(), version = adapter.version(), "reading source");
    adapter.parse(path)
}

/// Parse one file, picking the adapter from its name
pub fn read_detected(path: &Path) -> LoadResult<SourceBatch> {
    read_source(detect_source(path)?, path)
}

// ============================================================================
// TESTS
// ============================================================================
