// 📥 Reference Loader
// Reconciles the three source batches into one ReferenceDataset.
//
// Order of work, independent of the order batches are passed in:
//   1. canonical rows → raw records keyed by code (duplicate code = fatal)
//   2. field-spec rows fill the gaps the canonical rows left
//   3. raw records are normalized (safe parsing, warnings on every fallback)
//   4. concept rows are attached to known codes

use crate::config::EngineConfig;
use crate::error::{LoadError, LoadResult};
use crate::parser::{RawRecord, SourceBatch, SourceKind};
use crate::record::{
    pad_stable_number, Applicability, ConceptMapping, EntityCategory, EntityFlags, RecordStatus,
    ReferenceRecord,
};
use crate::warnings::{PipelineWarning, WarningKind, Warnings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Level assumed when `level` is missing or unparsable (leaf)
pub const DEFAULT_LEVEL: u8 = 5;

/// Deepest level of the reference hierarchy
pub const MAX_LEVEL: u8 = 5;

// ============================================================================
// REFERENCE DATASET
// ============================================================================

/// Normalized input of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDataset {
    pub records: BTreeMap<String, ReferenceRecord>,
    pub concepts: BTreeMap<String, Vec<ConceptMapping>>,
}

impl ReferenceDataset {
    /// Build a dataset from records that are already normalized.
    /// Duplicate codes are rejected the same way the loader rejects them.
    pub fn from_records(
        records: Vec<ReferenceRecord>,
        concepts: Vec<ConceptMapping>,
    ) -> LoadResult<Self> {
        let mut dataset = ReferenceDataset::default();
        let mut rows: BTreeMap<String, usize> = BTreeMap::new();

        for (idx, record) in records.into_iter().enumerate() {
            if let Some(first) = rows.get(&record.code) {
                return Err(LoadError::DuplicateCode {
                    code: record.code,
                    first: *first,
                    second: idx + 1,
                });
            }
            rows.insert(record.code.clone(), idx + 1);
            dataset.records.insert(record.code.clone(), record);
        }

        for concept in concepts {
            dataset.concepts.entry(concept.code.clone()).or_default().push(concept);
        }

        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&ReferenceRecord> {
        self.records.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.records.contains_key(code)
    }

    pub fn concepts_for(&self, code: &str) -> &[ConceptMapping] {
        self.concepts.get(code).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ============================================================================
// REFERENCE LOADER
// ============================================================================

pub struct ReferenceLoader<'a> {
    config: &'a EngineConfig,
}

impl<'a> ReferenceLoader<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        ReferenceLoader { config }
    }

    /// Reconcile source batches into a dataset.
    ///
    /// Fails only on a duplicate canonical code; everything else is
    /// recorded in `warnings`.
    pub fn load(&self, batches: &[SourceBatch], warnings: &mut Warnings) -> LoadResult<ReferenceDataset> {
        let mut raw = self.collect_canonical(batches, warnings)?;

        for batch in batches.iter().filter(|b| b.kind == SourceKind::FieldSpecification) {
            self.merge_field_spec(&mut raw, batch, warnings);
        }

        let mut dataset = ReferenceDataset::default();
        for (code, raw_record) in raw {
            let record = self.normalize(raw_record, warnings);
            dataset.records.insert(code, record);
        }

        for batch in batches.iter().filter(|b| b.kind == SourceKind::ConceptTable) {
            self.attach_concepts(&mut dataset, batch, warnings);
        }

        tracing::info!(
            records = dataset.records.len(),
            concept_codes = dataset.concepts.len(),
            "loaded reference dataset"
        );

        Ok(dataset)
    }

    fn collect_canonical(
        &self,
        batches: &[SourceBatch],
        warnings: &mut Warnings,
    ) -> LoadResult<BTreeMap<String, RawRecord>> {
        let mut raw: BTreeMap<String, RawRecord> = BTreeMap::new();

        for batch in batches.iter().filter(|b| b.kind == SourceKind::Canonical) {
            for record in &batch.records {
                let code = record.code.trim();
                if code.is_empty() {
                    warnings.push(PipelineWarning::new(
                        WarningKind::SkippedRow,
                        format!("row {} in {} has no code", record.row, batch.source_name),
                    ));
                    continue;
                }

                if let Some(existing) = raw.get(code) {
                    return Err(LoadError::DuplicateCode {
                        code: code.to_string(),
                        first: existing.row,
                        second: record.row,
                    });
                }

                let mut record = record.clone();
                record.code = code.to_string();
                raw.insert(record.code.clone(), record);
            }
        }

        Ok(raw)
    }

    fn merge_field_spec(
        &self,
        raw: &mut BTreeMap<String, RawRecord>,
        batch: &SourceBatch,
        warnings: &mut Warnings,
    ) {
        for spec in &batch.records {
            let code = spec.code.trim();
            if code.is_empty() {
                warnings.push(PipelineWarning::new(
                    WarningKind::SkippedRow,
                    format!("row {} in {} has no code", spec.row, batch.source_name),
                ));
                continue;
            }

            let Some(target) = raw.get_mut(code) else {
                warnings.push(
                    PipelineWarning::new(
                        WarningKind::UnknownSpecCode,
                        format!("{} row {} describes unknown code {}", batch.source_name, spec.row, code),
                    )
                    .for_code(code),
                );
                continue;
            };

            let fields = [
                ("stable_number", &mut target.stable_number, &spec.stable_number, true),
                ("short_label", &mut target.short_label, &spec.short_label, false),
                ("long_label", &mut target.long_label, &spec.long_label, false),
                ("english_label", &mut target.english_label, &spec.english_label, false),
                ("polarity", &mut target.polarity, &spec.polarity, false),
                ("level", &mut target.level, &spec.level, true),
                ("sort_key", &mut target.sort_key, &spec.sort_key, false),
                ("contra_reference", &mut target.contra_reference, &spec.contra_reference, false),
                ("status", &mut target.status, &spec.status, false),
            ];

            for (field, slot, value, numeric) in fields {
                merge_field(code, field, slot, value, numeric, warnings);
            }
        }
    }

    fn normalize(&self, raw: RawRecord, warnings: &mut Warnings) -> ReferenceRecord {
        let code = raw.code.clone();

        let short_label = match (raw.short_label.clone(), raw.long_label.clone()) {
            (Some(label), _) => label,
            (None, fallback) => {
                let (label, detail) = match fallback {
                    Some(long_label) => (long_label, "using the long label"),
                    None => (code.clone(), "using the code"),
                };
                warnings.push(
                    PipelineWarning::new(WarningKind::MissingField, format!("{} has no short label; {}", code, detail))
                        .for_code(&code)
                        .on_field("short_label"),
                );
                label
            }
        };

        let mut entity_flags = EntityFlags::default();
        for category in EntityCategory::ALL {
            let value = match category {
                EntityCategory::Zzp => &raw.zzp,
                EntityCategory::Ez => &raw.ez,
                EntityCategory::Bv => &raw.bv,
                EntityCategory::Svc => &raw.svc,
            };
            entity_flags.set(category, self.parse_applicability(&code, category, value, warnings));
        }

        ReferenceRecord {
            stable_number: pad_stable_number(raw.stable_number.as_deref().unwrap_or("")),
            short_label,
            long_label: raw.long_label,
            english_label: raw.english_label,
            polarity_raw: raw.polarity.unwrap_or_default(),
            level: parse_level(&code, raw.level.as_deref(), warnings),
            sort_key: raw.sort_key.unwrap_or_default(),
            contra_reference: raw.contra_reference,
            external_reference: raw.external_reference,
            status: self.parse_status(&code, raw.status.as_deref(), warnings),
            entity_flags,
            extended_flag: self.parse_extended(&code, raw.extended.as_deref(), warnings),
            industry_code: parse_industry_code(&code, raw.industry_code.as_deref(), warnings),
            code,
        }
    }

    fn parse_status(&self, code: &str, raw: Option<&str>, warnings: &mut Warnings) -> RecordStatus {
        let Some(raw) = raw else {
            warnings.push(
                PipelineWarning::new(WarningKind::MissingField, format!("{} has no status; assuming Active", code))
                    .for_code(code)
                    .on_field("status"),
            );
            return RecordStatus::Active;
        };

        self.config.status_for(raw).unwrap_or_else(|| {
            warnings.push(
                PipelineWarning::new(
                    WarningKind::UnknownVocabulary,
                    format!("{} has unknown status '{}'; assuming Active", code, raw),
                )
                .for_code(code)
                .on_field("status"),
            );
            RecordStatus::Active
        })
    }

    fn parse_applicability(
        &self,
        code: &str,
        category: EntityCategory,
        raw: &Option<String>,
        warnings: &mut Warnings,
    ) -> Applicability {
        let field = format!("entity_flags.{}", category.code());

        let Some(raw) = raw.as_deref() else {
            warnings.push(
                PipelineWarning::new(
                    WarningKind::MissingField,
                    format!("{} has no {} flag; assuming not applicable", code, category),
                )
                .for_code(code)
                .on_field(field),
            );
            return Applicability::NotApplicable;
        };

        self.config.applicability_for(raw).unwrap_or_else(|| {
            warnings.push(
                PipelineWarning::new(
                    WarningKind::UnknownVocabulary,
                    format!("{} has unknown {} flag '{}'; assuming not applicable", code, category, raw),
                )
                .for_code(code)
                .on_field(field),
            );
            Applicability::NotApplicable
        })
    }

    fn parse_extended(&self, code: &str, raw: Option<&str>, warnings: &mut Warnings) -> bool {
        match raw.map(str::trim) {
            None => false,
            Some(value) if value.eq_ignore_ascii_case(&self.config.extended_marker) => true,
            Some(value) if value.eq_ignore_ascii_case("N") => false,
            Some(value) => {
                warnings.push(
                    PipelineWarning::new(
                        WarningKind::UnknownVocabulary,
                        format!("{} has unknown extended marker '{}'; treating as core", code, value),
                    )
                    .for_code(code)
                    .on_field("extended_flag"),
                );
                false
            }
        }
    }

    fn attach_concepts(&self, dataset: &mut ReferenceDataset, batch: &SourceBatch, warnings: &mut Warnings) {
        for row in &batch.concepts {
            let code = row.code.trim();
            let concept = row.concept.trim();

            if code.is_empty() || concept.is_empty() {
                warnings.push(PipelineWarning::new(
                    WarningKind::SkippedRow,
                    format!("row {} in {} needs both a code and a concept", row.row, batch.source_name),
                ));
                continue;
            }

            if !dataset.contains(code) {
                warnings.push(
                    PipelineWarning::new(
                        WarningKind::UnknownConceptCode,
                        format!("concept {} references unknown code {}", concept, code),
                    )
                    .for_code(code),
                );
                continue;
            }

            let mapping = ConceptMapping::new(code, concept)
                .with_labels(row.label_nl.as_deref(), row.label_en.as_deref());

            let entry = dataset.concepts.entry(code.to_string()).or_default();
            if !entry.contains(&mapping) {
                entry.push(mapping);
            }
        }
    }
}

// ============================================================================
// SAFE PARSING
// ============================================================================

/// Fill an empty canonical field from the field-spec table.
/// Canonical values win; a disagreement is reported, not applied.
fn merge_field(
    code: &str,
    field: &str,
    slot: &mut Option<String>,
    value: &Option<String>,
    numeric: bool,
    warnings: &mut Warnings,
) {
    let Some(value) = value else {
        return;
    };

    match slot {
        None => *slot = Some(value.clone()),
        Some(existing) => {
            let same = if numeric {
                existing.trim_start_matches('0') == value.trim_start_matches('0')
            } else {
                existing == value
            };

            if !same {
                warnings.push(
                    PipelineWarning::new(
                        WarningKind::FieldConflict,
                        format!(
                            "{}: canonical {} '{}' differs from field-spec '{}'; keeping canonical",
                            code, field, existing, value
                        ),
                    )
                    .for_code(code)
                    .on_field(field),
                );
            }
        }
    }
}

/// Level 1..=5, falling back to DEFAULT_LEVEL with a warning
pub fn parse_level(code: &str, raw: Option<&str>, warnings: &mut Warnings) -> u8 {
    let Some(raw) = raw else {
        warnings.push(
            PipelineWarning::new(
                WarningKind::MissingField,
                format!("{} has no level; assuming {}", code, DEFAULT_LEVEL),
            )
            .for_code(code)
            .on_field("level"),
        );
        return DEFAULT_LEVEL;
    };

    match raw.trim().parse::<u8>() {
        Ok(level) if (1..=MAX_LEVEL).contains(&level) => level,
        _ => {
            warnings.push(
                PipelineWarning::new(
                    WarningKind::UnparsableField,
                    format!("{} has level '{}' outside 1-{}; assuming {}", code, raw, MAX_LEVEL, DEFAULT_LEVEL),
                )
                .for_code(code)
                .on_field("level"),
            );
            DEFAULT_LEVEL
        }
    }
}

/// Industry (branche) code; unparsable values are dropped with a warning
pub fn parse_industry_code(code: &str, raw: Option<&str>, warnings: &mut Warnings) -> Option<u32> {
    let raw = raw?;
    match raw.trim().parse::<u32>() {
        Ok(value) => Some(value),
        Err(_) => {
            warnings.push(
                PipelineWarning::new(
                    WarningKind::UnparsableField,
                    format!("{} has industry code '{}' that is not a number; ignoring it", code, raw),
                )
                .for_code(code)
                .on_field("industry_code"),
            );
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RawConcept;

    fn canonical(records: Vec<RawRecord>) -> SourceBatch {
        let mut batch = SourceBatch::new(SourceKind::Canonical, "canonical.json");
        batch.records = records;
        batch
    }

    fn full_raw(code: &str, row: usize) -> RawRecord {
        RawRecord {
            short_label: Some(format!("Label {}", code)),
            level: Some("2".to_string()),
            status: Some("A".to_string()),
            zzp: Some("J".to_string()),
            ez: Some("P".to_string()),
            bv: Some("N".to_string()),
            svc: Some("N".to_string()),
            ..RawRecord::new(code, row)
        }
    }

    #[test]
    fn test_duplicate_code_is_fatal() {
        let config = EngineConfig::default();
        let batch = canonical(vec![full_raw("B", 1), full_raw("BIva", 2), full_raw("B", 7)]);

        let err = ReferenceLoader::new(&config)
            .load(&[batch], &mut Warnings::new())
            .unwrap_err();

        match err {
            LoadError::DuplicateCode { code, first, second } => {
                assert_eq!(code, "B");
                assert_eq!((first, second), (1, 7));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_normalizes_a_complete_record() {
        let config = EngineConfig::default();
        let mut raw = full_raw("BIva", 1);
        raw.stable_number = Some("1010".to_string());
        raw.extended = Some("J".to_string());
        raw.industry_code = Some("12".to_string());

        let mut warnings = Warnings::new();
        let dataset = ReferenceLoader::new(&config).load(&[canonical(vec![raw])], &mut warnings).unwrap();

        let record = dataset.get("BIva").unwrap();
        assert_eq!(record.stable_number, "01010");
        assert_eq!(record.level, 2);
        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(record.entity_flags.get(EntityCategory::Zzp), Applicability::Standard);
        assert_eq!(record.entity_flags.get(EntityCategory::Ez), Applicability::Extended);
        assert_eq!(record.entity_flags.get(EntityCategory::Bv), Applicability::NotApplicable);
        assert!(record.extended_flag);
        assert_eq!(record.industry_code, Some(12));
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_unparsable_fields_fall_back_with_warnings() {
        let config = EngineConfig::default();
        let mut raw = full_raw("BIva", 1);
        raw.level = Some("twee".to_string());
        raw.industry_code = Some("n/a".to_string());
        raw.status = Some("X".to_string());

        let mut warnings = Warnings::new();
        let dataset = ReferenceLoader::new(&config).load(&[canonical(vec![raw])], &mut warnings).unwrap();

        let record = dataset.get("BIva").unwrap();
        assert_eq!(record.level, DEFAULT_LEVEL);
        assert_eq!(record.industry_code, None);
        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(warnings.count(WarningKind::UnparsableField), 2);
        assert_eq!(warnings.count(WarningKind::UnknownVocabulary), 1);
    }

    #[test]
    fn test_out_of_range_level_warns() {
        let mut warnings = Warnings::new();
        assert_eq!(parse_level("B", Some("9"), &mut warnings), DEFAULT_LEVEL);
        assert_eq!(parse_level("B", Some("0"), &mut warnings), DEFAULT_LEVEL);
        assert_eq!(parse_level("B", Some(" 3 "), &mut warnings), 3);
        assert_eq!(warnings.count(WarningKind::UnparsableField), 2);
    }

    #[test]
    fn test_empty_code_rows_are_skipped() {
        let config = EngineConfig::default();
        let batch = canonical(vec![full_raw("  ", 1), full_raw("B", 2)]);

        let mut warnings = Warnings::new();
        let dataset = ReferenceLoader::new(&config).load(&[batch], &mut warnings).unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(warnings.count(WarningKind::SkippedRow), 1);
    }

    #[test]
    fn test_field_spec_fills_gaps_and_reports_conflicts() {
        let config = EngineConfig::default();
        let mut base = full_raw("BIva", 1);
        base.polarity = None;
        base.stable_number = Some("1000".to_string());

        let mut spec = SourceBatch::new(SourceKind::FieldSpecification, "spec.csv");
        spec.records = vec![
            RawRecord {
                polarity: Some("D".to_string()),
                stable_number: Some("01000".to_string()),
                short_label: Some("Other label".to_string()),
                sort_key: Some("A.1".to_string()),
                ..RawRecord::new("BIva", 2)
            },
            RawRecord::new("BZzz", 3),
        ];

        let mut warnings = Warnings::new();
        let dataset = ReferenceLoader::new(&config)
            .load(&[spec, canonical(vec![base])], &mut warnings)
            .unwrap();

        let record = dataset.get("BIva").unwrap();
        assert_eq!(record.polarity_raw, "D");
        assert_eq!(record.sort_key, "A.1");
        assert_eq!(record.short_label, "Label BIva");
        assert_eq!(record.stable_number, "01000");
        assert_eq!(warnings.count(WarningKind::FieldConflict), 1);
        assert_eq!(warnings.count(WarningKind::UnknownSpecCode), 1);
        assert!(!dataset.contains("BZzz"));
    }

    #[test]
    fn test_concepts_for_unknown_codes_warn() {
        let config = EngineConfig::default();
        let mut concepts = SourceBatch::new(SourceKind::ConceptTable, "labels.csv");
        concepts.concepts = vec![
            RawConcept {
                code: "B".to_string(),
                concept: "jenv-bw2-i_Assets".to_string(),
                row: 2,
                ..RawConcept::default()
            },
            RawConcept {
                code: "BGone".to_string(),
                concept: "jenv-bw2-i_Assets".to_string(),
                row: 3,
                ..RawConcept::default()
            },
            RawConcept {
                code: "B".to_string(),
                row: 4,
                ..RawConcept::default()
            },
        ];

        let mut warnings = Warnings::new();
        let dataset = ReferenceLoader::new(&config)
            .load(&[canonical(vec![full_raw("B", 1)]), concepts], &mut warnings)
            .unwrap();

        assert_eq!(dataset.concepts_for("B").len(), 1);
        assert!(dataset.concepts_for("BGone").is_empty());
        assert_eq!(warnings.count(WarningKind::UnknownConceptCode), 1);
        assert_eq!(warnings.count(WarningKind::SkippedRow), 1);
    }

    #[test]
    fn test_missing_flags_and_labels_warn() {
        let config = EngineConfig::default();
        let raw = RawRecord {
            level: Some("1".to_string()),
            status: Some("A".to_string()),
            ..RawRecord::new("W", 1)
        };

        let mut warnings = Warnings::new();
        let dataset = ReferenceLoader::new(&config).load(&[canonical(vec![raw])], &mut warnings).unwrap();

        let record = dataset.get("W").unwrap();
        assert_eq!(record.short_label, "W");
        assert_eq!(record.entity_flags, EntityFlags::default());
        // label + four entity flags
        assert_eq!(warnings.count(WarningKind::MissingField), 5);
    }

    #[test]
    fn test_short_label_falls_back_to_long_label_with_warning() {
        let config = EngineConfig::default();
        let raw = RawRecord {
            short_label: None,
            long_label: Some("Immateriële vaste activa".to_string()),
            ..full_raw("BIva", 1)
        };

        let mut warnings = Warnings::new();
        let dataset = ReferenceLoader::new(&config).load(&[canonical(vec![raw])], &mut warnings).unwrap();

        assert_eq!(dataset.get("BIva").unwrap().short_label, "Immateriële vaste activa");
        assert_eq!(warnings.count(WarningKind::MissingField), 1);

        let warning = warnings.of_kind(WarningKind::MissingField).next().unwrap();
        assert_eq!(warning.field.as_deref(), Some("short_label"));
        assert!(warning.message.contains("long label"));
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let records = vec![ReferenceRecord::new("B", "Balans", 1), ReferenceRecord::new("B", "Balans", 1)];
        assert!(matches!(
            ReferenceDataset::from_records(records, vec![]),
            Err(LoadError::DuplicateCode { .. })
        ));
    }
}
