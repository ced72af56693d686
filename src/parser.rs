// 🏗️ Source Adapters
// One adapter per input document, each with its own field naming, all
// producing the same canonical raw rows.
//
// Adding a source = implementing SourceAdapter. The loader never looks at
// source-specific key names.

use crate::error::{LoadError, LoadResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceKind - which of the three input documents a batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Flat record list (rgsmkb JSON export)
    Canonical,
    /// Field-specification table (Dutch column headers)
    FieldSpecification,
    /// Concept / legal-basis table with NL and EN labels
    ConceptTable,
}

impl SourceKind {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceKind::Canonical => "canonical record list",
            SourceKind::FieldSpecification => "field-specification table",
            SourceKind::ConceptTable => "concept table",
        }
    }
}

/// RawRecord - one source row mapped onto the canonical field names.
/// Values are still unparsed text; the loader normalizes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub code: String,
    pub stable_number: Option<String>,
    pub short_label: Option<String>,
    pub long_label: Option<String>,
    pub english_label: Option<String>,
    pub polarity: Option<String>,
    pub level: Option<String>,
    pub sort_key: Option<String>,
    pub contra_reference: Option<String>,
    pub external_reference: Option<String>,
    pub status: Option<String>,
    pub zzp: Option<String>,
    pub ez: Option<String>,
    pub bv: Option<String>,
    pub svc: Option<String>,
    pub extended: Option<String>,
    pub industry_code: Option<String>,

    /// Provenance: 1-based row in the source document
    pub row: usize,
}

impl RawRecord {
    pub fn new(code: impl Into<String>, row: usize) -> Self {
        RawRecord {
            code: code.into(),
            row,
            ..RawRecord::default()
        }
    }
}

/// RawConcept - one concept-table row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConcept {
    pub code: String,
    pub concept: String,
    pub label_nl: Option<String>,
    pub label_en: Option<String>,
    pub row: usize,
}

/// Output of one adapter run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBatch {
    pub kind: SourceKind,
    pub source_name: String,
    pub records: Vec<RawRecord>,
    pub concepts: Vec<RawConcept>,
}

impl SourceBatch {
    pub fn new(kind: SourceKind, source_name: impl Into<String>) -> Self {
        SourceBatch {
            kind,
            source_name: source_name.into(),
            records: Vec::new(),
            concepts: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len() + self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// COMPOSABLE TRAITS
// ============================================================================

/// SourceAdapter - Core trait (minimal, required)
pub trait SourceAdapter: Send + Sync {
    /// Read one document from any reader
    ///
    /// # Arguments
    /// * `reader` - document bytes
    /// * `source_name` - name used in errors and provenance
    fn read(&self, reader: &mut dyn Read, source_name: &str) -> LoadResult<SourceBatch>;

    /// Get the source kind this adapter handles
    fn source_kind(&self) -> SourceKind;

    /// Get adapter version (for provenance tracking)
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Parse a file from disk
    fn parse(&self, file_path: &Path) -> LoadResult<SourceBatch> {
        let source_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let mut file = File::open(file_path).map_err(|source| LoadError::Io {
            source_name: file_path.display().to_string(),
            source,
        })?;

        self.read(&mut file, &source_name)
    }
}

/// FileValidator - Optional capability: check if an adapter can handle a file
pub trait FileValidator {
    fn can_parse(&self, file_path: &Path) -> bool;
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect source kind from the filename
///
/// # Examples:
/// ```text
/// "rgsmkb_all4EN.json"                → Canonical
/// "rgs_veldspecificaties.csv"         → FieldSpecification
/// "20210913 RGS NL en EN labels.csv"  → ConceptTable
/// ```
pub fn detect_source(file_path: &Path) -> LoadResult<SourceKind> {
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let filename_lower = filename.to_lowercase();

    let kind = if filename_lower.contains("label") || filename_lower.contains("concept") {
        SourceKind::ConceptTable
    } else if filename_lower.contains("spec") || filename_lower.contains("veld") {
        SourceKind::FieldSpecification
    } else if filename_lower.ends_with(".json") {
        SourceKind::Canonical
    } else {
        return Err(LoadError::UnknownSource(filename.to_string()));
    };

    // The name picks the adapter; the adapter still has to accept the file
    if get_validator(kind).can_parse(file_path) {
        Ok(kind)
    } else {
        Err(LoadError::UnknownSource(filename.to_string()))
    }
}

/// Get the adapter for a source kind
pub fn get_adapter(kind: SourceKind) -> Box<dyn SourceAdapter> {
    match kind {
        SourceKind::Canonical => Box::new(CanonicalJsonAdapter::new()),
        SourceKind::FieldSpecification => Box::new(FieldSpecAdapter::new()),
        SourceKind::ConceptTable => Box::new(ConceptTableAdapter::new()),
    }
}

/// Get the file check for a source kind
pub fn get_validator(kind: SourceKind) -> Box<dyn FileValidator> {
    match kind {
        SourceKind::Canonical => Box::new(CanonicalJsonAdapter::new()),
        SourceKind::FieldSpecification => Box::new(FieldSpecAdapter::new()),
        SourceKind::ConceptTable => Box::new(ConceptTableAdapter::new()),
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

fn read_to_string(reader: &mut dyn Read, source_name: &str) -> LoadResult<String> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|source| LoadError::Io {
            source_name: source_name.to_string(),
            source,
        })?;
    // Excel exports often carry a BOM
    Ok(content.trim_start_matches('\u{feff}').to_string())
}

fn has_extension(file_path: &Path, extension: &str) -> bool {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Trimmed, non-empty text
fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// JSON scalar as text; sources mix strings and numbers for the same key
fn json_text(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => clean(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Semicolon exports are as common as comma exports for Dutch tables
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

/// Column positions resolved from a header row, by case-insensitive name
struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        Columns {
            names: headers.iter().map(|h| h.trim().to_lowercase()).collect(),
        }
    }

    fn index(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.names.iter().position(|h| *h == name)
    }

    fn get(&self, record: &csv::StringRecord, name: &str) -> Option<String> {
        self.index(name)
            .and_then(|idx| record.get(idx))
            .and_then(clean)
    }
}

fn csv_rows(
    content: &str,
    source_name: &str,
) -> LoadResult<(Columns, Vec<(usize, csv::StringRecord)>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(sniff_delimiter(content))
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(|source| LoadError::Csv {
        source_name: source_name.to_string(),
        line: 1,
        source,
    })?;
    let columns = Columns::new(headers);

    let mut rows = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        // +2 because: 1-indexed + header row
        let line = line_num + 2;
        let record = result.map_err(|source| LoadError::Csv {
            source_name: source_name.to_string(),
            line,
            source,
        })?;
        rows.push((line, record));
    }

    Ok((columns, rows))
}

// ============================================================================
// CANONICAL RECORD LIST (JSON)
// ============================================================================

/// Canonical JSON adapter: array of `rgs*` camelCase objects
pub struct CanonicalJsonAdapter;

impl CanonicalJsonAdapter {
    pub fn new() -> Self {
        CanonicalJsonAdapter
    }

    fn record_from(item: &Value, row: usize) -> RawRecord {
        RawRecord {
            code: json_text(item, "rgsCode").unwrap_or_default(),
            stable_number: json_text(item, "rgsReknr"),
            short_label: json_text(item, "rgsOmskort"),
            long_label: json_text(item, "rgsOmslang"),
            english_label: json_text(item, "rgsOmsEngels"),
            polarity: json_text(item, "rgsDc"),
            level: json_text(item, "rgsNivo"),
            sort_key: json_text(item, "rgsSortering"),
            contra_reference: json_text(item, "rgsOmslag"),
            external_reference: json_text(item, "rgsReferentienr"),
            status: json_text(item, "rgsStatus"),
            zzp: json_text(item, "rgsZZP"),
            ez: json_text(item, "rgsEZ"),
            bv: json_text(item, "rgsBV"),
            svc: json_text(item, "rgsSVC"),
            extended: json_text(item, "rgsUITG"),
            industry_code: json_text(item, "rgsBranche"),
            row,
        }
    }
}

impl Default for CanonicalJsonAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for CanonicalJsonAdapter {
    fn read(&self, reader: &mut dyn Read, source_name: &str) -> LoadResult<SourceBatch> {
        let content = read_to_string(reader, source_name)?;
        let json: Value = serde_json::from_str(&content).map_err(|source| LoadError::Json {
            source_name: source_name.to_string(),
            source,
        })?;

        // Either a bare array or { "data": [...] }
        let items = json
            .as_array()
            .or_else(|| json.get("data").and_then(|d| d.as_array()))
            .ok_or_else(|| LoadError::Format {
                source_name: source_name.to_string(),
                expected: "record list",
                detail: "expected a JSON array of records".to_string(),
            })?;

        let mut batch = SourceBatch::new(SourceKind::Canonical, source_name);
        for (idx, item) in items.iter().enumerate() {
            if !item.is_object() {
                return Err(LoadError::Format {
                    source_name: source_name.to_string(),
                    expected: "record list",
                    detail: format!("element {} is not an object", idx + 1),
                });
            }
            // JSON array index (1-based for consistency)
            batch.records.push(Self::record_from(item, idx + 1));
        }

        tracing::debug!(source = source_name, records = batch.records.len(), "read canonical records");
        Ok(batch)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Canonical
    }
}

impl FileValidator for CanonicalJsonAdapter {
    fn can_parse(&self, file_path: &Path) -> bool {
        has_extension(file_path, "json")
    }
}

// ============================================================================
// FIELD-SPECIFICATION TABLE (CSV, Dutch headers)
// ============================================================================

/// Field-specification adapter
///
/// Headers: Referentiecode, Referentienummer, Omschrijving (verkort),
/// Omschrijving, Omschrijving EN, D/C, Nivo, Sortering, Omslagcode, Status
pub struct FieldSpecAdapter;

impl FieldSpecAdapter {
    pub const CODE_HEADER: &'static str = "Referentiecode";

    pub fn new() -> Self {
        FieldSpecAdapter
    }
}

impl Default for FieldSpecAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for FieldSpecAdapter {
    fn read(&self, reader: &mut dyn Read, source_name: &str) -> LoadResult<SourceBatch> {
        let content = read_to_string(reader, source_name)?;
        let (columns, rows) = csv_rows(&content, source_name)?;

        if columns.index(Self::CODE_HEADER).is_none() {
            return Err(LoadError::Format {
                source_name: source_name.to_string(),
                expected: "field-specification table",
                detail: format!("missing '{}' column", Self::CODE_HEADER),
            });
        }

        let mut batch = SourceBatch::new(SourceKind::FieldSpecification, source_name);
        for (line, record) in rows {
            batch.records.push(RawRecord {
                code: columns.get(&record, Self::CODE_HEADER).unwrap_or_default(),
                stable_number: columns.get(&record, "Referentienummer"),
                short_label: columns.get(&record, "Omschrijving (verkort)"),
                long_label: columns.get(&record, "Omschrijving"),
                english_label: columns.get(&record, "Omschrijving EN"),
                polarity: columns.get(&record, "D/C"),
                level: columns.get(&record, "Nivo"),
                sort_key: columns.get(&record, "Sortering"),
                contra_reference: columns.get(&record, "Omslagcode"),
                status: columns.get(&record, "Status"),
                row: line,
                ..RawRecord::default()
            });
        }

        tracing::debug!(source = source_name, rows = batch.records.len(), "read field-spec rows");
        Ok(batch)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::FieldSpecification
    }
}

impl FileValidator for FieldSpecAdapter {
    fn can_parse(&self, file_path: &Path) -> bool {
        has_extension(file_path, "csv")
    }
}

// ============================================================================
// CONCEPT / LEGAL-BASIS TABLE (CSV)
// ============================================================================

/// Concept table adapter
///
/// Headers: RGS code, Concept, NL Label, EN Label (Omschrijving RGS repeats the record label and is skipped)
pub struct ConceptTableAdapter;

impl ConceptTableAdapter {
    pub fn new() -> Self {
        ConceptTableAdapter
    }
}

impl Default for ConceptTableAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for ConceptTableAdapter {
    fn read(&self, reader: &mut dyn Read, source_name: &str) -> LoadResult<SourceBatch> {
        let content = read_to_string(reader, source_name)?;
        let (columns, rows) = csv_rows(&content, source_name)?;

        for required in ["RGS code", "Concept"] {
            if columns.index(required).is_none() {
                return Err(LoadError::Format {
                    source_name: source_name.to_string(),
                    expected: "concept table",
                    detail: format!("missing '{}' column", required),
                });
            }
        }

        let mut batch = SourceBatch::new(SourceKind::ConceptTable, source_name);
        for (line, record) in rows {
            batch.concepts.push(RawConcept {
                code: columns.get(&record, "RGS code").unwrap_or_default(),
                concept: columns.get(&record, "Concept").unwrap_or_default(),
                label_nl: columns.get(&record, "NL Label"),
                label_en: columns.get(&record, "EN Label"),
                row: line,
            });
        }

        tracing::debug!(source = source_name, rows = batch.concepts.len(), "read concept rows");
        Ok(batch)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::ConceptTable
    }
}

impl FileValidator for ConceptTableAdapter {
    fn can_parse(&self, file_path: &Path) -> bool {
        has_extension(file_path, "csv")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn read_str(adapter: &dyn SourceAdapter, content: &str) -> LoadResult<SourceBatch> {
        adapter.read(&mut content.as_bytes(), "test")
    }

    #[test]
    fn test_detect_source() {
        assert_eq!(detect_source(Path::new("rgsmkb_all4EN.json")).unwrap(), SourceKind::Canonical);
        assert_eq!(
            detect_source(Path::new("20210913 RGS NL en EN labels.csv")).unwrap(),
            SourceKind::ConceptTable
        );
        assert_eq!(
            detect_source(Path::new("rgs_veldspecificaties.csv")).unwrap(),
            SourceKind::FieldSpecification
        );
        assert!(detect_source(Path::new("unknown.csv")).is_err());
    }

    #[test]
    fn test_detected_kind_must_accept_the_extension() {
        assert!(matches!(
            detect_source(Path::new("rgs_veldspecificaties.json")),
            Err(LoadError::UnknownSource(_))
        ));
        assert!(matches!(
            detect_source(Path::new("rgs_labels.xlsx")),
            Err(LoadError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_canonical_mixed_scalar_types() {
        let json = r#"[
            {"rgsCode": "BIva", "rgsReknr": 1000, "rgsOmskort": " Immateriële vaste activa ",
             "rgsDc": "D", "rgsNivo": 2, "rgsZZP": "J", "rgsBranche": null},
            {"rgsCode": "BIvaKou", "rgsReknr": "1010", "rgsNivo": "3"}
        ]"#;

        let batch = read_str(&CanonicalJsonAdapter::new(), json).unwrap();
        assert_eq!(batch.kind, SourceKind::Canonical);
        assert_eq!(batch.records.len(), 2);

        let first = &batch.records[0];
        assert_eq!(first.code, "BIva");
        assert_eq!(first.stable_number.as_deref(), Some("1000"));
        assert_eq!(first.short_label.as_deref(), Some("Immateriële vaste activa"));
        assert_eq!(first.level.as_deref(), Some("2"));
        assert_eq!(first.zzp.as_deref(), Some("J"));
        assert_eq!(first.industry_code, None);
        assert_eq!(first.row, 1);

        assert_eq!(batch.records[1].stable_number.as_deref(), Some("1010"));
        assert_eq!(batch.records[1].row, 2);
    }

    #[test]
    fn test_canonical_accepts_data_wrapper() {
        let batch = read_str(&CanonicalJsonAdapter::new(), r#"{"data": [{"rgsCode": "B"}]}"#).unwrap();
        assert_eq!(batch.records[0].code, "B");
    }

    #[test]
    fn test_canonical_rejects_non_array() {
        let err = read_str(&CanonicalJsonAdapter::new(), r#"{"rgsCode": "B"}"#).unwrap_err();
        assert!(matches!(err, LoadError::Format { .. }));

        let err = read_str(&CanonicalJsonAdapter::new(), "[1, 2]").unwrap_err();
        assert!(matches!(err, LoadError::Format { .. }));

        let err = read_str(&CanonicalJsonAdapter::new(), "not json").unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
    }

    #[test]
    fn test_field_spec_semicolon_headers() {
        let csv = "\u{feff}Referentiecode;Referentienummer;Omschrijving (verkort);D/C;Nivo;Sortering\n\
                   BIva;1000;Immateriële vaste activa;D;2;A.1\n\
                   BIvaKou;;Kosten van oprichting;;3;\n";

        let batch = read_str(&FieldSpecAdapter::new(), csv).unwrap();
        assert_eq!(batch.kind, SourceKind::FieldSpecification);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].code, "BIva");
        assert_eq!(batch.records[0].polarity.as_deref(), Some("D"));
        assert_eq!(batch.records[0].sort_key.as_deref(), Some("A.1"));
        assert_eq!(batch.records[0].row, 2);
        assert_eq!(batch.records[1].stable_number, None);
        assert_eq!(batch.records[1].row, 3);
    }

    #[test]
    fn test_field_spec_requires_code_column() {
        let err = read_str(&FieldSpecAdapter::new(), "Code,Nivo\nB,1\n").unwrap_err();
        assert!(matches!(err, LoadError::Format { .. }));
    }

    #[test]
    fn test_concept_table() {
        let csv = "RGS code,Concept,Omschrijving RGS,NL Label,EN Label\n\
                   BVrz,jenv-bw2-i_Provisions,Voorzieningen,Voorzieningen,Provisions\n";

        let batch = read_str(&ConceptTableAdapter::new(), csv).unwrap();
        assert_eq!(batch.concepts.len(), 1);
        assert_eq!(batch.concepts[0].code, "BVrz");
        assert_eq!(batch.concepts[0].concept, "jenv-bw2-i_Provisions");
        assert_eq!(batch.concepts[0].label_en.as_deref(), Some("Provisions"));
    }

    #[test]
    fn test_get_adapter_matches_kind() {
        for kind in [SourceKind::Canonical, SourceKind::FieldSpecification, SourceKind::ConceptTable] {
            assert_eq!(get_adapter(kind).source_kind(), kind);
        }
    }

    #[test]
    fn test_file_validators() {
        assert!(CanonicalJsonAdapter::new().can_parse(Path::new("rgs.JSON")));
        assert!(!CanonicalJsonAdapter::new().can_parse(Path::new("rgs.csv")));
        assert!(ConceptTableAdapter::new().can_parse(Path::new("labels.csv")));
        assert!(FieldSpecAdapter::new().can_parse(Path::new("veldspecificaties.CSV")));
        assert!(!FieldSpecAdapter::new().can_parse(Path::new("veldspecificaties.json")));
    }
}
