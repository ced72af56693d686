// 📇 Reference Records - the canonical RGS data model
//
// "The code is IDENTITY, everything else is a VALUE"
//
// A ReferenceRecord is one row of the reference standard after the three
// sources have been reconciled. `code` is the only key ever used for
// parent/child relationships. `stable_number` and `external_reference` are
// display data and must never be used to build the tree.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CLOSED VOCABULARIES
// ============================================================================

/// Lifecycle status of a reference code within the standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    Active,
    Passive,
    Obsolete,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "Active",
            RecordStatus::Passive => "Passive",
            RecordStatus::Obsolete => "Obsolete",
        }
    }
}

/// The four legal-entity flavors the MKB subset is tailored for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityCategory {
    /// Zelfstandige zonder personeel (freelancer)
    #[serde(rename = "ZZP")]
    Zzp,
    /// Eenmanszaak (sole proprietorship)
    #[serde(rename = "EZ")]
    Ez,
    /// Besloten vennootschap (private limited company)
    #[serde(rename = "BV")]
    Bv,
    /// Stichting / vereniging / coöperatie
    #[serde(rename = "SVC")]
    Svc,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 4] = [
        EntityCategory::Zzp,
        EntityCategory::Ez,
        EntityCategory::Bv,
        EntityCategory::Svc,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            EntityCategory::Zzp => "ZZP",
            EntityCategory::Ez => "EZ",
            EntityCategory::Bv => "BV",
            EntityCategory::Svc => "SVC",
        }
    }

    /// Case-insensitive lookup by short code ("zzp", "BV", ...)
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        EntityCategory::ALL
            .into_iter()
            .find(|category| category.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Whether a code applies to an entity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Applicability {
    Standard,
    Extended,
    NotApplicable,
}

impl Applicability {
    pub fn is_applicable(&self) -> bool {
        !matches!(self, Applicability::NotApplicable)
    }
}

/// Applicability of one record for each entity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFlags {
    pub zzp: Applicability,
    pub ez: Applicability,
    pub bv: Applicability,
    pub svc: Applicability,
}

impl EntityFlags {
    /// Flags with the same applicability for every category
    pub fn uniform(applicability: Applicability) -> Self {
        EntityFlags {
            zzp: applicability,
            ez: applicability,
            bv: applicability,
            svc: applicability,
        }
    }

    pub fn get(&self, category: EntityCategory) -> Applicability {
        match category {
            EntityCategory::Zzp => self.zzp,
            EntityCategory::Ez => self.ez,
            EntityCategory::Bv => self.bv,
            EntityCategory::Svc => self.svc,
        }
    }

    pub fn set(&mut self, category: EntityCategory, applicability: Applicability) {
        match category {
            EntityCategory::Zzp => self.zzp = applicability,
            EntityCategory::Ez => self.ez = applicability,
            EntityCategory::Bv => self.bv = applicability,
            EntityCategory::Svc => self.svc = applicability,
        }
    }
}

impl Default for EntityFlags {
    fn default() -> Self {
        EntityFlags::uniform(Applicability::NotApplicable)
    }
}

// ============================================================================
// REFERENCE RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Hierarchical classification key ("B", "BIva", "BIvaKou")
    pub code: String,

    /// Five-digit display number, stable across revisions
    pub stable_number: String,

    pub short_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub english_label: Option<String>,

    /// Raw debit/credit marker as found in the source
    pub polarity_raw: String,

    /// Nominal depth, 1 (root category) to 5 (mutation account)
    pub level: u8,

    /// Presentation order within a sibling group
    pub sort_key: String,

    /// Paired contra account (not a hierarchy edge)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contra_reference: Option<String>,

    /// Free-text cross reference; may change between revisions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,

    pub status: RecordStatus,
    pub entity_flags: EntityFlags,

    /// Member of the extended superset rather than the core subset
    pub extended_flag: bool,

    /// Industry (branche) code, when the source provides a valid one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry_code: Option<u32>,
}

impl ReferenceRecord {
    /// Minimal active record; mostly useful for building fixtures
    pub fn new(code: impl Into<String>, short_label: impl Into<String>, level: u8) -> Self {
        ReferenceRecord {
            code: code.into(),
            stable_number: "00000".to_string(),
            short_label: short_label.into(),
            long_label: None,
            english_label: None,
            polarity_raw: String::new(),
            level,
            sort_key: String::new(),
            contra_reference: None,
            external_reference: None,
            status: RecordStatus::Active,
            entity_flags: EntityFlags::default(),
            extended_flag: false,
            industry_code: None,
        }
    }

    /// Builder: set the debit/credit marker
    pub fn with_polarity(mut self, polarity: impl Into<String>) -> Self {
        self.polarity_raw = polarity.into();
        self
    }

    /// Builder: set the sort key
    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = sort_key.into();
        self
    }

    /// Builder: set the status
    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: set applicability for one entity category
    pub fn with_entity(mut self, category: EntityCategory, applicability: Applicability) -> Self {
        self.entity_flags.set(category, applicability);
        self
    }

    /// Builder: set applicability for all entity categories
    pub fn with_all_entities(mut self, applicability: Applicability) -> Self {
        self.entity_flags = EntityFlags::uniform(applicability);
        self
    }

    /// Builder: set the stable number (padded like the loader does)
    pub fn with_stable_number(mut self, number: &str) -> Self {
        self.stable_number = pad_stable_number(number);
        self
    }

    pub fn is_applicable_for(&self, category: EntityCategory) -> bool {
        self.entity_flags.get(category).is_applicable()
    }

    /// Display name: short label, or the code when the label is empty
    pub fn display_name(&self) -> &str {
        if self.short_label.trim().is_empty() {
            &self.code
        } else {
            &self.short_label
        }
    }
}

/// Zero-pad a stable number to five digits ("1010" → "01010").
/// Longer values are kept as they are.
pub fn pad_stable_number(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "00000".to_string();
    }
    format!("{:0>5}", trimmed)
}

// ============================================================================
// CONCEPT MAPPING
// ============================================================================

/// Legal/taxonomic concept attached to a code (e.g. "jenv-bw2-i_Liabilities")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMapping {
    pub code: String,
    pub concept: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_nl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_en: Option<String>,
}

impl ConceptMapping {
    pub fn new(code: impl Into<String>, concept: impl Into<String>) -> Self {
        ConceptMapping {
            code: code.into(),
            concept: concept.into(),
            label_nl: None,
            label_en: None,
        }
    }

    /// Builder: add Dutch and English labels
    pub fn with_labels(mut self, nl: Option<&str>, en: Option<&str>) -> Self {
        self.label_nl = nl.map(str::to_string);
        self.label_en = en.map(str::to_string);
        self
    }

    /// Concept tag and both labels, for keyword matching
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.concept.as_str())
            .chain(self.label_nl.as_deref())
            .chain(self.label_en.as_deref())
    }
}

// ============================================================================
// ERPNEXT CLASSIFICATION TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RootType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl RootType {
    /// Fixed priority order used by the concept-mapping tier
    pub const PRIORITY: [RootType; 5] = [
        RootType::Asset,
        RootType::Liability,
        RootType::Equity,
        RootType::Income,
        RootType::Expense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RootType::Asset => "Asset",
            RootType::Liability => "Liability",
            RootType::Equity => "Equity",
            RootType::Income => "Income",
            RootType::Expense => "Expense",
        }
    }

    /// Statement this root type belongs on
    pub fn report_type(&self) -> ReportType {
        match self {
            RootType::Asset | RootType::Liability | RootType::Equity => ReportType::BalanceSheet,
            RootType::Income | RootType::Expense => ReportType::ProfitAndLoss,
        }
    }
}

/// ERPNext account_type vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Bank,
    Cash,
    Receivable,
    Payable,
    #[serde(rename = "Fixed Asset")]
    FixedAsset,
    #[serde(rename = "Accumulated Depreciation")]
    AccumulatedDepreciation,
    Stock,
    Tax,
    #[serde(rename = "Cost of Goods Sold")]
    CostOfGoodsSold,
    #[serde(rename = "Income Account")]
    IncomeAccount,
    #[serde(rename = "Expense Account")]
    ExpenseAccount,
    Depreciation,
    Equity,
    #[serde(rename = "Current Asset")]
    CurrentAsset,
    #[serde(rename = "Current Liability")]
    CurrentLiability,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Bank => "Bank",
            AccountType::Cash => "Cash",
            AccountType::Receivable => "Receivable",
            AccountType::Payable => "Payable",
            AccountType::FixedAsset => "Fixed Asset",
            AccountType::AccumulatedDepreciation => "Accumulated Depreciation",
            AccountType::Stock => "Stock",
            AccountType::Tax => "Tax",
            AccountType::CostOfGoodsSold => "Cost of Goods Sold",
            AccountType::IncomeAccount => "Income Account",
            AccountType::ExpenseAccount => "Expense Account",
            AccountType::Depreciation => "Depreciation",
            AccountType::Equity => "Equity",
            AccountType::CurrentAsset => "Current Asset",
            AccountType::CurrentLiability => "Current Liability",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    BalanceSheet,
    ProfitAndLoss,
}

impl ReportType {
    /// ERPNext spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::BalanceSheet => "Balance Sheet",
            ReportType::ProfitAndLoss => "Profit and Loss",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormalBalance {
    Debit,
    Credit,
    Unset,
}

impl NormalBalance {
    /// ERPNext `balance_must_be` value; none when the polarity is unknown
    pub fn balance_must_be(&self) -> Option<&'static str> {
        match self {
            NormalBalance::Debit => Some("Debit"),
            NormalBalance::Credit => Some("Credit"),
            NormalBalance::Unset => None,
        }
    }
}

/// How much a downstream consumer may trust the root type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassificationConfidence {
    /// Decided by the record's own concept mapping (audited legal basis)
    Explicit,
    /// Decided by structural patterns, inheritance or a default
    Inferred,
}

// ============================================================================
// RESOLVED CLASSIFICATION
// ============================================================================

/// Pipeline output: a record plus its position in the tree and its
/// ERPNext classification.
///
/// Classification is advisory. Records marked `Inferred` were placed by
/// heuristics and must not be treated as authoritative by compliance
/// consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedClassification {
    #[serde(flatten)]
    pub record: ReferenceRecord,

    pub parent_code: Option<String>,
    pub is_group: bool,

    pub root_type: RootType,
    pub account_type: AccountType,
    pub report_type: ReportType,
    pub normal_balance: NormalBalance,

    pub classification_confidence: ClassificationConfidence,
    /// Id of the rule that decided root_type
    pub root_type_rule: String,
    /// Id of the rule that decided account_type
    pub account_type_rule: String,
}

impl ResolvedClassification {
    pub fn code(&self) -> &str {
        &self.record.code
    }

    pub fn is_root(&self) -> bool {
        self.parent_code.is_none()
    }

    pub fn is_inferred(&self) -> bool {
        self.classification_confidence == ClassificationConfidence::Inferred
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_stable_number() {
        assert_eq!(pad_stable_number("1010"), "01010");
        assert_eq!(pad_stable_number("0"), "00000");
        assert_eq!(pad_stable_number(""), "00000");
        assert_eq!(pad_stable_number("12345"), "12345");
        assert_eq!(pad_stable_number("1234567"), "1234567");
    }

    #[test]
    fn test_entity_category_from_code() {
        assert_eq!(EntityCategory::from_code("zzp"), Some(EntityCategory::Zzp));
        assert_eq!(EntityCategory::from_code(" BV "), Some(EntityCategory::Bv));
        assert_eq!(EntityCategory::from_code("NV"), None);
    }

    #[test]
    fn test_entity_flags_get_set() {
        let mut flags = EntityFlags::default();
        assert!(!flags.get(EntityCategory::Ez).is_applicable());

        flags.set(EntityCategory::Ez, Applicability::Extended);
        assert_eq!(flags.get(EntityCategory::Ez), Applicability::Extended);
        assert!(flags.get(EntityCategory::Ez).is_applicable());
        assert_eq!(flags.get(EntityCategory::Bv), Applicability::NotApplicable);
    }

    #[test]
    fn test_display_name_falls_back_to_code() {
        let record = ReferenceRecord::new("BIva", "  ", 2);
        assert_eq!(record.display_name(), "BIva");

        let record = ReferenceRecord::new("BIva", "Immateriële vaste activa", 2);
        assert_eq!(record.display_name(), "Immateriële vaste activa");
    }

    #[test]
    fn test_account_type_serializes_erpnext_spelling() {
        let json = serde_json::to_string(&AccountType::FixedAsset).unwrap();
        assert_eq!(json, "\"Fixed Asset\"");
        assert_eq!(AccountType::FixedAsset.as_str(), "Fixed Asset");
    }

    #[test]
    fn test_concept_texts_include_labels() {
        let concept = ConceptMapping::new("BSch", "jenv-bw2-i_Liabilities")
            .with_labels(Some("Schulden"), Some("Liabilities"));

        let texts: Vec<&str> = concept.texts().collect();
        assert_eq!(texts, vec!["jenv-bw2-i_Liabilities", "Schulden", "Liabilities"]);
    }
}
