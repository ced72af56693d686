// 🏷️ Classification Rules - Rules as Data
// Pattern tables that map RGS codes, descriptions and concept tags onto
// ERPNext root types and account types.
//
// Nothing in here is hard logic: every table has a built-in default and can
// be replaced through EngineConfig when the reference standard is revised.

use crate::record::{AccountType, RootType};
use serde::{Deserialize, Serialize};

// ============================================================================
// PATTERN MATCHING
// ============================================================================

/// Match `text` against a rule pattern.
///
/// Without `*` the pattern matches anywhere in the text (substring). With
/// `*` it is an anchored glob: `BIva*` is a prefix match, `*Kas` a suffix
/// match, `BVoo*Schuld` a prefix + suffix match with anything in between.
pub fn pattern_matches(pattern: &str, text: &str, case_sensitive: bool) -> bool {
    let (pattern, text) = if case_sensitive {
        (pattern.to_string(), text.to_string())
    } else {
        (pattern.to_lowercase(), text.to_lowercase())
    };

    if pattern.is_empty() {
        return false;
    }

    if !pattern.contains('*') {
        return text.contains(&pattern);
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    if !text.starts_with(first) {
        return false;
    }

    // Middle parts must appear in order after the prefix
    let mut current_pos = first.len();
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match text[current_pos..].find(part) {
            Some(pos) => current_pos += pos + part.len(),
            None => return false,
        }
    }

    // The suffix may not overlap what has already been consumed
    text.len() >= current_pos + last.len() && text.ends_with(last)
}

fn default_priority() -> i32 {
    0
}

/// Stable sort, highest priority first; ties keep declaration order
pub fn by_priority<T, F>(rules: &[T], priority: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> i32,
{
    let mut sorted = rules.to_vec();
    sorted.sort_by(|a, b| priority(b).cmp(&priority(a)));
    sorted
}

// ============================================================================
// ROOT TYPE RULES (structural tier)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootTypeRule {
    /// Rule ID for tracing decisions back to the table
    pub id: String,

    /// Code pattern (case-sensitive)
    pub pattern: String,

    pub root_type: RootType,

    /// Priority (higher = applied first)
    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RootTypeRule {
    pub fn new(id: &str, pattern: &str, root_type: RootType) -> Self {
        RootTypeRule {
            id: id.to_string(),
            pattern: pattern.to_string(),
            root_type,
            priority: 0,
            description: None,
        }
    }

    /// Builder: add description/notes
    pub fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn matches(&self, code: &str) -> bool {
        pattern_matches(&self.pattern, code, true)
    }
}

// ============================================================================
// ACCOUNT TYPE RULES (code/description tier)
// ============================================================================

/// Which part of a record an account-type rule looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchField {
    /// Hierarchical code, case-sensitive
    Code,
    /// Short and long labels, case-insensitive
    Description,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTypeRule {
    pub id: String,

    /// Only evaluated for records with this root type
    pub root_type: RootType,

    pub field: MatchField,
    pub pattern: String,
    pub account_type: AccountType,

    #[serde(default = "default_priority")]
    pub priority: i32,
}

impl AccountTypeRule {
    pub fn code(id: &str, root_type: RootType, pattern: &str, account_type: AccountType) -> Self {
        AccountTypeRule {
            id: id.to_string(),
            root_type,
            field: MatchField::Code,
            pattern: pattern.to_string(),
            account_type,
            priority: 0,
        }
    }

    pub fn description(id: &str, root_type: RootType, keyword: &str, account_type: AccountType) -> Self {
        AccountTypeRule {
            id: id.to_string(),
            root_type,
            field: MatchField::Description,
            pattern: keyword.to_string(),
            account_type,
            priority: 0,
        }
    }

    /// Builder: set priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn matches(&self, code: &str, descriptions: &[&str]) -> bool {
        match self.field {
            MatchField::Code => pattern_matches(&self.pattern, code, true),
            MatchField::Description => descriptions
                .iter()
                .any(|text| pattern_matches(&self.pattern, text, false)),
        }
    }
}

// ============================================================================
// CONCEPT RULES (concept tier)
// ============================================================================

/// Substrings of concept tags that identify a root type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptMarker {
    pub root_type: RootType,
    pub needles: Vec<String>,
}

impl ConceptMarker {
    pub fn new(root_type: RootType, needles: &[&str]) -> Self {
        ConceptMarker {
            root_type,
            needles: needles.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Case-insensitive check against one concept tag
    pub fn matches(&self, concept: &str) -> bool {
        self.needles
            .iter()
            .any(|needle| pattern_matches(needle, concept, false))
    }
}

/// Keyword looked up in concept tags and labels to pick an account type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptKeywordRule {
    pub id: String,
    pub root_type: RootType,
    pub keyword: String,
    pub account_type: AccountType,

    #[serde(default = "default_priority")]
    pub priority: i32,
}

impl ConceptKeywordRule {
    pub fn new(id: &str, root_type: RootType, keyword: &str, account_type: AccountType) -> Self {
        ConceptKeywordRule {
            id: id.to_string(),
            root_type,
            keyword: keyword.to_string(),
            account_type,
            priority: 0,
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        pattern_matches(&self.keyword, text, false)
    }
}

// ============================================================================
// BUILT-IN RGS MKB TABLES
// ============================================================================

/// Concept markers in the fixed priority order Asset → Expense
pub fn default_concept_markers() -> Vec<ConceptMarker> {
    vec![
        ConceptMarker::new(RootType::Asset, &["asset"]),
        ConceptMarker::new(RootType::Liability, &["liabilit", "provision"]),
        ConceptMarker::new(RootType::Equity, &["equity"]),
        ConceptMarker::new(RootType::Income, &["revenue", "income"]),
        ConceptMarker::new(RootType::Expense, &["expense", "cost"]),
    ]
}

/// Structural root-type rules for codes under the balance-sheet and
/// profit-and-loss roots
pub fn default_root_type_rules() -> Vec<RootTypeRule> {
    vec![
        // Assets
        RootTypeRule::new("bs-intangible", "BIva*", RootType::Asset).described("Immateriële vaste activa"),
        RootTypeRule::new("bs-tangible", "BMva*", RootType::Asset).described("Materiële vaste activa"),
        RootTypeRule::new("bs-real-estate", "BVas*", RootType::Asset).described("Vastgoedbeleggingen"),
        RootTypeRule::new("bs-financial-fixed", "BFva*", RootType::Asset).described("Financiële vaste activa"),
        RootTypeRule::new("bs-stock", "BVrd*", RootType::Asset).described("Voorraden"),
        RootTypeRule::new("bs-projects", "BPro*", RootType::Asset).described("Onderhanden projecten"),
        RootTypeRule::new("bs-receivables", "BVor*", RootType::Asset).described("Vorderingen"),
        RootTypeRule::new("bs-securities", "BEff*", RootType::Asset).described("Effecten"),
        RootTypeRule::new("bs-liquid", "BLim*", RootType::Asset).described("Liquide middelen"),
        // Liabilities
        RootTypeRule::new("bs-long-term-debt", "BLas*", RootType::Liability).described("Langlopende schulden"),
        RootTypeRule::new("bs-current-debt", "BSch*", RootType::Liability).described("Kortlopende schulden"),
        RootTypeRule::new("bs-creditors", "BKre*", RootType::Liability).described("Crediteuren"),
        // Equity
        RootTypeRule::new("bs-equity", "BEiv*", RootType::Equity).described("Eigen vermogen"),
        RootTypeRule::new("bs-capital", "BKap*", RootType::Equity).described("Kapitaal"),
        RootTypeRule::new("bs-reserves", "BRes*", RootType::Equity).described("Reserves"),
        // Income
        RootTypeRule::new("pl-turnover", "WOmz*", RootType::Income).described("Netto-omzet"),
        RootTypeRule::new("pl-other-operating-income", "WOvb*", RootType::Income)
            .described("Overige bedrijfsopbrengsten"),
        RootTypeRule::new("pl-revenue", "WOpb*", RootType::Income).described("Opbrengsten"),
    ]
}

/// Provisions (voorzieningen) are liabilities under Dutch GAAP
pub fn default_provisions_override() -> Option<RootTypeRule> {
    Some(RootTypeRule::new("bs-provisions", "BVrz*", RootType::Liability).described("Voorzieningen"))
}

pub fn default_account_type_rules() -> Vec<AccountTypeRule> {
    use AccountType::*;
    use RootType::{Asset, Expense, Liability};

    vec![
        // Assets
        AccountTypeRule::description("asset-accumulated-depreciation", Asset, "cumulatieve afschrijving", AccumulatedDepreciation)
            .with_priority(30),
        AccountTypeRule::code("asset-cash", Asset, "BLimKas*", Cash).with_priority(20),
        AccountTypeRule::code("asset-bank", Asset, "BLim*", Bank).with_priority(10),
        AccountTypeRule::code("asset-debtors", Asset, "BVorDeb*", Receivable).with_priority(10),
        AccountTypeRule::code("asset-intangible", Asset, "BIva*", FixedAsset),
        AccountTypeRule::code("asset-tangible", Asset, "BMva*", FixedAsset),
        AccountTypeRule::code("asset-stock", Asset, "BVrd*", Stock),
        AccountTypeRule::description("asset-bank-keyword", Asset, "bank", Bank).with_priority(-10),
        AccountTypeRule::description("asset-debtor-keyword", Asset, "debiteur", Receivable).with_priority(-10),
        AccountTypeRule::description("asset-stock-keyword", Asset, "voorraad", Stock).with_priority(-10),
        // Liabilities
        AccountTypeRule::code("liability-creditors", Liability, "BSchCre*", Payable).with_priority(10),
        AccountTypeRule::code("liability-vat", Liability, "BSchBtw*", Tax).with_priority(10),
        AccountTypeRule::code("liability-payroll-tax", Liability, "BSchLhe*", Tax).with_priority(10),
        AccountTypeRule::code("liability-corporate-tax", Liability, "BSchVpb*", Tax).with_priority(10),
        AccountTypeRule::code("liability-taxes-premiums", Liability, "BSchBep*", Tax).with_priority(10),
        AccountTypeRule::description("liability-tax-keyword", Liability, "belasting", Tax).with_priority(-10),
        AccountTypeRule::description("liability-vat-keyword", Liability, "btw", Tax).with_priority(-10),
        AccountTypeRule::description("liability-payroll-keyword", Liability, "loonheffing", Tax).with_priority(-10),
        AccountTypeRule::description("liability-creditor-keyword", Liability, "crediteur", Payable).with_priority(-10),
        AccountTypeRule::description("liability-supplier-keyword", Liability, "leverancier", Payable).with_priority(-10),
        // Expenses
        AccountTypeRule::code("expense-depreciation", Expense, "WAfs*", Depreciation).with_priority(10),
        AccountTypeRule::code("expense-cost-of-sales", Expense, "WKpr*", CostOfGoodsSold).with_priority(10),
        AccountTypeRule::code("expense-taxes", Expense, "WBel*", Tax).with_priority(10),
        AccountTypeRule::description("expense-depreciation-keyword", Expense, "afschrijving", Depreciation)
            .with_priority(-10),
        AccountTypeRule::description("expense-tax-keyword", Expense, "belasting", Tax).with_priority(-10),
    ]
}

pub fn default_concept_keyword_rules() -> Vec<ConceptKeywordRule> {
    use AccountType::*;
    use RootType::{Asset, Expense, Liability};

    vec![
        ConceptKeywordRule::new("concept-cash", Asset, "cash", Cash),
        ConceptKeywordRule::new("concept-bank", Asset, "bank", Bank),
        ConceptKeywordRule::new("concept-receivable", Asset, "receivable", Receivable),
        ConceptKeywordRule::new("concept-inventory", Asset, "inventor", Stock),
        ConceptKeywordRule::new("concept-intangible", Asset, "intangible", FixedAsset),
        ConceptKeywordRule::new("concept-ppe", Asset, "propertyplant", FixedAsset),
        ConceptKeywordRule::new("concept-payable", Liability, "payable", Payable),
        ConceptKeywordRule::new("concept-liability-tax", Liability, "tax", Tax),
        ConceptKeywordRule::new("concept-depreciation", Expense, "depreciation", Depreciation),
        ConceptKeywordRule::new("concept-amortisation", Expense, "amortisation", Depreciation),
        ConceptKeywordRule::new("concept-cost-of-sales", Expense, "costofsales", CostOfGoodsSold),
    ]
}

// ============================================================================
// TESTS
// ============================================================================
