// ⚙️ Engine Configuration
// Root letters, vocabularies and pattern tables as data.
//
// Every field has a built-in default, so a JSON config file only needs the
// keys it wants to change:
//
//   { "provisions_override": null }
//
// turns the provisions rule off and lets voorzieningen fall through to the
// balance-sheet default.

use crate::record::{AccountType, Applicability, RecordStatus, RootType};
use crate::rules::{
    default_account_type_rules, default_concept_keyword_rules, default_concept_markers,
    default_provisions_override, default_root_type_rules, AccountTypeRule, ConceptKeywordRule,
    ConceptMarker, RootTypeRule,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Environment variable naming a JSON config file
pub const CONFIG_ENV_VAR: &str = "RGS_ENGINE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// First letter of every balance-sheet code ("B" = Balans)
    pub balance_sheet_root: char,

    /// First letter of every profit-and-loss code ("W" = Winst & verlies)
    pub profit_and_loss_root: char,

    pub debit_marker: String,
    pub credit_marker: String,

    /// Raw status code → status
    pub status_codes: BTreeMap<String, RecordStatus>,

    /// Raw entity flag → applicability
    pub applicability_codes: BTreeMap<String, Applicability>,

    /// Raw value of the extended-set column that marks a record as extended
    pub extended_marker: String,

    /// Concept tier, evaluated in list order
    pub concept_markers: Vec<ConceptMarker>,

    /// Structural tier
    pub root_type_rules: Vec<RootTypeRule>,

    /// Checked before the structural tier; `None` disables it
    pub provisions_override: Option<RootTypeRule>,

    pub account_type_rules: Vec<AccountTypeRule>,
    pub concept_keyword_rules: Vec<ConceptKeywordRule>,

    /// Last resort account type per root type
    pub default_account_types: BTreeMap<RootType, AccountType>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            balance_sheet_root: 'B',
            profit_and_loss_root: 'W',
            debit_marker: "D".to_string(),
            credit_marker: "C".to_string(),
            status_codes: BTreeMap::from([
                ("A".to_string(), RecordStatus::Active),
                ("P".to_string(), RecordStatus::Passive),
                ("V".to_string(), RecordStatus::Obsolete),
            ]),
            applicability_codes: BTreeMap::from([
                ("J".to_string(), Applicability::Standard),
                ("P".to_string(), Applicability::Extended),
                ("N".to_string(), Applicability::NotApplicable),
            ]),
            extended_marker: "J".to_string(),
            concept_markers: default_concept_markers(),
            root_type_rules: default_root_type_rules(),
            provisions_override: default_provisions_override(),
            account_type_rules: default_account_type_rules(),
            concept_keyword_rules: default_concept_keyword_rules(),
            default_account_types: BTreeMap::from([
                (RootType::Asset, AccountType::CurrentAsset),
                (RootType::Liability, AccountType::CurrentLiability),
                (RootType::Equity, AccountType::Equity),
                (RootType::Income, AccountType::IncomeAccount),
                (RootType::Expense, AccountType::ExpenseAccount),
            ]),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(content).context("Failed to parse engine config JSON")?;
        Ok(config)
    }

    /// Config file from RGS_ENGINE_CONFIG, or the built-in tables
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Map a raw status code ("A", " p ") to a status
    pub fn status_for(&self, raw: &str) -> Option<RecordStatus> {
        lookup_code(&self.status_codes, raw)
    }

    /// Map a raw entity flag ("J", "n") to an applicability
    pub fn applicability_for(&self, raw: &str) -> Option<Applicability> {
        lookup_code(&self.applicability_codes, raw)
    }

    /// Account type used when no rule matched
    pub fn default_account_type(&self, root_type: RootType) -> AccountType {
        match self.default_account_types.get(&root_type) {
            Some(account_type) => *account_type,
            None => match root_type {
                RootType::Asset => AccountType::CurrentAsset,
                RootType::Liability => AccountType::CurrentLiability,
                RootType::Equity => AccountType::Equity,
                RootType::Income => AccountType::IncomeAccount,
                RootType::Expense => AccountType::ExpenseAccount,
            },
        }
    }
}

fn lookup_code<T: Copy>(table: &BTreeMap<String, T>, raw: &str) -> Option<T> {
    let raw = raw.trim();
    table
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(raw))
        .map(|(_, value)| *value)
}

// ============================================================================
// TESTS
// ============================================================================
