// 🧭 Classification Engine
// Root type, account type, report type and normal balance for every record.
//
// Root type, strict priority order:
//   1. the record's own concept mapping          → Explicit
//   2. provisions override (configurable)        → Inferred
//   3. structural code rules                     → Inferred
//   4. nearest ancestor with a concept decision  → Inferred
//   5. root-letter default                       → Inferred
//
// Account type: code/description rules → concept keywords → root default.
//
// Classification never fails. It is advisory: anything marked Inferred was
// placed by heuristics, not by the audited legal-basis table.

use crate::config::EngineConfig;
use crate::hierarchy::Hierarchy;
use crate::loader::ReferenceDataset;
use crate::record::{
    AccountType, ClassificationConfidence, ConceptMapping, NormalBalance, ReferenceRecord,
    ReportType, ResolvedClassification, RootType,
};
use crate::rules::{by_priority, AccountTypeRule, ConceptKeywordRule, RootTypeRule};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ============================================================================
// DECISIONS
// ============================================================================

/// Outcome of the root-type chain, with the rule that decided it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootTypeDecision {
    pub root_type: RootType,
    pub confidence: ClassificationConfidence,
    pub rule: String,
}

impl RootTypeDecision {
    fn inferred(root_type: RootType, rule: impl Into<String>) -> Self {
        RootTypeDecision {
            root_type,
            confidence: ClassificationConfidence::Inferred,
            rule: rule.into(),
        }
    }
}

fn concept_rule_id(root_type: RootType) -> String {
    format!("concept-{}", root_type.as_str().to_lowercase())
}

// ============================================================================
// CLASSIFICATION ENGINE
// ============================================================================

/// Stateless per-record classifier. Rule tables are sorted once at
/// construction; nothing is cached between records.
pub struct ClassificationEngine<'a> {
    config: &'a EngineConfig,
    root_rules: Vec<RootTypeRule>,
    account_rules: Vec<AccountTypeRule>,
    keyword_rules: Vec<ConceptKeywordRule>,
}

impl<'a> ClassificationEngine<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        ClassificationEngine {
            config,
            root_rules: by_priority(&config.root_type_rules, |r| r.priority),
            account_rules: by_priority(&config.account_type_rules, |r| r.priority),
            keyword_rules: by_priority(&config.concept_keyword_rules, |r| r.priority),
        }
    }

    /// Depends on the first character of the code only
    pub fn report_type(&self, code: &str) -> ReportType {
        match code.chars().next() {
            Some(c) if c == self.config.profit_and_loss_root => ReportType::ProfitAndLoss,
            _ => ReportType::BalanceSheet,
        }
    }

    pub fn normal_balance(&self, polarity_raw: &str) -> NormalBalance {
        let polarity = polarity_raw.trim();
        if polarity.is_empty() {
            NormalBalance::Unset
        } else if polarity.eq_ignore_ascii_case(&self.config.debit_marker) {
            NormalBalance::Debit
        } else if polarity.eq_ignore_ascii_case(&self.config.credit_marker) {
            NormalBalance::Credit
        } else {
            NormalBalance::Unset
        }
    }

    /// Concept tier: first marker (in table order) that matches any tag.
    /// Only markers whose root type belongs on `report_type` are tried, so a
    /// balance-sheet code never lands on Income or Expense and vice versa.
    pub fn concept_root_type(&self, report_type: ReportType, concepts: &[ConceptMapping]) -> Option<RootType> {
        self.config
            .concept_markers
            .iter()
            .filter(|marker| marker.root_type.report_type() == report_type)
            .find(|marker| concepts.iter().any(|c| marker.matches(&c.concept)))
            .map(|marker| marker.root_type)
    }

    pub fn root_type(
        &self,
        record: &ReferenceRecord,
        dataset: &ReferenceDataset,
        hierarchy: &Hierarchy,
    ) -> RootTypeDecision {
        let code = record.code.as_str();
        let report_type = self.report_type(code);

        if let Some(root_type) = self.concept_root_type(report_type, dataset.concepts_for(code)) {
            return RootTypeDecision {
                root_type,
                confidence: ClassificationConfidence::Explicit,
                rule: concept_rule_id(root_type),
            };
        }

        if let Some(rule) = self.config.provisions_override.as_ref().filter(|r| r.matches(code)) {
            return RootTypeDecision::inferred(rule.root_type, rule.id.clone());
        }

        if let Some(rule) = self.root_rules.iter().find(|r| r.matches(code)) {
            return RootTypeDecision::inferred(rule.root_type, rule.id.clone());
        }

        for ancestor in hierarchy.ancestors(code) {
            if let Some(root_type) = self.concept_root_type(report_type, dataset.concepts_for(&ancestor)) {
                return RootTypeDecision::inferred(root_type, format!("inherited-concept:{}", ancestor));
            }
        }

        match code.chars().next() {
            Some(c) if c == self.config.balance_sheet_root => {
                RootTypeDecision::inferred(RootType::Asset, "default-balance-sheet")
            }
            Some(c) if c == self.config.profit_and_loss_root => {
                RootTypeDecision::inferred(RootType::Expense, "default-profit-and-loss")
            }
            _ => RootTypeDecision::inferred(RootType::Asset, "default-unknown-root"),
        }
    }

    /// Account type for a record whose root type is already known
    pub fn account_type(
        &self,
        record: &ReferenceRecord,
        root_type: RootType,
        concepts: &[ConceptMapping],
    ) -> (AccountType, String) {
        let mut descriptions = vec![record.short_label.as_str()];
        if let Some(long_label) = record.long_label.as_deref() {
            descriptions.push(long_label);
        }

        if let Some(rule) = self
            .account_rules
            .iter()
            .filter(|r| r.root_type == root_type)
            .find(|r| r.matches(&record.code, &descriptions))
        {
            return (rule.account_type, rule.id.clone());
        }

        if let Some(rule) = self
            .keyword_rules
            .iter()
            .filter(|r| r.root_type == root_type)
            .find(|r| concepts.iter().flat_map(ConceptMapping::texts).any(|text| r.matches(text)))
        {
            return (rule.account_type, rule.id.clone());
        }

        (
            self.config.default_account_type(root_type),
            format!("default-{}", root_type.as_str().to_lowercase()),
        )
    }

    pub fn classify(
        &self,
        record: &ReferenceRecord,
        dataset: &ReferenceDataset,
        hierarchy: &Hierarchy,
    ) -> ResolvedClassification {
        let decision = self.root_type(record, dataset, hierarchy);
        let (account_type, account_type_rule) =
            self.account_type(record, decision.root_type, dataset.concepts_for(&record.code));

        tracing::debug!(
            code = %record.code,
            root_type = decision.root_type.as_str(),
            account_type = account_type.as_str(),
            rule = %decision.rule,
            "classified record"
        );

        ResolvedClassification {
            parent_code: hierarchy.parent_of(&record.code).map(str::to_string),
            is_group: hierarchy.is_group(&record.code),
            root_type: decision.root_type,
            account_type,
            report_type: self.report_type(&record.code),
            normal_balance: self.normal_balance(&record.polarity_raw),
            classification_confidence: decision.confidence,
            root_type_rule: decision.rule,
            account_type_rule,
            record: record.clone(),
        }
    }

    /// Classify every record, parents before children
    pub fn classify_all(&self, dataset: &ReferenceDataset, hierarchy: &Hierarchy) -> ClassificationSet {
        let items = hierarchy
            .topological_order()
            .iter()
            .filter_map(|code| dataset.get(code))
            .map(|record| self.classify(record, dataset, hierarchy))
            .collect();

        ClassificationSet::new(items)
    }
}

// ============================================================================
// CLASSIFICATION SET
// ============================================================================

/// Full resolved set in topological order, indexed by code
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClassificationSet {
    items: Vec<ResolvedClassification>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
}

impl ClassificationSet {
    pub fn new(items: Vec<ResolvedClassification>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.code().to_string(), idx))
            .collect();
        ClassificationSet { items, index }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&ResolvedClassification> {
        self.index.get(code).map(|idx| &self.items[*idx])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedClassification> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[ResolvedClassification] {
        &self.items
    }

    pub fn inferred_count(&self) -> usize {
        self.items.iter().filter(|c| c.is_inferred()).count()
    }

    /// SHA-256 over the canonical JSON of the ordered set
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&self.items)?);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warnings::Warnings;

    fn build(records: Vec<ReferenceRecord>, concepts: Vec<ConceptMapping>) -> (ReferenceDataset, Hierarchy) {
        let dataset = ReferenceDataset::from_records(records, concepts).unwrap();
        let hierarchy = Hierarchy::resolve(&dataset, &mut Warnings::new());
        (dataset, hierarchy)
    }

    fn classify_with(config: &EngineConfig, records: Vec<ReferenceRecord>, concepts: Vec<ConceptMapping>) -> ClassificationSet {
        let (dataset, hierarchy) = build(records, concepts);
        ClassificationEngine::new(config).classify_all(&dataset, &hierarchy)
    }

    fn base_records() -> Vec<ReferenceRecord> {
        vec![
            ReferenceRecord::new("B", "Balans", 1).with_polarity("D"),
            ReferenceRecord::new("W", "Winst- en verliesrekening", 1).with_polarity("C"),
        ]
    }

    #[test]
    fn test_balance_sheet_root() {
        let set = classify_with(&EngineConfig::default(), base_records(), vec![]);
        let root = set.get("B").unwrap();

        assert_eq!(root.parent_code, None);
        assert!(root.is_group);
        assert_eq!(root.report_type, ReportType::BalanceSheet);
        assert_eq!(root.root_type, RootType::Asset);
        assert_eq!(root.normal_balance, NormalBalance::Debit);
        assert_eq!(root.root_type_rule, "default-balance-sheet");
    }

    #[test]
    fn test_structural_asset_rule() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("BIva", "Immateriële vaste activa", 2));
        records.push(ReferenceRecord::new("BIvaKou", "Kosten van oprichting", 3));

        let set = classify_with(&EngineConfig::default(), records, vec![]);
        let record = set.get("BIvaKou").unwrap();

        assert_eq!(record.parent_code.as_deref(), Some("BIva"));
        assert_eq!(record.root_type, RootType::Asset);
        assert_eq!(record.account_type, AccountType::FixedAsset);
        assert_eq!(record.classification_confidence, ClassificationConfidence::Inferred);
        assert_eq!(record.root_type_rule, "bs-intangible");
    }

    #[test]
    fn test_turnover_is_income() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("WOmz", "Netto-omzet", 2));
        records.push(ReferenceRecord::new("WOmzPro", "Omzet productie", 3));

        let set = classify_with(&EngineConfig::default(), records, vec![]);
        let record = set.get("WOmzPro").unwrap();

        assert_eq!(record.report_type, ReportType::ProfitAndLoss);
        assert_eq!(record.root_type, RootType::Income);
        assert_eq!(record.account_type, AccountType::IncomeAccount);
    }

    #[test]
    fn test_unmatched_profit_and_loss_defaults_to_expense() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("WPer", "Lasten uit hoofde van personeelsbeloningen", 2));

        let set = classify_with(&EngineConfig::default(), records, vec![]);
        let record = set.get("WPer").unwrap();
        assert_eq!(record.root_type, RootType::Expense);
        assert_eq!(record.account_type, AccountType::ExpenseAccount);
        assert_eq!(record.root_type_rule, "default-profit-and-loss");
    }

    #[test]
    fn test_concept_tier_beats_structural_asset_default() {
        let config = EngineConfig {
            provisions_override: None,
            ..EngineConfig::default()
        };
        let mut records = base_records();
        records.push(ReferenceRecord::new("BVrz", "Voorzieningen", 2));
        let concepts = vec![ConceptMapping::new("BVrz", "jenv-bw2-i_Liabilities")];

        let set = classify_with(&config, records, concepts);
        let record = set.get("BVrz").unwrap();

        assert_eq!(record.root_type, RootType::Liability);
        assert_eq!(record.classification_confidence, ClassificationConfidence::Explicit);
        assert_eq!(record.root_type_rule, "concept-liability");
    }

    #[test]
    fn test_concept_tier_beats_matching_structural_rule() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("BIva", "Immateriële vaste activa", 2));
        let concepts = vec![ConceptMapping::new("BIva", "jenv-bw2-i_Liabilities")];

        let set = classify_with(&EngineConfig::default(), records, concepts);
        assert_eq!(set.get("BIva").unwrap().root_type, RootType::Liability);
    }

    #[test]
    fn test_concept_markers_stay_on_their_statement() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("WAfs", "Afschrijvingen", 2));
        records.push(ReferenceRecord::new("WAfsBij", "Bijzondere waardeverminderingen", 3));
        records.push(ReferenceRecord::new("BSch", "Schulden", 2));
        records.push(ReferenceRecord::new("BSchVop", "Vooruitontvangen opbrengsten", 3));
        let concepts = vec![
            ConceptMapping::new("WAfsBij", "jenv-bw2-i_ImpairmentIntangibleAssets"),
            ConceptMapping::new("BSchVop", "jenv-bw2-i_DeferredIncome"),
        ];

        let set = classify_with(&EngineConfig::default(), records, concepts);

        let impairment = set.get("WAfsBij").unwrap();
        assert_eq!(impairment.report_type, ReportType::ProfitAndLoss);
        assert_eq!(impairment.root_type, RootType::Expense);
        assert_eq!(impairment.root_type_rule, "default-profit-and-loss");

        let deferred = set.get("BSchVop").unwrap();
        assert_eq!(deferred.report_type, ReportType::BalanceSheet);
        assert_eq!(deferred.root_type, RootType::Liability);
        assert_eq!(deferred.root_type_rule, "bs-current-debt");

        for item in set.iter() {
            assert_eq!(item.root_type.report_type(), item.report_type, "{}", item.code());
        }
    }

    #[test]
    fn test_concept_tier_keeps_priority_within_a_statement() {
        let config = EngineConfig::default();
        let engine = ClassificationEngine::new(&config);
        let concepts = vec![ConceptMapping::new("WOvb", "jenv-bw2-i_OtherOperatingIncomeAndCosts")];

        assert_eq!(engine.concept_root_type(ReportType::ProfitAndLoss, &concepts), Some(RootType::Income));
        assert_eq!(engine.concept_root_type(ReportType::BalanceSheet, &concepts), None);
    }

    #[test]
    fn test_provisions_override_without_concepts() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("BVrz", "Voorzieningen", 2));

        let set = classify_with(&EngineConfig::default(), records.clone(), vec![]);
        let record = set.get("BVrz").unwrap();
        assert_eq!(record.root_type, RootType::Liability);
        assert!(record.is_inferred());
        assert_eq!(record.root_type_rule, "bs-provisions");

        let config = EngineConfig {
            provisions_override: None,
            ..EngineConfig::default()
        };
        let set = classify_with(&config, records, vec![]);
        assert_eq!(set.get("BVrz").unwrap().root_type, RootType::Asset);
    }

    #[test]
    fn test_ancestor_concept_is_inherited() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("BXyz", "Overige", 2));
        records.push(ReferenceRecord::new("BXyzAbc", "Overige schulden", 3));
        let concepts = vec![ConceptMapping::new("BXyz", "jenv-bw2-i_Equity")];

        let set = classify_with(&EngineConfig::default(), records, concepts);
        let child = set.get("BXyzAbc").unwrap();

        assert_eq!(child.root_type, RootType::Equity);
        assert_eq!(child.classification_confidence, ClassificationConfidence::Inferred);
        assert_eq!(child.root_type_rule, "inherited-concept:BXyz");
        assert_eq!(set.get("BXyz").unwrap().classification_confidence, ClassificationConfidence::Explicit);
    }

    #[test]
    fn test_account_type_rules_follow_priority() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("BLim", "Liquide middelen", 2));
        records.push(ReferenceRecord::new("BLimKas", "Kasmiddelen", 3));
        records.push(ReferenceRecord::new("BLimBan", "Tegoeden op bankrekeningen", 3));
        records.push(ReferenceRecord::new("BSch", "Schulden", 2));
        records.push(ReferenceRecord::new("BSchBtw", "Te betalen omzetbelasting", 3));

        let set = classify_with(&EngineConfig::default(), records, vec![]);

        assert_eq!(set.get("BLimKas").unwrap().account_type, AccountType::Cash);
        assert_eq!(set.get("BLimBan").unwrap().account_type, AccountType::Bank);
        assert_eq!(set.get("BSchBtw").unwrap().root_type, RootType::Liability);
        assert_eq!(set.get("BSchBtw").unwrap().account_type, AccountType::Tax);
    }

    #[test]
    fn test_concept_keywords_pick_account_type() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("BXyz", "Overige", 2));
        let concepts = vec![ConceptMapping::new("BXyz", "jenv-bw2-i_Assets")
            .with_labels(Some("Kas"), Some("Cash and cash equivalents"))];

        let set = classify_with(&EngineConfig::default(), records, concepts);
        let record = set.get("BXyz").unwrap();

        assert_eq!(record.root_type, RootType::Asset);
        assert_eq!(record.account_type, AccountType::Cash);
    }

    #[test]
    fn test_every_record_is_classified() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("X", "Unknown root", 1).with_polarity("?"));
        records.push(ReferenceRecord::new("BQqqZzz", "Orphan", 3));
        records.push(ReferenceRecord::new("WQq", "Malformed", 2));

        let set = classify_with(&EngineConfig::default(), records, vec![]);
        assert_eq!(set.len(), 5);

        let unknown = set.get("X").unwrap();
        assert_eq!(unknown.report_type, ReportType::BalanceSheet);
        assert_eq!(unknown.root_type, RootType::Asset);
        assert_eq!(unknown.normal_balance, NormalBalance::Unset);
    }

    #[test]
    fn test_report_type_ignores_everything_but_the_first_letter() {
        let config = EngineConfig::default();
        let engine = ClassificationEngine::new(&config);

        assert_eq!(engine.report_type("WOmz"), ReportType::ProfitAndLoss);
        assert_eq!(engine.report_type("W"), ReportType::ProfitAndLoss);
        assert_eq!(engine.report_type("BWOmz"), ReportType::BalanceSheet);
        assert_eq!(engine.report_type(""), ReportType::BalanceSheet);
    }

    #[test]
    fn test_normal_balance_is_trimmed_and_case_insensitive() {
        let config = EngineConfig::default();
        let engine = ClassificationEngine::new(&config);

        assert_eq!(engine.normal_balance(" d "), NormalBalance::Debit);
        assert_eq!(engine.normal_balance("C"), NormalBalance::Credit);
        assert_eq!(engine.normal_balance(""), NormalBalance::Unset);
        assert_eq!(engine.normal_balance("X"), NormalBalance::Unset);
    }

    #[test]
    fn test_set_is_topological_and_fingerprint_is_stable() {
        let mut records = base_records();
        records.push(ReferenceRecord::new("BIvaKou", "Kosten van oprichting", 3));
        records.push(ReferenceRecord::new("BIva", "Immateriële vaste activa", 2));

        let first = classify_with(&EngineConfig::default(), records.clone(), vec![]);
        let second = classify_with(&EngineConfig::default(), records, vec![]);

        let codes: Vec<&str> = first.iter().map(|c| c.code()).collect();
        assert_eq!(codes, vec!["B", "BIva", "BIvaKou", "W"]);
        assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
        assert_eq!(first.fingerprint().unwrap().len(), 64);
    }
}
