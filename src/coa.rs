// 🗂️ ERPNext chart-of-accounts export
//
// {
//   "country_code": "nl",
//   "name": "Nederlands RGS MKB - BV",
//   "tree": {
//     "Balans": {
//       "rgs_code": "B", "account_type": "Current Asset", "balance_must_be": "Debit",
//       "is_group": 1, "root_type": "Asset",
//       "Immateriële vaste activa": { "account_number": "01000", ... }
//     }
//   }
// }

use crate::record::ResolvedClassification;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const COUNTRY_CODE: &str = "nl";

/// Export switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartOptions {
    /// Write `balance_must_be` from the D/C polarity
    pub enforce_balance: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        ChartOptions { enforce_balance: true }
    }
}

/// Build an ERPNext CoA template from accounts in topological order
pub fn build_chart(name: &str, accounts: &[ResolvedClassification]) -> Value {
    build_chart_with(name, accounts, ChartOptions::default())
}

pub fn build_chart_with(name: &str, accounts: &[ResolvedClassification], options: ChartOptions) -> Value {
    let present: BTreeSet<&str> = accounts.iter().map(|a| a.code()).collect();

    let mut children: BTreeMap<&str, Vec<&ResolvedClassification>> = BTreeMap::new();
    let mut roots = Vec::new();
    for account in accounts {
        match account.parent_code.as_deref() {
            Some(parent) if present.contains(parent) => children.entry(parent).or_default().push(account),
            _ => roots.push(account),
        }
    }

    json!({
        "country_code": COUNTRY_CODE,
        "name": name,
        "tree": Value::Object(subtree(&roots, &children, options, true)),
    })
}

fn subtree(
    siblings: &[&ResolvedClassification],
    children: &BTreeMap<&str, Vec<&ResolvedClassification>>,
    options: ChartOptions,
    top_level: bool,
) -> Map<String, Value> {
    let mut tree = Map::new();

    for account in siblings {
        let mut props = Map::new();
        // ERPNext wants numbers unique per company; the B and W roots carry 0
        if has_account_number(&account.record.stable_number) {
            props.insert("account_number".into(), json!(account.record.stable_number));
        }
        props.insert("rgs_code".into(), json!(account.code()));
        props.insert("account_type".into(), json!(account.account_type.as_str()));
        if options.enforce_balance {
            if let Some(balance) = account.normal_balance.balance_must_be() {
                props.insert("balance_must_be".into(), json!(balance));
            }
        }
        if account.is_group {
            // ERPNext wants 1/0
            props.insert("is_group".into(), json!(1));
        }
        if top_level {
            props.insert("root_type".into(), json!(account.root_type.as_str()));
        }

        if let Some(below) = children.get(account.code()) {
            props.extend(subtree(below, children, options, false));
        }

        let mut key = account.record.display_name().to_string();
        if tree.contains_key(&key) {
            key = format!("{} ({})", key, account.code());
        }
        tree.insert(key, Value::Object(props));
    }

    tree
}

fn has_account_number(stable_number: &str) -> bool {
    !stable_number.trim_start_matches('0').is_empty()
}

/// Accounts in a chart tree, counting nested entries
pub fn count_accounts(tree: &Value) -> usize {
    tree.as_object()
        .map(|entries| {
            entries
                .values()
                .filter(|value| value.is_object())
                .map(|value| 1 + count_accounts(value))
                .sum()
        })
        .unwrap_or(0)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationEngine;
    use crate::config::EngineConfig;
    use crate::hierarchy::Hierarchy;
    use crate::loader::ReferenceDataset;
    use crate::record::ReferenceRecord;
    use crate::warnings::Warnings;

    fn accounts() -> Vec<ResolvedClassification> {
        let config = EngineConfig::default();
        let dataset = ReferenceDataset::from_records(
            vec![
                ReferenceRecord::new("B", "Balans", 1).with_stable_number("0").with_polarity("D"),
                ReferenceRecord::new("BLim", "Liquide middelen", 2).with_stable_number("1000"),
                ReferenceRecord::new("BLimKas", "Kas", 5).with_stable_number("1010").with_polarity("D"),
                ReferenceRecord::new("BLimBan", "Kas", 5).with_stable_number("1020"),
                ReferenceRecord::new("W", "Winst- en verliesrekening", 1).with_polarity("C"),
            ],
            vec![],
        )
        .unwrap();
        let hierarchy = Hierarchy::resolve(&dataset, &mut Warnings::new());
        ClassificationEngine::new(&config)
            .classify_all(&dataset, &hierarchy)
            .as_slice()
            .to_vec()
    }

    #[test]
    fn test_chart_nests_by_parent() {
        let chart = build_chart("RGS MKB", &accounts());

        assert_eq!(chart["country_code"], "nl");
        assert_eq!(chart["name"], "RGS MKB");

        let balans = &chart["tree"]["Balans"];
        assert_eq!(balans["root_type"], "Asset");
        assert_eq!(balans["is_group"], 1);

        let liquid = &balans["Liquide middelen"];
        assert_eq!(liquid["account_number"], "01000");
        assert_eq!(liquid["account_type"], "Bank");
        assert!(liquid.get("root_type").is_none());

        let kas = &liquid["Kas"];
        assert_eq!(kas["rgs_code"], "BLimBan");
        assert!(kas.get("is_group").is_none());
        assert_eq!(liquid["Kas (BLimKas)"]["account_type"], "Cash");
    }

    #[test]
    fn test_zero_account_numbers_are_left_out() {
        let chart = build_chart("RGS MKB", &accounts());

        let balans = &chart["tree"]["Balans"];
        let pl = &chart["tree"]["Winst- en verliesrekening"];
        assert!(balans.get("account_number").is_none());
        assert!(pl.get("account_number").is_none());
        assert_eq!(balans["rgs_code"], "B");
        assert_eq!(balans["Liquide middelen"]["Kas (BLimKas)"]["account_number"], "01010");
    }

    #[test]
    fn test_balance_must_be_follows_polarity() {
        let chart = build_chart("RGS MKB", &accounts());
        let tree = &chart["tree"];

        assert_eq!(tree["Balans"]["balance_must_be"], "Debit");
        assert_eq!(tree["Winst- en verliesrekening"]["balance_must_be"], "Credit");
        assert_eq!(tree["Balans"]["Liquide middelen"]["Kas (BLimKas)"]["balance_must_be"], "Debit");
        // no polarity, no constraint
        assert!(tree["Balans"]["Liquide middelen"].get("balance_must_be").is_none());

        let relaxed = build_chart_with("RGS MKB", &accounts(), ChartOptions { enforce_balance: false });
        assert!(relaxed["tree"]["Balans"].get("balance_must_be").is_none());
        assert!(relaxed["tree"]["Winst- en verliesrekening"].get("balance_must_be").is_none());
    }

    #[test]
    fn test_count_accounts() {
        let chart = build_chart("RGS MKB", &accounts());
        assert_eq!(count_accounts(&chart["tree"]), 5);
    }

    #[test]
    fn test_subset_with_missing_parent_becomes_top_level() {
        let accounts: Vec<ResolvedClassification> =
            accounts().into_iter().filter(|a| a.code() != "B").collect();

        let chart = build_chart("partial", &accounts);
        assert_eq!(chart["tree"]["Liquide middelen"]["root_type"], "Asset");
    }
}
