// 📋 Template Selector
// Entity-specific and ad hoc subsets of a classification set.
//
// Steps, in order:
//   1. base filter    entity applicability, status, max level, core only
//   2. overrides      include adds codes, exclude drops codes + subtrees
//   3. closure        every ancestor of a selected record is added
//
// Output keeps the set's topological order, so parents always come first.

use crate::classify::ClassificationSet;
use crate::record::{EntityCategory, RecordStatus, ResolvedClassification};
use crate::warnings::{PipelineWarning, WarningKind, Warnings};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// TEMPLATE REQUEST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub name: String,

    /// `None` selects from the full set (ad hoc template)
    pub category: Option<EntityCategory>,

    /// Accepted statuses; Active only by default
    pub statuses: BTreeSet<RecordStatus>,

    /// Drop base records deeper than this level
    pub max_level: Option<u8>,

    /// Drop records from the extended superset
    pub core_only: bool,

    pub include: BTreeSet<String>,

    /// Removes the code and everything below it; wins over `include`
    pub exclude: BTreeSet<String>,
}

impl TemplateRequest {
    /// Standard template for one legal-entity category
    pub fn for_entity(category: EntityCategory) -> Self {
        TemplateRequest {
            name: category.code().to_string(),
            category: Some(category),
            ..Self::custom("")
        }
    }

    /// Ad hoc template over the whole set
    pub fn custom(name: impl Into<String>) -> Self {
        TemplateRequest {
            name: name.into(),
            category: None,
            statuses: BTreeSet::from([RecordStatus::Active]),
            max_level: None,
            core_only: false,
            include: BTreeSet::new(),
            exclude: BTreeSet::new(),
        }
    }

    /// Builder: accept every status
    pub fn include_inactive(mut self) -> Self {
        self.statuses = BTreeSet::from([RecordStatus::Active, RecordStatus::Passive, RecordStatus::Obsolete]);
        self
    }

    /// Builder: accept exactly these statuses
    pub fn with_statuses(mut self, statuses: &[RecordStatus]) -> Self {
        self.statuses = statuses.iter().copied().collect();
        self
    }

    /// Builder: limit depth
    pub fn with_max_level(mut self, level: u8) -> Self {
        self.max_level = Some(level);
        self
    }

    /// Builder: core subset only
    pub fn core_only(mut self) -> Self {
        self.core_only = true;
        self
    }

    /// Builder: force a code in
    pub fn include(mut self, code: impl Into<String>) -> Self {
        self.include.insert(code.into());
        self
    }

    /// Builder: drop a code and its subtree
    pub fn exclude(mut self, code: impl Into<String>) -> Self {
        self.exclude.insert(code.into());
        self
    }

    fn accepts(&self, item: &ResolvedClassification) -> bool {
        let record = &item.record;

        if let Some(category) = self.category {
            if !record.is_applicable_for(category) {
                return false;
            }
        }
        if !self.statuses.contains(&record.status) {
            return false;
        }
        if let Some(max_level) = self.max_level {
            if record.level > max_level {
                return false;
            }
        }
        !(self.core_only && record.extended_flag)
    }
}

// ============================================================================
// TEMPLATE SELECTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSelection {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<EntityCategory>,
    /// Parents before children, siblings by sort key
    pub accounts: Vec<ResolvedClassification>,
    /// Ancestors added only to keep the template a tree
    pub forced_ancestors: Vec<String>,
}

impl TemplateSelection {
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.accounts.iter().any(|a| a.code() == code)
    }

    pub fn codes(&self) -> Vec<&str> {
        self.accounts.iter().map(|a| a.code()).collect()
    }
}

// ============================================================================
// SELECTOR
// ============================================================================

pub struct TemplateSelector<'a> {
    set: &'a ClassificationSet,
    children: BTreeMap<&'a str, Vec<&'a str>>,
}

impl<'a> TemplateSelector<'a> {
    pub fn new(set: &'a ClassificationSet) -> Self {
        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for item in set.iter() {
            if let Some(parent) = item.parent_code.as_deref() {
                children.entry(parent).or_default().push(item.code());
            }
        }
        TemplateSelector { set, children }
    }

    pub fn select(&self, request: &TemplateRequest, warnings: &mut Warnings) -> TemplateSelection {
        let mut selected: BTreeSet<&str> = self
            .set
            .iter()
            .filter(|item| request.accepts(item))
            .map(|item| item.code())
            .collect();

        for code in &request.include {
            match self.set.get(code) {
                Some(item) => {
                    selected.insert(item.code());
                }
                None => warnings.push(self.unknown_override(request, "include", code)),
            }
        }

        for code in &request.exclude {
            match self.set.get(code) {
                Some(item) => {
                    selected.remove(item.code());
                    for descendant in self.descendants(item.code()) {
                        selected.remove(descendant);
                    }
                }
                None => warnings.push(self.unknown_override(request, "exclude", code)),
            }
        }

        let forced_ancestors = self.close_over_ancestors(&mut selected);
        for code in &forced_ancestors {
            warnings.push(
                PipelineWarning::new(
                    WarningKind::ForcedAncestor,
                    format!("template {} needs ancestor {} to stay a tree", request.name, code),
                )
                .for_code(code),
            );
        }

        let accounts: Vec<ResolvedClassification> = self
            .set
            .iter()
            .filter(|item| selected.contains(item.code()))
            .cloned()
            .collect();

        tracing::info!(
            template = %request.name,
            accounts = accounts.len(),
            forced = forced_ancestors.len(),
            "selected template"
        );

        TemplateSelection {
            name: request.name.clone(),
            category: request.category,
            accounts,
            forced_ancestors,
        }
    }

    /// One template per legal-entity category, in category order
    pub fn entity_templates(&self, warnings: &mut Warnings) -> Vec<TemplateSelection> {
        EntityCategory::ALL
            .into_iter()
            .map(|category| self.select(&TemplateRequest::for_entity(category), warnings))
            .collect()
    }

    fn descendants(&self, code: &'a str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut stack = vec![code];
        while let Some(next) = stack.pop() {
            if let Some(children) = self.children.get(next) {
                out.extend(children.iter().copied());
                stack.extend(children.iter().copied());
            }
        }
        out
    }

    /// Add every missing ancestor; returns the added codes in set order
    fn close_over_ancestors(&self, selected: &mut BTreeSet<&'a str>) -> Vec<String> {
        let mut added: BTreeSet<&str> = BTreeSet::new();

        for code in selected.clone() {
            let mut current = self.set.get(code).and_then(|item| item.parent_code.as_deref());
            while let Some(parent) = current {
                let Some(parent_item) = self.set.get(parent) else {
                    break;
                };
                if selected.contains(parent_item.code()) || added.contains(parent_item.code()) {
                    break;
                }
                added.insert(parent_item.code());
                current = parent_item.parent_code.as_deref();
            }
        }

        selected.extend(added.iter().copied());

        self.set
            .iter()
            .map(|item| item.code())
            .filter(|code| added.contains(code))
            .map(str::to_string)
            .collect()
    }

    fn unknown_override(&self, request: &TemplateRequest, kind: &str, code: &str) -> PipelineWarning {
        PipelineWarning::new(
            WarningKind::UnknownOverrideCode,
            format!("template {} cannot {} unknown code {}", request.name, kind, code),
        )
        .for_code(code)
    }
}

// ============================================================================
// TESTS
// ============================================================================
