// 🌳 Hierarchy Resolver
// Parent links derived from the shape of the code string alone.
//
//   B → BIva → BIvaKou → BIvaKouOnd
//   1 char root, then one 3-char segment per level
//
// `stable_number` and `external_reference` never take part in this.

use crate::loader::ReferenceDataset;
use crate::warnings::{PipelineWarning, WarningKind, Warnings};
use std::collections::BTreeMap;

/// Characters added per level below the root
pub const SEGMENT_LEN: usize = 3;

/// Level of mutation (leaf) accounts
pub const LEAF_LEVEL: u8 = 5;

// ============================================================================
// CODE STRUCTURE
// ============================================================================

/// Root codes are a single character ("B", "W")
pub fn is_root_code(code: &str) -> bool {
    code.chars().count() <= 1
}

/// A code is well formed when it is one root character followed by whole
/// 3-character segments
pub fn is_well_formed(code: &str) -> bool {
    let len = code.chars().count();
    len >= 1 && (len - 1) % SEGMENT_LEN == 0
}

/// Candidate parent code, without checking that it exists.
///
/// Pure function of the string: `"BIva"` → `"B"`, `"BIvaKou"` → `"BIva"`,
/// roots → `None`.
pub fn derive_parent_code(code: &str) -> Option<String> {
    if is_root_code(code) {
        return None;
    }

    let chars: Vec<char> = code.chars().collect();
    if chars.len() <= 1 + SEGMENT_LEN {
        return Some(chars[0].to_string());
    }

    Some(chars[..chars.len() - SEGMENT_LEN].iter().collect())
}

// ============================================================================
// HIERARCHY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    parents: BTreeMap<String, Option<String>>,
    /// Sorted by (sort_key, code)
    children: BTreeMap<String, Vec<String>>,
    groups: BTreeMap<String, bool>,
    roots: Vec<String>,
}

impl Hierarchy {
    /// Resolve the whole dataset in one pass.
    ///
    /// Never fails: malformed codes become extra roots, missing parents make
    /// orphans, and both are reported through `warnings`.
    pub fn resolve(dataset: &ReferenceDataset, warnings: &mut Warnings) -> Self {
        let mut hierarchy = Hierarchy::default();

        for code in dataset.records.keys() {
            let parent = if !is_well_formed(code) {
                warnings.push(
                    PipelineWarning::new(
                        WarningKind::MalformedCode,
                        format!("{} is not a root followed by {}-character segments; treating it as a root", code, SEGMENT_LEN),
                    )
                    .for_code(code),
                );
                None
            } else {
                match derive_parent_code(code) {
                    Some(parent) if dataset.contains(&parent) => Some(parent),
                    Some(parent) => {
                        warnings.push(
                            PipelineWarning::new(
                                WarningKind::OrphanedNode,
                                format!("parent {} of {} is not in the dataset", parent, code),
                            )
                            .for_code(code),
                        );
                        None
                    }
                    None => None,
                }
            };

            match &parent {
                Some(parent) => hierarchy.children.entry(parent.clone()).or_default().push(code.clone()),
                None => hierarchy.roots.push(code.clone()),
            }
            hierarchy.parents.insert(code.clone(), parent);
        }

        let sort_key = |code: &String| {
            let key = dataset.get(code).map(|r| r.sort_key.clone()).unwrap_or_default();
            (key, code.clone())
        };
        for siblings in hierarchy.children.values_mut() {
            siblings.sort_by_key(sort_key);
        }
        hierarchy.roots.sort_by_key(sort_key);

        for (code, record) in &dataset.records {
            let has_children = hierarchy.children.get(code).is_some_and(|c| !c.is_empty());
            let declared_group = record.level < LEAF_LEVEL;

            if !declared_group && has_children {
                warnings.push(
                    PipelineWarning::new(
                        WarningKind::LeafWithChildren,
                        format!("{} is a level {} leaf but has children; treating it as a group", code, record.level),
                    )
                    .for_code(code),
                );
            }
            if declared_group && !has_children {
                warnings.push(
                    PipelineWarning::new(WarningKind::EmptyGroup, format!("group {} has no children", code))
                        .for_code(code),
                );
            }

            hierarchy.groups.insert(code.clone(), declared_group || has_children);
        }

        tracing::info!(
            records = hierarchy.parents.len(),
            roots = hierarchy.roots.len(),
            "resolved hierarchy"
        );

        hierarchy
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.parents.contains_key(code)
    }

    /// Resolved parent; `None` for roots, orphans and unknown codes
    pub fn parent_of(&self, code: &str) -> Option<&str> {
        self.parents.get(code).and_then(|p| p.as_deref())
    }

    pub fn children_of(&self, code: &str) -> &[String] {
        self.children.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_group(&self, code: &str) -> bool {
        self.groups.get(code).copied().unwrap_or(false)
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Ancestor chain, nearest first
    pub fn ancestors(&self, code: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.parent_of(code);
        while let Some(parent) = current {
            chain.push(parent.to_string());
            current = self.parent_of(parent);
        }
        chain
    }

    /// Every code below `code`, in topological order
    pub fn descendants(&self, code: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<&String> = self.children_of(code).iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next.clone());
            stack.extend(self.children_of(next).iter().rev());
        }
        out
    }

    /// Depth-first preorder from the roots; parents always precede their
    /// children and siblings follow (sort_key, code)
    pub fn topological_order(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.parents.len());
        let mut stack: Vec<&String> = self.roots.iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next.clone());
            stack.extend(self.children_of(next).iter().rev());
        }
        out
    }
}

// ============================================================================
// TESTS
// ============================================================================
