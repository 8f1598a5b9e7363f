use std::collections::BTreeMap;

use branchplan_core::BranchId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchMetadata {
    pub branch_id: BranchId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// Lookup of branch metadata by id, supplied by the branch directory service.
pub trait BranchDirectory {
    fn resolve(&self, branch_id: &BranchId) -> Option<BranchMetadata>;

    fn contains(&self, branch_id: &BranchId) -> bool {
        self.resolve(branch_id).is_some()
    }
}

impl<T: BranchDirectory + ?Sized> BranchDirectory for &T {
    fn resolve(&self, branch_id: &BranchId) -> Option<BranchMetadata> {
        (**self).resolve(branch_id)
    }
}

/// A fixed, in-process directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    branches: BTreeMap<BranchId, BranchMetadata>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, branch: BranchMetadata) -> Option<BranchMetadata> {
        self.branches.insert(branch.branch_id.clone(), branch)
    }

    pub fn with_branch(mut self, branch_id: impl Into<BranchId>, name: impl Into<String>) -> Self {
        let branch_id = branch_id.into();
        self.insert(BranchMetadata {
            branch_id,
            name: name.into(),
            address: None,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl BranchDirectory for StaticDirectory {
    fn resolve(&self, branch_id: &BranchId) -> Option<BranchMetadata> {
        self.branches.get(branch_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_branches_only() {
        let dir = StaticDirectory::new()
            .with_branch("B1", "District 1")
            .with_branch("B2", "District 2");
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.resolve(&"B1".into()).unwrap().name, "District 1");
        assert!(dir.contains(&"B2".into()));
        assert!(!dir.contains(&"B9".into()));
    }

    #[test]
    fn later_insert_replaces_metadata() {
        let mut dir = StaticDirectory::new().with_branch("B1", "Old name");
        let previous = dir.insert(BranchMetadata {
            branch_id: "B1".into(),
            name: "New name".into(),
            address: Some("1 Main St".into()),
        });
        assert_eq!(previous.unwrap().name, "Old name");
        assert_eq!(dir.resolve(&"B1".into()).unwrap().address.as_deref(), Some("1 Main St"));
    }
}
