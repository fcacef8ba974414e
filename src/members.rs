use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::store::RecordStore;

pub const MEMBER_HEADER: &[&str] = &["Name", "Photo", "Role", "Bio"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub photo: String,
    pub role: String,
    pub bio: String,
}

impl Member {
    fn from_row(row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        Member {
            name: cell(0),
            photo: cell(1),
            role: cell(2),
            bio: cell(3),
        }
    }
}

/// Read-only view of the members worksheet.
#[derive(Debug, Clone, Default)]
pub struct MemberDirectory {
    members: Vec<Member>,
}

impl MemberDirectory {
    pub fn new(members: Vec<Member>) -> Self {
        MemberDirectory { members }
    }

    /// Loads every row with a non-blank name.
    pub fn load<S: RecordStore>(store: &S) -> Result<Self> {
        let members = store
            .read_all()?
            .iter()
            .map(|row| Member::from_row(row))
            .filter(|m| !m.name.is_empty())
            .collect();
        Ok(MemberDirectory { members })
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.trim();
        self.members.iter().any(|m| m.name == name)
    }

    /// Rejects any performer not listed in the directory.
    pub fn validate_performers(&self, performers: &[String]) -> Result<()> {
        let unknown: Vec<&str> = performers
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty() && !self.contains(p))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::validation(format!(
                "unknown performers: {}",
                unknown.join(", ")
            )))
        }
    }
}
