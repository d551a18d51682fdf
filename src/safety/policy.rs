//! Operation categories and their confirmation policies.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Risk level attached to an operation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Get numeric value for comparison.
    fn value(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Ord for RiskLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value().cmp(&other.value())
    }
}

impl PartialOrd for RiskLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of operation categories the gate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    FileDelete,
    FileModify,
    ShellCommand,
    ApiCall,
    SendMessage,
    DatabaseWrite,
    SystemConfig,
    Payment,
    Unknown,
}

impl OperationCategory {
    pub const ALL: [OperationCategory; 9] = [
        Self::FileDelete,
        Self::FileModify,
        Self::ShellCommand,
        Self::ApiCall,
        Self::SendMessage,
        Self::DatabaseWrite,
        Self::SystemConfig,
        Self::Payment,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileDelete => "file_delete",
            Self::FileModify => "file_modify",
            Self::ShellCommand => "shell_command",
            Self::ApiCall => "api_call",
            Self::SendMessage => "send_message",
            Self::DatabaseWrite => "database_write",
            Self::SystemConfig => "system_config",
            Self::Payment => "payment",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown operation category '{}'", s))
    }
}

/// How the gate treats one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationPolicy {
    pub level: RiskLevel,
    pub require_confirm: bool,
    #[serde(rename = "timeout_seconds", serialize_with = "serialize_secs")]
    pub timeout: Duration,
    pub description: &'static str,
}

impl OperationPolicy {
    pub const fn new(
        level: RiskLevel,
        require_confirm: bool,
        timeout_secs: u64,
        description: &'static str,
    ) -> Self {
        Self {
            level,
            require_confirm,
            timeout: Duration::from_secs(timeout_secs),
            description,
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Category to policy lookup. Fixed once constructed.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<OperationCategory, OperationPolicy>,
}

impl PolicyTable {
    /// Build a table from explicit entries. Categories left out fall back to
    /// the default table's entry.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (OperationCategory, OperationPolicy)>,
    ) -> Self {
        let mut table = Self::default();
        table.policies.extend(entries);
        table
    }

    /// Look up the policy for a category.
    pub fn get(&self, category: OperationCategory) -> &OperationPolicy {
        // Every category is populated by `Default`; `Unknown` is the fallback.
        self.policies
            .get(&category)
            .or_else(|| self.policies.get(&OperationCategory::Unknown))
            .unwrap_or(&UNKNOWN_POLICY)
    }

    /// All entries, in category declaration order.
    pub fn entries(&self) -> Vec<(OperationCategory, &OperationPolicy)> {
        OperationCategory::ALL
            .into_iter()
            .map(|c| (c, self.get(c)))
            .collect()
    }
}

const UNKNOWN_POLICY: OperationPolicy =
    OperationPolicy::new(RiskLevel::Low, false, 60, "Unrecognised operation");

impl Default for PolicyTable {
    fn default() -> Self {
        use OperationCategory as C;
        use RiskLevel as L;

        let policies = HashMap::from([
            (
                C::FileDelete,
                OperationPolicy::new(L::High, true, 300, "Delete files or directories"),
            ),
            (
                C::FileModify,
                OperationPolicy::new(L::Medium, true, 300, "Modify files in protected locations"),
            ),
            (
                C::ShellCommand,
                OperationPolicy::new(L::High, true, 300, "Run a destructive shell command"),
            ),
            (
                C::ApiCall,
                OperationPolicy::new(L::Low, false, 60, "Call an external API"),
            ),
            (
                C::SendMessage,
                OperationPolicy::new(L::Medium, true, 300, "Send a message on the user's behalf"),
            ),
            (
                C::DatabaseWrite,
                OperationPolicy::new(L::High, true, 300, "Mutate database contents"),
            ),
            (
                C::SystemConfig,
                OperationPolicy::new(L::Critical, true, 600, "Change system configuration"),
            ),
            (
                C::Payment,
                OperationPolicy::new(L::Critical, true, 600, "Move money"),
            ),
            (C::Unknown, UNKNOWN_POLICY),
        ]);

        Self { policies }
    }
}
