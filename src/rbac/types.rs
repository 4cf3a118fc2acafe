use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Domain every parentless domain hangs from.
pub const ROOT_DOMAIN: &str = "root";
/// Stored in place of an empty subject: the grant applies to anyone.
pub const NO_SUBJECT: &str = "__nosubject__";
/// Third column of a grouping tuple that encodes a domain edge.
pub const DOMAIN_TAG: &str = "__domain__";
/// Middle column of every role-existence tuple.
pub const ROLE_TAG: &str = "role";

/// Logical relation families. Domain edges and role assignments share the
/// physical `g` family and are told apart by [`DOMAIN_TAG`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// `(parent, child)`
    Domain,
    /// `(subject, role, domain)`
    Role,
    /// `(role, "role", domain)`
    RoleExistence,
}

impl Family {
    /// Name of the physical family, as written to the policy file.
    pub fn ptype(self) -> &'static str {
        match self {
            Family::Domain | Family::Role => "g",
            Family::RoleExistence => "g3",
        }
    }

    /// Number of columns callers pass for this family.
    pub fn arity(self) -> usize {
        match self {
            Family::Domain => 2,
            Family::Role | Family::RoleExistence => 3,
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Family::Domain => "domain",
            Family::Role => "role",
            Family::RoleExistence => "role-existence",
        };
        f.write_str(name)
    }
}

/// A three-column grouping tuple as stored.
pub type Tuple = [String; 3];

/// Insertion-ordered, deduplicated set of tuples.
#[derive(Debug, Clone, Default)]
pub struct TupleSet {
    ordered: Vec<Tuple>,
    index: HashSet<Tuple>,
}

impl TupleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the tuple was already present.
    pub fn insert(&mut self, tuple: Tuple) -> bool {
        if !self.index.insert(tuple.clone()) {
            return false;
        }
        self.ordered.push(tuple);
        true
    }

    /// Returns `false` if the tuple was absent.
    pub fn remove(&mut self, tuple: &Tuple) -> bool {
        if !self.index.remove(tuple) {
            return false;
        }
        self.ordered.retain(|t| t != tuple);
        true
    }

    pub fn contains(&self, tuple: &Tuple) -> bool {
        self.index.contains(tuple)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn clear(&mut self) {
        self.ordered.clear();
        self.index.clear();
    }
}

/// Who a role assignment is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// Domain-wide default grant, stored as [`NO_SUBJECT`].
    Anyone,
    Principal(String),
}

impl Subject {
    /// Empty input means "anyone".
    pub fn from_input(s: &str) -> Self {
        if s.is_empty() || s == NO_SUBJECT {
            Subject::Anyone
        } else {
            Subject::Principal(s.to_string())
        }
    }

    pub fn as_stored(&self) -> &str {
        match self {
            Subject::Anyone => NO_SUBJECT,
            Subject::Principal(s) => s,
        }
    }

    /// The sentinel is never shown to API consumers.
    pub fn as_external(&self) -> &str {
        match self {
            Subject::Anyone => "",
            Subject::Principal(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

impl Effect {
    /// Only an explicit `"deny"` denies.
    pub fn from_input(s: &str) -> Self {
        if s == "deny" {
            Effect::Deny
        } else {
            Effect::Allow
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "allow" => Some(Effect::Allow),
            "deny" => Some(Effect::Deny),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

// ---------- Relation values ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEdge {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default)]
    pub domain: String,
}

impl RoleAssignment {
    /// Converts a stored `(subject, role, domain)` tuple for external use.
    pub fn from_tuple(tuple: &Tuple) -> Self {
        Self {
            subject: Subject::from_input(&tuple[0]).as_external().to_string(),
            role: tuple[1].clone(),
            domain: tuple[2].clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub domain: String,
    pub subject: String,
    pub object: String,
    pub action: String,
    pub effect: Effect,
}

// ---------- API request/response types ----------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainInput {
    pub domain: String,
    #[serde(default)]
    pub parent: String,
    #[serde(default, alias = "subDomains")]
    pub subdomains: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleAssignmentInput {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub unassign: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyInput {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub action: String,
    /// Anything but `"deny"` is stored as allow.
    #[serde(default)]
    pub effect: String,
}

/// Full replacement payload for `POST /reload`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub domains: Vec<DomainInput>,
    #[serde(default)]
    pub role_assignments: Vec<RoleAssignmentInput>,
    #[serde(default)]
    pub policies: Vec<PolicyInput>,
}

/// Query string accepted by the `/roles` routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleQuery {
    pub subject: Option<String>,
    pub role: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyQuery {
    pub subject: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub subject: String,
    pub domain: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}
