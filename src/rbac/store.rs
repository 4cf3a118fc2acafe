use std::path::{Path, PathBuf};

use kdl::{KdlDocument, KdlEntry, KdlNode};
use serde::{Deserialize, Serialize};

use crate::rbac::errors::RbacError;
use crate::rbac::model::{load_model, Model};
use crate::rbac::types::*;

/// How a reload treats the state already persisted in the policy file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    /// Apply the snapshot on top of whatever the policy file holds.
    #[default]
    Merge,
    /// Start from an empty store; the snapshot is the whole policy.
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcerConfig {
    /// KDL model file (decision settings).
    pub model_path: PathBuf,
    /// KDL policy file the relations are loaded from and saved to.
    pub policy_path: PathBuf,
    #[serde(default)]
    pub reload: ReloadMode,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("policy/model.kdl"),
            policy_path: PathBuf::from("data/policy.kdl"),
            reload: ReloadMode::Merge,
        }
    }
}

/// Storage surface the domain, role and policy managers drive.
pub trait RelationStore {
    /// Adds a tuple to a family. Returns `false` if it was already present.
    fn add_relation(&mut self, family: Family, columns: &[&str]) -> Result<bool, RbacError>;

    /// Removes a tuple. Returns `false` if it was absent.
    fn remove_relation(&mut self, family: Family, columns: &[&str]) -> Result<bool, RbacError>;

    /// Adds a policy rule. Returns `false` if an identical rule exists.
    fn add_rule(&mut self, rule: PolicyRule) -> Result<bool, RbacError>;

    /// Tuples of `family` whose `column` equals `value`, in insertion order.
    fn query(&self, family: Family, column: usize, value: &str) -> Vec<Vec<String>>;

    /// Every tuple of `family`, in insertion order.
    fn relations(&self, family: Family) -> Vec<Vec<String>>;

    fn rules(&self) -> Vec<PolicyRule>;

    /// Replaces the in-memory state with the persisted one.
    fn load(&mut self) -> Result<(), RbacError>;

    fn save(&self) -> Result<(), RbacError>;
}

/// In-memory authorization state backed by a KDL policy file.
#[derive(Debug, Clone)]
pub struct Enforcer {
    config: EnforcerConfig,
    model: Model,
    /// Family `g`: domain edges and role assignments.
    grouping: TupleSet,
    /// Family `g3`: role existence.
    role_existence: TupleSet,
    /// Family `p`.
    rules: Vec<PolicyRule>,
}

impl Enforcer {
    /// Reads the model and loads the policy file if it exists.
    pub fn new(config: &EnforcerConfig) -> Result<Self, RbacError> {
        let mut enforcer = Self::empty(config)?;
        enforcer.load()?;

        tracing::info!(
            policy = %config.policy_path.display(),
            grouping = enforcer.grouping.len(),
            role_existence = enforcer.role_existence.len(),
            rules = enforcer.rules.len(),
            "Loaded authorization state"
        );

        Ok(enforcer)
    }

    /// Reads the model only; the relation families start empty.
    pub fn empty(config: &EnforcerConfig) -> Result<Self, RbacError> {
        let model = load_model(&config.model_path)?;
        Ok(Self::with_model(config.clone(), model))
    }

    pub fn with_model(config: EnforcerConfig, model: Model) -> Self {
        Self {
            config,
            model,
            grouping: TupleSet::new(),
            role_existence: TupleSet::new(),
            rules: Vec::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    fn family_set(&self, family: Family) -> &TupleSet {
        match family {
            Family::Domain | Family::Role => &self.grouping,
            Family::RoleExistence => &self.role_existence,
        }
    }

    fn family_set_mut(&mut self, family: Family) -> &mut TupleSet {
        match family {
            Family::Domain | Family::Role => &mut self.grouping,
            Family::RoleExistence => &mut self.role_existence,
        }
    }

    /// Stored tuples that belong to `family`, with the domain tag stripped.
    fn family_tuples(&self, family: Family) -> impl Iterator<Item = Vec<String>> + '_ {
        self.family_set(family)
            .iter()
            .filter(move |t| match family {
                Family::Domain => t[2] == DOMAIN_TAG,
                Family::Role => t[2] != DOMAIN_TAG,
                Family::RoleExistence => true,
            })
            .map(move |t| t[..family.arity()].to_vec())
    }

    fn clear(&mut self) {
        self.grouping.clear();
        self.role_existence.clear();
        self.rules.clear();
    }

    fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        let families = [
            (Family::Role.ptype(), &self.grouping),
            (Family::RoleExistence.ptype(), &self.role_existence),
        ];
        for (ptype, set) in families {
            for tuple in set.iter() {
                doc.nodes_mut().push(kdl_node(ptype, tuple.iter().map(String::as_str)));
            }
        }
        for rule in &self.rules {
            let columns = [
                rule.domain.as_str(),
                rule.subject.as_str(),
                rule.object.as_str(),
                rule.action.as_str(),
                rule.effect.label(),
            ];
            doc.nodes_mut().push(kdl_node("p", columns));
        }
        doc.autoformat();
        doc
    }

    fn apply_kdl(&mut self, source: &str) -> Result<(), RbacError> {
        let doc: KdlDocument = source
            .parse()
            .map_err(|e: kdl::KdlError| RbacError::KdlParse(e.to_string()))?;

        for node in doc.nodes() {
            let ptype = node.name().value();
            let args = string_args(node).ok_or_else(|| {
                RbacError::InvalidPolicyFile(format!("`{ptype}` arguments must all be strings"))
            })?;
            let family = [Family::Role, Family::RoleExistence]
                .into_iter()
                .find(|f| f.ptype() == ptype);
            match (family, ptype, args.as_slice()) {
                (Some(family), _, [a, b, c]) => {
                    self.family_set_mut(family).insert(to_tuple(a, b, c));
                }
                (None, "p", [domain, subject, object, action, effect]) => {
                    let effect = Effect::parse(effect).ok_or_else(|| {
                        RbacError::InvalidPolicyFile(format!(
                            "unknown effect `{effect}` (expected \"allow\" or \"deny\")"
                        ))
                    })?;
                    self.add_rule(PolicyRule {
                        domain: domain.to_string(),
                        subject: subject.to_string(),
                        object: object.to_string(),
                        action: action.to_string(),
                        effect,
                    })?;
                }
                (Some(_), _, _) | (None, "p", _) => {
                    return Err(RbacError::InvalidPolicyFile(format!(
                        "`{ptype}` has {} columns",
                        args.len()
                    )));
                }
                (None, other, _) => {
                    return Err(RbacError::InvalidPolicyFile(format!(
                        "unknown relation family `{other}` (expected g, g3 or p)"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl RelationStore for Enforcer {
    fn add_relation(&mut self, family: Family, columns: &[&str]) -> Result<bool, RbacError> {
        let tuple = stored_tuple(family, columns)?;
        validate_grouping(family, &tuple)?;
        Ok(self.family_set_mut(family).insert(tuple))
    }

    fn remove_relation(&mut self, family: Family, columns: &[&str]) -> Result<bool, RbacError> {
        let tuple = stored_tuple(family, columns)?;
        Ok(self.family_set_mut(family).remove(&tuple))
    }

    fn add_rule(&mut self, rule: PolicyRule) -> Result<bool, RbacError> {
        if self.rules.contains(&rule) {
            return Ok(false);
        }
        self.rules.push(rule);
        Ok(true)
    }

    fn query(&self, family: Family, column: usize, value: &str) -> Vec<Vec<String>> {
        self.family_tuples(family)
            .filter(|t| t.get(column).is_some_and(|c| c == value))
            .collect()
    }

    fn relations(&self, family: Family) -> Vec<Vec<String>> {
        self.family_tuples(family).collect()
    }

    fn rules(&self) -> Vec<PolicyRule> {
        self.rules.clone()
    }

    fn load(&mut self) -> Result<(), RbacError> {
        let path = self.config.policy_path.clone();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(policy = %path.display(), "no policy file yet, starting empty");
                self.clear();
                return Ok(());
            }
            Err(source) => {
                return Err(RbacError::PolicyLoad {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let mut fresh = Self::with_model(self.config.clone(), self.model.clone());
        fresh.apply_kdl(&contents)?;
        *self = fresh;
        Ok(())
    }

    fn save(&self) -> Result<(), RbacError> {
        let path = &self.config.policy_path;
        write_atomically(path, &self.to_kdl().to_string()).map_err(|source| {
            RbacError::PolicySave {
                path: path.display().to_string(),
                source,
            }
        })?;
        tracing::debug!(policy = %path.display(), "Saved authorization state");
        Ok(())
    }
}

/// Checks arity and builds the three-column stored form.
fn stored_tuple(family: Family, columns: &[&str]) -> Result<Tuple, RbacError> {
    if columns.len() != family.arity() {
        return Err(RbacError::InvalidRelation(format!(
            "{family} relation takes {} columns, got {}",
            family.arity(),
            columns.len()
        )));
    }
    Ok(match family {
        Family::Domain => to_tuple(columns[0], columns[1], DOMAIN_TAG),
        Family::Role | Family::RoleExistence => to_tuple(columns[0], columns[1], columns[2]),
    })
}

fn validate_grouping(family: Family, tuple: &Tuple) -> Result<(), RbacError> {
    if tuple.iter().any(|c| c.is_empty()) {
        return Err(RbacError::InvalidRelation(format!(
            "{family} relation {tuple:?} has an empty column"
        )));
    }
    match family {
        Family::Domain if tuple[1] == ROOT_DOMAIN => Err(RbacError::InvalidRelation(format!(
            "`{ROOT_DOMAIN}` cannot have a parent (got `{}`)",
            tuple[0]
        ))),
        Family::Domain => Ok(()),
        Family::Role | Family::RoleExistence => {
            if tuple[1] == DOMAIN_TAG || tuple[2] == DOMAIN_TAG {
                Err(RbacError::InvalidRelation(format!(
                    "`{DOMAIN_TAG}` is reserved (got {tuple:?})"
                )))
            } else {
                Ok(())
            }
        }
    }
}

fn to_tuple(a: &str, b: &str, c: &str) -> Tuple {
    [a.to_string(), b.to_string(), c.to_string()]
}

fn kdl_node<'a>(name: &str, columns: impl IntoIterator<Item = &'a str>) -> KdlNode {
    let mut node = KdlNode::new(name);
    for column in columns {
        node.push(KdlEntry::new(column.to_string()));
    }
    node
}

fn string_args(node: &KdlNode) -> Option<Vec<&str>> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value().as_string())
        .collect()
}

fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("kdl.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}
