use std::path::Path;

use kdl::KdlDocument;

use crate::rbac::errors::RbacError;

/// How matching rules combine into a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectPolicy {
    /// Any matching deny wins; otherwise any matching allow.
    #[default]
    DenyOverrides,
    /// Any matching allow wins; deny rules are informational.
    AllowOverrides,
}

/// Decision settings read from the model file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub effect: EffectPolicy,
    /// Grants and rules on a domain also apply to its subdomains.
    pub inherit_domains: bool,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            effect: EffectPolicy::DenyOverrides,
            inherit_domains: true,
        }
    }
}

pub fn load_model(path: &Path) -> Result<Model, RbacError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RbacError::ModelLoad {
        path: path.display().to_string(),
        source,
    })?;
    parse_model(&contents)
}

/// Parse a KDL model document. Missing nodes keep their defaults.
pub fn parse_model(source: &str) -> Result<Model, RbacError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| RbacError::KdlParse(e.to_string()))?;

    let mut model = Model::default();

    for node in doc.nodes() {
        match node.name().value() {
            "effect" => {
                let effect = first_arg(node).and_then(|v| v.as_string()).ok_or_else(|| {
                    RbacError::InvalidModel(
                        "effect node requires a string argument (e.g. effect \"deny-overrides\")"
                            .into(),
                    )
                })?;
                model.effect = match effect {
                    "deny-overrides" => EffectPolicy::DenyOverrides,
                    "allow-overrides" => EffectPolicy::AllowOverrides,
                    other => {
                        return Err(RbacError::InvalidModel(format!(
                            "unknown effect `{other}` (expected \"deny-overrides\" or \"allow-overrides\")"
                        )))
                    }
                };
            }
            "inherit-domains" => {
                model.inherit_domains = first_arg(node).and_then(as_flag).ok_or_else(|| {
                    RbacError::InvalidModel(
                        "inherit-domains requires a boolean argument (e.g. inherit-domains #true)"
                            .into(),
                    )
                })?;
            }
            other => {
                tracing::warn!("ignoring unknown model node `{other}`");
            }
        }
    }

    Ok(model)
}

fn first_arg(node: &kdl::KdlNode) -> Option<&kdl::KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

/// Accepts a KDL boolean or the strings "true"/"false".
fn as_flag(value: &kdl::KdlValue) -> Option<bool> {
    value.as_bool().or_else(|| match value.as_string() {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    })
}
