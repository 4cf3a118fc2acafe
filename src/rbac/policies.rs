use crate::rbac::errors::RbacError;
use crate::rbac::store::RelationStore;
use crate::rbac::types::{Effect, PolicyInput, PolicyRule};

/// Stores one rule. Empty subject, object or action are kept as-is; what
/// they match is up to the decision engine.
pub fn apply_policy<S: RelationStore + ?Sized>(
    store: &mut S,
    input: &PolicyInput,
) -> Result<PolicyRule, RbacError> {
    let rule = PolicyRule {
        domain: input.domain.clone(),
        subject: input.subject.clone(),
        object: input.object.clone(),
        action: input.action.clone(),
        effect: Effect::from_input(&input.effect),
    };
    store.add_rule(rule.clone())?;
    tracing::debug!(
        domain = %rule.domain,
        subject = %rule.subject,
        object = %rule.object,
        action = %rule.action,
        effect = rule.effect.label(),
        "Added policy rule"
    );
    Ok(rule)
}

pub fn apply_policies<S: RelationStore + ?Sized>(
    store: &mut S,
    inputs: &[PolicyInput],
) -> Result<Vec<PolicyRule>, RbacError> {
    let mut rules = Vec::with_capacity(inputs.len());
    for input in inputs {
        rules.push(apply_policy(store, input)?);
    }
    Ok(rules)
}

pub fn list_policies<S: RelationStore + ?Sized>(
    store: &S,
    domain: Option<&str>,
    subject: Option<&str>,
) -> Vec<PolicyRule> {
    store
        .rules()
        .into_iter()
        .filter(|r| domain.map_or(true, |d| r.domain == d))
        .filter(|r| subject.map_or(true, |s| r.subject == s))
        .collect()
}
