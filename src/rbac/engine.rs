use std::collections::HashSet;

use crate::rbac::domains::ancestors;
use crate::rbac::model::EffectPolicy;
use crate::rbac::store::{Enforcer, RelationStore};
use crate::rbac::types::{Effect, Family, NO_SUBJECT};

/// Decide whether `subject` may perform `action` on `object` in `domain`.
pub fn enforce(
    enforcer: &Enforcer,
    subject: &str,
    domain: &str,
    object: &str,
    action: &str,
) -> bool {
    let model = enforcer.model();

    // 1. Domains whose grants and rules apply to the request
    let mut scopes = vec![domain.to_string()];
    if model.inherit_domains {
        scopes.extend(ancestors(enforcer, domain));
    }

    // 2. The subject plus every role it holds in those domains
    let principals = principals(enforcer, subject, &scopes);

    // 3. Combine matching rules
    let mut allowed = false;
    for rule in enforcer.rules() {
        if !scopes.contains(&rule.domain) {
            continue;
        }
        if !(rule.subject.is_empty() || principals.contains(&rule.subject)) {
            continue;
        }
        if !(rule.object.is_empty() || rule.object == object) {
            continue;
        }
        if !(rule.action.is_empty() || rule.action == action) {
            continue;
        }

        match (rule.effect, model.effect) {
            (Effect::Deny, EffectPolicy::DenyOverrides) => return false,
            (Effect::Allow, EffectPolicy::AllowOverrides) => return true,
            (Effect::Allow, EffectPolicy::DenyOverrides) => allowed = true,
            (Effect::Deny, EffectPolicy::AllowOverrides) => {}
        }
    }

    allowed
}

/// `subject` itself and the roles granted to it, or to anyone, in `scopes`.
fn principals(enforcer: &Enforcer, subject: &str, scopes: &[String]) -> HashSet<String> {
    let mut result = HashSet::from([subject.to_string()]);
    for holder in [subject, NO_SUBJECT] {
        for tuple in enforcer.query(Family::Role, 0, holder) {
            if scopes.contains(&tuple[2]) {
                result.insert(tuple[1].clone());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::domains::apply_domain_tree;
    use crate::rbac::model::Model;
    use crate::rbac::policies::apply_policies;
    use crate::rbac::roles::apply_role_assignments;
    use crate::rbac::store::EnforcerConfig;
    use crate::rbac::types::{DomainInput, PolicyInput, RoleAssignmentInput};

    fn make_state(model: Model) -> Enforcer {
        let mut e = Enforcer::with_model(EnforcerConfig::default(), model);
        apply_domain_tree(
            &mut e,
            &[DomainInput {
                domain: "asia".into(),
                parent: String::new(),
                subdomains: vec!["japan".into()],
            }],
        )
        .unwrap();
        apply_role_assignments(
            &mut e,
            &[
                RoleAssignmentInput {
                    subject: "alice".into(),
                    role: "admin".into(),
                    domain: "asia".into(),
                    unassign: false,
                },
                RoleAssignmentInput {
                    subject: String::new(),
                    role: "reader".into(),
                    domain: "japan".into(),
                    unassign: false,
                },
            ],
        )
        .unwrap();
        apply_policies(
            &mut e,
            &[
                rule("asia", "admin", "doc", "", "allow"),
                rule("japan", "admin", "doc", "delete", "deny"),
                rule("japan", "reader", "doc", "read", "allow"),
            ],
        )
        .unwrap();
        e
    }

    fn rule(domain: &str, subject: &str, object: &str, action: &str, effect: &str) -> PolicyInput {
        PolicyInput {
            domain: domain.into(),
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
            effect: effect.into(),
        }
    }

    #[test]
    fn test_role_grant_allows() {
        let e = make_state(Model::default());
        assert!(enforce(&e, "alice", "asia", "doc", "write"));
        assert!(!enforce(&e, "bob", "asia", "doc", "write"));
    }

    #[test]
    fn test_parent_domain_grant_is_inherited() {
        let e = make_state(Model::default());
        assert!(enforce(&e, "alice", "japan", "doc", "write"));
    }

    #[test]
    fn test_deny_overrides_allow() {
        let e = make_state(Model::default());
        assert!(!enforce(&e, "alice", "japan", "doc", "delete"));
        assert!(enforce(&e, "alice", "asia", "doc", "delete"));
    }

    #[test]
    fn test_allow_overrides_model() {
        let e = make_state(Model {
            effect: EffectPolicy::AllowOverrides,
            inherit_domains: true,
        });
        assert!(enforce(&e, "alice", "japan", "doc", "delete"));
    }

    #[test]
    fn test_no_inheritance_model() {
        let e = make_state(Model {
            effect: EffectPolicy::DenyOverrides,
            inherit_domains: false,
        });
        assert!(!enforce(&e, "alice", "japan", "doc", "write"));
        assert!(enforce(&e, "alice", "asia", "doc", "write"));
    }

    #[test]
    fn test_anyone_grant_applies_to_every_subject() {
        let e = make_state(Model::default());
        assert!(enforce(&e, "zoe", "japan", "doc", "read"));
        assert!(!enforce(&e, "zoe", "asia", "doc", "read"));
    }

    #[test]
    fn test_direct_subject_rule() {
        let mut e = make_state(Model::default());
        apply_policies(&mut e, &[rule("asia", "bob", "report", "read", "")]).unwrap();
        assert!(enforce(&e, "bob", "asia", "report", "read"));
        assert!(!enforce(&e, "bob", "asia", "report", "write"));
    }

    #[test]
    fn test_unknown_domain_denies() {
        let e = make_state(Model::default());
        assert!(!enforce(&e, "alice", "africa", "doc", "write"));
    }
}
