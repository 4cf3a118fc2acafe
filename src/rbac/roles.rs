use crate::rbac::errors::RbacError;
use crate::rbac::store::RelationStore;
use crate::rbac::types::{Family, RoleAssignment, RoleAssignmentInput, Subject, ROLE_TAG};

/// Assigns or unassigns one role and returns the assignments that now match
/// the input's subject (and domain, when one is given).
///
/// An empty subject is stored as the anyone-sentinel. Assigning also records
/// that the role exists in the domain; unassigning an absent grant is a no-op.
pub fn apply_role_assignment<S: RelationStore + ?Sized>(
    store: &mut S,
    input: &RoleAssignmentInput,
) -> Result<Vec<RoleAssignment>, RbacError> {
    let subject = Subject::from_input(&input.subject);
    let columns = [subject.as_stored(), input.role.as_str(), input.domain.as_str()];

    if input.unassign {
        let removed = store.remove_relation(Family::Role, &columns)?;
        tracing::debug!(
            subject = subject.as_stored(),
            role = %input.role,
            domain = %input.domain,
            removed,
            "Unassigned role"
        );
    } else {
        store.add_relation(Family::Role, &columns)?;
        store.add_relation(
            Family::RoleExistence,
            &[input.role.as_str(), ROLE_TAG, input.domain.as_str()],
        )?;
        tracing::debug!(
            subject = subject.as_stored(),
            role = %input.role,
            domain = %input.domain,
            "Assigned role"
        );
    }

    let domain = Some(input.domain.as_str()).filter(|d| !d.is_empty());
    Ok(matching(store, subject.as_stored(), domain))
}

/// Applies each input in order, stopping at the first error.
pub fn apply_role_assignments<S: RelationStore + ?Sized>(
    store: &mut S,
    inputs: &[RoleAssignmentInput],
) -> Result<(), RbacError> {
    for input in inputs {
        apply_role_assignment(store, input)?;
    }
    Ok(())
}

/// Lists role assignments. The subject filter is answered by the store; the
/// domain filter is applied to what comes back.
pub fn list_role_assignments<S: RelationStore + ?Sized>(
    store: &S,
    subject: Option<&str>,
    domain: Option<&str>,
) -> Vec<RoleAssignment> {
    match subject {
        Some(subject) => matching(store, Subject::from_input(subject).as_stored(), domain),
        None => store
            .relations(Family::Role)
            .iter()
            .map(|t| assignment(t))
            .filter(|ra| domain.map_or(true, |d| ra.domain == d))
            .collect(),
    }
}

/// Role names ever assigned in `domain`.
pub fn list_roles<S: RelationStore + ?Sized>(store: &S, domain: &str) -> Vec<String> {
    store
        .query(Family::RoleExistence, 2, domain)
        .into_iter()
        .map(|t| t[0].clone())
        .collect()
}

/// Concrete subjects holding `role` in `domain`. Anyone-grants are skipped.
pub fn list_subjects<S: RelationStore + ?Sized>(store: &S, domain: &str, role: &str) -> Vec<String> {
    store
        .query(Family::Role, 1, role)
        .into_iter()
        .filter(|t| t[2] == domain)
        .filter_map(|t| match Subject::from_input(&t[0]) {
            Subject::Principal(name) => Some(name),
            Subject::Anyone => None,
        })
        .collect()
}

fn matching<S: RelationStore + ?Sized>(
    store: &S,
    stored_subject: &str,
    domain: Option<&str>,
) -> Vec<RoleAssignment> {
    store
        .query(Family::Role, 0, stored_subject)
        .iter()
        .map(|t| assignment(t))
        .filter(|ra| domain.map_or(true, |d| ra.domain == d))
        .collect()
}

fn assignment(columns: &[String]) -> RoleAssignment {
    RoleAssignment::from_tuple(&[
        columns[0].clone(),
        columns[1].clone(),
        columns[2].clone(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::model::Model;
    use crate::rbac::store::{Enforcer, EnforcerConfig};
    use crate::rbac::types::NO_SUBJECT;

    fn enforcer() -> Enforcer {
        Enforcer::with_model(EnforcerConfig::default(), Model::default())
    }

    fn input(subject: &str, role: &str, domain: &str, unassign: bool) -> RoleAssignmentInput {
        RoleAssignmentInput {
            subject: subject.into(),
            role: role.into(),
            domain: domain.into(),
            unassign,
        }
    }

    fn ra(subject: &str, role: &str, domain: &str) -> RoleAssignment {
        RoleAssignment {
            subject: subject.into(),
            role: role.into(),
            domain: domain.into(),
        }
    }

    #[test]
    fn test_assign_returns_current_assignments() {
        let mut e = enforcer();
        apply_role_assignment(&mut e, &input("alice", "viewer", "europe", false)).unwrap();
        let result = apply_role_assignment(&mut e, &input("alice", "admin", "asia", false)).unwrap();
        assert_eq!(result, vec![ra("alice", "admin", "asia")]);
    }

    #[test]
    fn test_assign_then_unassign_leaves_nothing() {
        let mut e = enforcer();
        apply_role_assignment(&mut e, &input("alice", "admin", "asia", false)).unwrap();
        let result = apply_role_assignment(&mut e, &input("alice", "admin", "asia", true)).unwrap();
        assert!(result.is_empty());
        assert!(list_role_assignments(&e, Some("alice"), Some("asia")).is_empty());
    }

    #[test]
    fn test_unassign_absent_is_not_an_error() {
        let mut e = enforcer();
        let result = apply_role_assignment(&mut e, &input("bob", "admin", "asia", true)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_subject_stored_as_sentinel_and_listed_as_empty() {
        let mut e = enforcer();
        let result = apply_role_assignment(&mut e, &input("", "editor", "europe", false)).unwrap();
        assert_eq!(result, vec![ra("", "editor", "europe")]);

        assert_eq!(e.query(Family::Role, 0, NO_SUBJECT).len(), 1);
        let listed = list_role_assignments(&e, None, Some("europe"));
        assert_eq!(listed, vec![ra("", "editor", "europe")]);
        assert!(listed.iter().all(|ra| ra.subject != NO_SUBJECT));
    }

    #[test]
    fn test_role_existence_recorded_once() {
        let mut e = enforcer();
        apply_role_assignment(&mut e, &input("alice", "admin", "asia", false)).unwrap();
        apply_role_assignment(&mut e, &input("alice", "admin", "asia", false)).unwrap();
        apply_role_assignment(&mut e, &input("bob", "admin", "asia", false)).unwrap();
        assert_eq!(e.relations(Family::RoleExistence).len(), 1);
        assert_eq!(list_roles(&e, "asia"), vec!["admin"]);
    }

    #[test]
    fn test_role_existence_survives_unassign() {
        let mut e = enforcer();
        apply_role_assignment(&mut e, &input("alice", "admin", "asia", false)).unwrap();
        apply_role_assignment(&mut e, &input("alice", "admin", "asia", true)).unwrap();
        assert_eq!(list_roles(&e, "asia"), vec!["admin"]);
    }

    #[test]
    fn test_list_filters() {
        let mut e = enforcer();
        apply_role_assignments(
            &mut e,
            &[
                input("alice", "admin", "asia", false),
                input("alice", "viewer", "europe", false),
                input("bob", "viewer", "asia", false),
            ],
        )
        .unwrap();

        assert_eq!(list_role_assignments(&e, None, None).len(), 3);
        assert_eq!(list_role_assignments(&e, Some("alice"), None).len(), 2);
        assert_eq!(
            list_role_assignments(&e, None, Some("asia")),
            vec![ra("alice", "admin", "asia"), ra("bob", "viewer", "asia")]
        );
        assert_eq!(list_subjects(&e, "asia", "viewer"), vec!["bob"]);
    }

    #[test]
    fn test_bulk_stops_at_first_error() {
        let mut e = enforcer();
        let err = apply_role_assignments(
            &mut e,
            &[
                input("alice", "admin", "asia", false),
                input("bob", "", "asia", false),
                input("carol", "admin", "asia", false),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, RbacError::InvalidRelation(_)));
        assert_eq!(list_role_assignments(&e, None, None), vec![ra("alice", "admin", "asia")]);
    }

    #[test]
    fn test_list_subjects_skips_anyone_grants() {
        let mut e = enforcer();
        apply_role_assignment(&mut e, &input("", "editor", "europe", false)).unwrap();
        apply_role_assignment(&mut e, &input("dave", "editor", "europe", false)).unwrap();
        assert_eq!(list_subjects(&e, "europe", "editor"), vec!["dave"]);
    }
}
