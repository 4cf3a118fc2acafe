use std::collections::{HashMap, HashSet};

use crate::rbac::errors::RbacError;
use crate::rbac::store::RelationStore;
use crate::rbac::types::{DomainEdge, DomainInput, Family, ROOT_DOMAIN};

/// Upper bound on hierarchy depth walked by [`ancestors`].
const MAX_DEPTH: usize = 64;

/// Adds one edge per input domain (parent defaults to `root`) plus one per
/// declared subdomain, then validates the resulting hierarchy. Subdomains are
/// not expanded recursively.
///
/// An edge for a domain that already has a different parent in the store
/// re-parents it: the stored edge is dropped first. Two edges for the same
/// child within `domains` still fail validation.
pub fn apply_domain_tree<S: RelationStore + ?Sized>(
    store: &mut S,
    domains: &[DomainInput],
) -> Result<(), RbacError> {
    let edges = input_edges(domains);

    for (parent, child) in &edges {
        for existing in store.query(Family::Domain, 1, child) {
            if existing[0] != *parent {
                store.remove_relation(Family::Domain, &[existing[0].as_str(), child.as_str()])?;
                tracing::debug!(
                    domain = %child,
                    from = %existing[0],
                    to = %parent,
                    "Re-parented domain"
                );
            }
        }
    }

    for (parent, child) in &edges {
        store.add_relation(Family::Domain, &[parent.as_str(), child.as_str()])?;
    }

    validate_hierarchy(store)
}

fn input_edges(domains: &[DomainInput]) -> Vec<(String, String)> {
    let mut edges = Vec::new();
    for input in domains {
        let parent = if input.parent.is_empty() {
            ROOT_DOMAIN
        } else {
            input.parent.as_str()
        };
        edges.push((parent.to_string(), input.domain.clone()));

        for subdomain in &input.subdomains {
            edges.push((input.domain.clone(), subdomain.clone()));
        }
    }
    edges
}

/// All hierarchy edges in insertion order.
pub fn list_domain_edges<S: RelationStore + ?Sized>(store: &S) -> Vec<DomainEdge> {
    store
        .relations(Family::Domain)
        .into_iter()
        .map(|t| DomainEdge {
            parent: t[0].clone(),
            child: t[1].clone(),
        })
        .collect()
}

/// Parents of `domain`, nearest first. Stops at the root, on a repeated
/// domain, or after [`MAX_DEPTH`] steps.
pub fn ancestors<S: RelationStore + ?Sized>(store: &S, domain: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut seen = HashSet::from([domain.to_string()]);
    let mut current = domain.to_string();

    while result.len() < MAX_DEPTH {
        let Some(parent) = store
            .query(Family::Domain, 1, &current)
            .into_iter()
            .next()
            .map(|t| t[0].clone())
        else {
            break;
        };
        if !seen.insert(parent.clone()) {
            break;
        }
        result.push(parent.clone());
        if parent == ROOT_DOMAIN {
            break;
        }
        current = parent;
    }

    result
}

/// Every domain has at most one parent, none is its own parent, and
/// following parents never loops.
pub fn validate_hierarchy<S: RelationStore + ?Sized>(store: &S) -> Result<(), RbacError> {
    let mut parent_of: HashMap<String, String> = HashMap::new();

    for edge in list_domain_edges(store) {
        if edge.parent == edge.child {
            return Err(RbacError::InvalidDomainTree(format!(
                "`{}` is its own parent",
                edge.child
            )));
        }
        if let Some(existing) = parent_of.get(&edge.child) {
            return Err(RbacError::InvalidDomainTree(format!(
                "`{}` has two parents: `{existing}` and `{}`",
                edge.child, edge.parent
            )));
        }
        parent_of.insert(edge.child, edge.parent);
    }

    let mut acyclic: HashSet<&str> = HashSet::new();
    for start in parent_of.keys() {
        let mut path: Vec<&str> = Vec::new();
        let mut current = start.as_str();
        loop {
            if acyclic.contains(current) {
                break;
            }
            if path.contains(&current) {
                path.push(current);
                return Err(RbacError::InvalidDomainTree(format!(
                    "cycle {}",
                    path.join(" -> ")
                )));
            }
            path.push(current);
            match parent_of.get(current) {
                Some(parent) => current = parent.as_str(),
                None => break,
            }
        }
        acyclic.extend(path);
    }

    Ok(())
}
