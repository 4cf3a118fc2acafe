use serde_json::{json, Value};

/// Builder for `POST /reload` bodies
#[derive(Default)]
pub struct SnapshotBuilder {
    domains: Vec<Value>,
    role_assignments: Vec<Value>,
    policies: Vec<Value>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain(mut self, domain: &str, parent: &str) -> Self {
        self.domains.push(json!({ "domain": domain, "parent": parent }));
        self
    }

    pub fn domain_with_subdomains(mut self, domain: &str, subdomains: &[&str]) -> Self {
        self.domains
            .push(json!({ "domain": domain, "subdomains": subdomains }));
        self
    }

    pub fn assign(mut self, subject: &str, role: &str, domain: &str) -> Self {
        self.role_assignments
            .push(json!({ "subject": subject, "role": role, "domain": domain }));
        self
    }

    pub fn allow(mut self, domain: &str, subject: &str, object: &str, action: &str) -> Self {
        self.policies.push(json!({
            "domain": domain,
            "subject": subject,
            "object": object,
            "action": action,
        }));
        self
    }

    pub fn deny(mut self, domain: &str, subject: &str, object: &str, action: &str) -> Self {
        self.policies.push(json!({
            "domain": domain,
            "subject": subject,
            "object": object,
            "action": action,
            "effect": "deny",
        }));
        self
    }

    pub fn build(self) -> Value {
        json!({
            "domains": self.domains,
            "roleAssignments": self.role_assignments,
            "policies": self.policies,
        })
    }
}
