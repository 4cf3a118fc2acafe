use tokio::sync::{Mutex, RwLock, RwLockReadGuard};

use crate::rbac::domains::apply_domain_tree;
use crate::rbac::errors::RbacError;
use crate::rbac::policies::apply_policies;
use crate::rbac::roles::apply_role_assignments;
use crate::rbac::store::{Enforcer, EnforcerConfig, RelationStore, ReloadMode};
use crate::rbac::types::Snapshot;

/// The authorization state currently serving requests.
///
/// Readers share the `RwLock`. Every writer (single mutations, refreshes and
/// reloads) first takes `writer`, builds its replacement aside and swaps it in
/// only on success, so a mutation can never land on a state a concurrent
/// reload is about to replace.
#[derive(Debug)]
pub struct LiveEnforcer {
    config: EnforcerConfig,
    current: RwLock<Enforcer>,
    writer: Mutex<()>,
}

impl LiveEnforcer {
    pub fn new(config: EnforcerConfig) -> Result<Self, RbacError> {
        let enforcer = Enforcer::new(&config)?;
        Ok(Self::from_enforcer(config, enforcer))
    }

    pub fn from_enforcer(config: EnforcerConfig, enforcer: Enforcer) -> Self {
        Self {
            config,
            current: RwLock::new(enforcer),
            writer: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Enforcer> {
        self.current.read().await
    }

    /// Runs `f` against a copy of the live state and publishes the copy
    /// only if `f` succeeds. `f` runs on the blocking pool, so it may touch
    /// the policy file.
    pub async fn mutate<T, F>(&self, f: F) -> Result<T, RbacError>
    where
        F: FnOnce(&mut Enforcer) -> Result<T, RbacError> + Send + 'static,
        T: Send + 'static,
    {
        let _writer = self.writer.lock().await;
        let mut next = self.current.read().await.clone();

        let (next, out) = blocking(move || {
            let out = f(&mut next)?;
            Ok((next, out))
        })
        .await?;

        *self.current.write().await = next;
        Ok(out)
    }

    /// Re-reads the policy file into the live state.
    pub async fn refresh(&self) -> Result<(), RbacError> {
        self.mutate(|enforcer| enforcer.load()).await
    }

    /// Builds a new state from `snapshot`, publishes it, then saves it.
    ///
    /// Nothing is published unless every domain, role assignment and policy
    /// applied cleanly. A save failure is reported after the new state is
    /// already live.
    pub async fn reload(&self, snapshot: &Snapshot) -> Result<(), RbacError> {
        let _writer = self.writer.lock().await;

        let config = self.config.clone();
        let input = snapshot.clone();
        let next = blocking(move || build_state(&config, &input)).await?;
        let persisted = next.clone();

        *self.current.write().await = next;

        tracing::info!(
            domains = snapshot.domains.len(),
            role_assignments = snapshot.role_assignments.len(),
            policies = snapshot.policies.len(),
            "Published reloaded authorization state"
        );

        blocking(move || persisted.save()).await
    }
}

/// Runs file-touching work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, RbacError>
where
    F: FnOnce() -> Result<T, RbacError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(RbacError::BackgroundTask)?
}

/// Constructs a fresh state and applies the snapshot to it.
pub fn build_state(config: &EnforcerConfig, snapshot: &Snapshot) -> Result<Enforcer, RbacError> {
    let mut next = match config.reload {
        ReloadMode::Merge => Enforcer::new(config)?,
        ReloadMode::Replace => Enforcer::empty(config)?,
    };

    apply_domain_tree(&mut next, &snapshot.domains)?;
    apply_role_assignments(&mut next, &snapshot.role_assignments)?;
    apply_policies(&mut next, &snapshot.policies)?;

    Ok(next)
}
