// Identity Provisioning Collaborator
// Namespace user accounts live in an external identity realm keyed by
// namespace name. The engine treats the provider as a black box that
// either succeeds or fails.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

/// External identity/realm provisioning interface
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Ensure a realm exists for the namespace; creating an existing realm
    /// is a no-op
    async fn create_realm(&self, namespace: &str) -> anyhow::Result<()>;

    /// Remove the namespace's realm and all its users; deleting a missing
    /// realm is a no-op
    async fn delete_realm(&self, namespace: &str) -> anyhow::Result<()>;

    /// Create a user inside the namespace's realm
    async fn create_user(
        &self,
        namespace: &str,
        username: &str,
        password: &str,
    ) -> anyhow::Result<()>;
}

/// Provider for standalone operation: logs provisioning calls and reports
/// success without talking to any identity service
pub struct NoopIdentityProvider;

#[async_trait]
impl IdentityProvider for NoopIdentityProvider {
    async fn create_realm(&self, namespace: &str) -> anyhow::Result<()> {
        info!(namespace = %namespace, "Identity provisioning disabled, skipping realm creation");
        Ok(())
    }

    async fn delete_realm(&self, namespace: &str) -> anyhow::Result<()> {
        info!(namespace = %namespace, "Identity provisioning disabled, skipping realm deletion");
        Ok(())
    }

    async fn create_user(
        &self,
        namespace: &str,
        username: &str,
        _password: &str,
    ) -> anyhow::Result<()> {
        info!(namespace = %namespace, username = %username, "Identity provisioning disabled, skipping user creation");
        Ok(())
    }
}

/// In-process provider used by tests and the simulate command
pub struct InMemoryIdentityProvider {
    realms: DashMap<String, Vec<String>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            realms: DashMap::new(),
        }
    }

    pub fn realm_exists(&self, namespace: &str) -> bool {
        self.realms.contains_key(namespace)
    }

    pub fn user_count(&self, namespace: &str) -> usize {
        self.realms.get(namespace).map(|u| u.len()).unwrap_or(0)
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_realm(&self, namespace: &str) -> anyhow::Result<()> {
        if self.realms.contains_key(namespace) {
            debug!(namespace = %namespace, "Realm already exists");
            return Ok(());
        }
        self.realms.insert(namespace.to_string(), Vec::new());
        info!(namespace = %namespace, "Realm created");
        Ok(())
    }

    async fn delete_realm(&self, namespace: &str) -> anyhow::Result<()> {
        if self.realms.remove(namespace).is_some() {
            info!(namespace = %namespace, "Realm deleted");
        }
        Ok(())
    }

    async fn create_user(
        &self,
        namespace: &str,
        username: &str,
        _password: &str,
    ) -> anyhow::Result<()> {
        let mut realm = self
            .realms
            .get_mut(namespace)
            .ok_or_else(|| anyhow::anyhow!("no realm for namespace '{namespace}'"))?;
        realm.push(username.to_string());
        info!(namespace = %namespace, username = %username, "User created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_realm_lifecycle() {
        let provider = InMemoryIdentityProvider::new();

        provider.create_realm("space-1").await.unwrap();
        assert!(provider.realm_exists("space-1"));

        // Creating twice is a no-op, not an error
        provider.create_realm("space-1").await.unwrap();

        provider.create_user("space-1", "alice", "s3cret").await.unwrap();
        assert_eq!(provider.user_count("space-1"), 1);

        provider.delete_realm("space-1").await.unwrap();
        assert!(!provider.realm_exists("space-1"));
    }

    #[tokio::test]
    async fn test_user_without_realm_fails() {
        let provider = InMemoryIdentityProvider::new();
        assert!(provider.create_user("missing", "bob", "pw").await.is_err());
    }
}
