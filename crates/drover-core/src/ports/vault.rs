//! Vault port: credential and constant storage.

use async_trait::async_trait;

use crate::domain::RunError;

/// A provisioned login credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

/// Read access to externally managed credentials and constants.
#[async_trait]
pub trait Vault: Send + Sync {
    async fn credential(&self, name: &str) -> Result<Credential, RunError>;

    /// Look up a named constant (e.g. the error notification recipient).
    async fn constant(&self, name: &str) -> Result<String, RunError>;
}
