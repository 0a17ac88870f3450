//! Port adapters for the batch engine
//!
//! - [`PingOneDirectory`] implements [`IUserDirectory`] over [`PingOneClient`]
//! - [`TokenCache`] implements [`ITokenProvider`]
//!
//! Both translate [`PingOneError`](crate::PingOneError) into the engine's
//! [`DirectoryError`] classification.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use pingsync_core::domain::{
    AccessToken, Credentials, EnvironmentDetails, RecordId, RemoteRecord, UserAttributes,
};
use pingsync_core::ports::{DirectoryError, DirectorySession, ITokenProvider, IUserDirectory};

use crate::client::PingOneClient;
use crate::token_cache::TokenCache;

/// [`IUserDirectory`] backed by the PingOne management API
#[derive(Debug, Clone)]
pub struct PingOneDirectory {
    client: PingOneClient,
}

impl PingOneDirectory {
    pub fn new(client: PingOneClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IUserDirectory for PingOneDirectory {
    async fn find_by_username(
        &self,
        session: &DirectorySession,
        username: &str,
    ) -> Result<Option<RemoteRecord>, DirectoryError> {
        Ok(self.client.find_user_by_username(session, username).await?)
    }

    async fn create(
        &self,
        session: &DirectorySession,
        attributes: &UserAttributes,
    ) -> Result<RemoteRecord, DirectoryError> {
        let record = self.client.create_user(session, attributes).await?;
        debug!(id = %record.id, "Created user");
        Ok(record)
    }

    async fn patch(
        &self,
        session: &DirectorySession,
        id: &RecordId,
        update: &Map<String, Value>,
    ) -> Result<(), DirectoryError> {
        Ok(self.client.update_user(session, id, update).await?)
    }

    async fn delete(
        &self,
        session: &DirectorySession,
        id: &RecordId,
    ) -> Result<(), DirectoryError> {
        Ok(self.client.delete_user(session, id).await?)
    }

    async fn environment(
        &self,
        session: &DirectorySession,
    ) -> Result<EnvironmentDetails, DirectoryError> {
        Ok(self.client.get_environment(session).await?)
    }
}

#[async_trait]
impl ITokenProvider for TokenCache {
    async fn get_token(&self, credentials: &Credentials) -> Result<AccessToken, DirectoryError> {
        Ok(TokenCache::get_token(self, credentials).await?)
    }

    async fn invalidate(&self, credentials: &Credentials, rejected: &AccessToken) {
        TokenCache::invalidate(self, credentials, rejected).await;
    }
}
