//! Access token port
//!
//! Supplies bearer tokens for a credentials triple. Implementations cache
//! tokens; [`ITokenProvider::invalidate`] drops a token the directory has
//! rejected so the next call fetches a fresh one. A token that was already
//! replaced is left alone.

use async_trait::async_trait;

use super::directory::DirectoryError;
use crate::domain::credentials::Credentials;
use crate::domain::newtypes::AccessToken;

#[async_trait]
pub trait ITokenProvider: Send + Sync {
    /// A valid token for `credentials`, fetched if none is cached
    async fn get_token(&self, credentials: &Credentials) -> Result<AccessToken, DirectoryError>;

    /// Forget the cached token for `credentials` if it is still `rejected`
    async fn invalidate(&self, credentials: &Credentials, rejected: &AccessToken);
}
