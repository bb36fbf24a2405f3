use common::UserId;

use crate::error::ClientError;
use crate::guarded::GuardedClient;
use crate::transport::UserTransport;

/// Guarded access to the user service.
#[derive(Debug, Clone)]
pub struct UserClient<T> {
    guard: GuardedClient,
    transport: T,
}

impl<T: UserTransport> UserClient<T> {
    pub fn new(guard: GuardedClient, transport: T) -> Self {
        Self { guard, transport }
    }

    pub fn guard(&self) -> &GuardedClient {
        &self.guard
    }

    #[tracing::instrument(skip(self), fields(dependency = self.guard.dependency()))]
    pub async fn check_user_exists(&self, user_id: UserId) -> Result<bool, ClientError> {
        self.guard
            .execute("check_user_exists", || self.transport.user_exists(user_id))
            .await
    }
}
