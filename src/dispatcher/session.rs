// Dispatcher handle pinned to one credential
// Author: kelexine (https://github.com/kelexine)

use super::{GenerateOutcome, RequestDispatcher, RequestOptions};
use crate::credentials::Session;
use crate::error::Result;
use crate::models::GenerateRequest;
use crate::streaming::ChunkStream;
use uuid::Uuid;

/// Issues every request with the credential pinned at creation.
///
/// Shares the dispatcher's cache and retry policy; retries reuse the pinned
/// credential instead of rotating.
#[derive(Clone)]
pub struct SessionClient {
    dispatcher: RequestDispatcher,
    session: Session,
}

impl SessionClient {
    pub(crate) fn new(dispatcher: RequestDispatcher, session: Session) -> Self {
        tracing::debug!("Session {} pinned to key {}", session.id(), session.credential());
        Self { dispatcher, session }
    }

    pub fn id(&self) -> Uuid {
        self.session.id()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn generate(
        &self,
        request: GenerateRequest,
        options: RequestOptions,
    ) -> Result<GenerateOutcome> {
        self.dispatcher
            .execute_unary(request, options, Some(self.session.credential()))
            .await
    }

    pub async fn stream(&self, request: GenerateRequest) -> Result<ChunkStream> {
        self.dispatcher
            .open_stream(request, Some(self.session.credential()))
            .await
    }
}
