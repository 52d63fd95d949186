// Session pinned to a single credential
// Author: kelexine (https://github.com/kelexine)

use super::Credential;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A logical unit of work pinned to one credential for its whole lifetime.
///
/// Sessions are immutable once created; every request issued through a
/// session uses exactly [`Session::credential`].
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    credential: Credential,
    created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(credential: Credential) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
