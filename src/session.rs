// SPDX-License-Identifier: MIT

//! Explicit user session
//!
//! Identity is passed to whoever needs it instead of being read from an
//! ambient store. A funnel created for a session is reset when the session
//! ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is using the funnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
        }
    }
}

/// A single visit, from opening a funnel until it is closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user: Option<UserIdentity>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn begin(user: Option<UserIdentity>) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            user,
            started_at: Utc::now(),
            ended_at: None,
        };
        log::debug!("Session {} started", session.id);
        session
    }

    pub fn anonymous() -> Self {
        Self::begin(None)
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.user_id.as_str())
    }

    /// Mark the session as finished
    pub fn end(mut self) -> Self {
        self.ended_at = Some(Utc::now());
        log::debug!("Session {} ended", self.id);
        self
    }
}
