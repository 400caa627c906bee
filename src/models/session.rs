//! Session model

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login session identified by an opaque token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Token handed to the client
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session for `user_id` valid for `lifetime`.
    ///
    /// Fails when the expiry falls outside the representable date range.
    pub fn issue(user_id: i64, lifetime: Duration) -> Result<Self> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(lifetime)
            .ok_or_else(|| anyhow!("Session lifetime out of range: {}", lifetime))?;
        Ok(Self {
            id: Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at,
            created_at: now,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
