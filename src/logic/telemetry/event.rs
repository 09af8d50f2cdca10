//! Clickstream Event Types
//!
//! Immutable, timestamped interaction events.
//! Once built an event is only ever moved: producer -> queue -> accumulator -> sink.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Optional key/value payload attached to an event
pub type Metadata = BTreeMap<String, String>;

// ============================================================================
// IDENTITY
// ============================================================================

/// Who is producing events: fixed for the lifetime of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable pseudonymous installation ID
    pub user_id: String,
    /// Application version string
    pub app_version: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, app_version: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            app_version: app_version.into(),
        }
    }

    /// Identity of this running binary
    pub fn current() -> Self {
        Self::new(
            crate::logic::identity::get_machine_id(),
            crate::constants::APP_VERSION,
        )
    }
}

/// Identity plus the session, stamped onto every event
#[derive(Debug, Clone)]
pub struct EventContext {
    identity: Identity,
    session_id: String,
}

impl EventContext {
    /// New context with a freshly generated session ID
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Build an event stamped with this context and the current time
    pub fn event(
        &self,
        event_type: &str,
        component: &str,
        metadata: Option<&Metadata>,
    ) -> ClickEvent {
        ClickEvent {
            insert_id: Uuid::new_v4().to_string(),
            user_id: self.identity.user_id.clone(),
            session_id: self.session_id.clone(),
            app_version: self.identity.app_version.clone(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            component: component.to_string(),
            metadata: metadata.filter(|m| !m.is_empty()).map(encode_metadata),
        }
    }
}

fn encode_metadata(metadata: &Metadata) -> String {
    serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string())
}

// ============================================================================
// CLICK EVENT
// ============================================================================

/// One tracked UI interaction
///
/// Serializes to exactly one analytics row. `insert_id` travels beside the
/// row as the sink's de-duplication key and is not part of the row itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    #[serde(skip)]
    insert_id: String,
    user_id: String,
    session_id: String,
    app_version: String,
    timestamp: DateTime<Utc>,
    event_type: String,
    component: String,
    metadata: Option<String>,
}

impl ClickEvent {
    pub fn insert_id(&self) -> &str {
        &self.insert_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Metadata as its serialized JSON object string
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// Row payload for the analytics store
    pub fn to_row(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ============================================================================
// TESTS
// ============================================================================
