use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message written when a kickstart is abandoned because its action was removed.
pub const KICKSTART_CANCELLED_MESSAGE: &str = "Kickstart cancelled due to action removal";

/// One provisioning attempt against a server.
///
/// A session always has exactly one current state. Transitions append to
/// `history`; earlier entries are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Option<i64>,
    pub org_id: i64,
    pub profile_id: Option<i64>,
    /// The scheduled action driving this kickstart, if still pending.
    pub action_id: Option<i64>,
    pub server_id: Option<i64>,
    pub state: SessionState,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub history: Vec<SessionHistory>,
}

impl Session {
    pub fn new(org_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            org_id,
            profile_id: None,
            action_id: None,
            server_id: None,
            state: SessionState::Created,
            created: now,
            modified: now,
            history: Vec::new(),
        }
    }

    /// Queue a history entry. It is written on the next save.
    pub fn add_history(&mut self, state: SessionState, message: Option<String>) {
        self.history.push(SessionHistory {
            id: None,
            state,
            message,
            time: Utc::now(),
        });
    }

    /// Move to `state` and record the move in the history.
    pub fn transition(&mut self, state: SessionState, message: Option<String>) {
        self.state = state;
        self.add_history(state, message);
    }
}

/// The state of a kickstart session.
///
/// - `Created`: session exists, nothing has contacted the server yet
/// - `Started`: the installer fetched its kickstart file
/// - `ConfigurationAccessed`: the installed system pulled its configuration
/// - `Complete`: provisioning finished
/// - `Failed`: provisioning was abandoned
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Started,
    ConfigurationAccessed,
    Complete,
    Failed,
}

impl SessionState {
    pub const ALL: [SessionState; 5] = [
        Self::Created,
        Self::Started,
        Self::ConfigurationAccessed,
        Self::Complete,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::ConfigurationAccessed => "configuration_accessed",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "started" => Some(Self::Started),
            "configuration_accessed" => Some(Self::ConfigurationAccessed),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionHistory {
    /// `None` until the owning session is saved.
    pub id: Option<i64>,
    pub state: SessionState,
    pub message: Option<String>,
    pub time: DateTime<Utc>,
}

/// A progress line reported by a virtual guest while it installs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestInstallLog {
    pub id: i64,
    pub session_id: i64,
    pub message: String,
    pub created: DateTime<Utc>,
}

/// Input for failing the sessions tied to removed actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailSessionsInput {
    pub action_ids: Vec<i64>,
    pub server_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailSessionsResult {
    pub failed: usize,
}
