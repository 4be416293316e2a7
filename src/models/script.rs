use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    Pre,
    Post,
}

impl ScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pre" => Some(Self::Pre),
            "post" => Some(Self::Post),
            _ => None,
        }
    }
}

/// A `%pre` or `%post` section attached to a profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Script {
    pub id: Option<i64>,
    pub profile_id: Option<i64>,
    pub script_type: ScriptType,
    /// Interpreter passed to `--interpreter`; `None` means the installer default.
    pub interpreter: Option<String>,
    /// Run inside the installed system rather than the installer environment.
    pub chroot: bool,
    pub data: String,
    /// Scripts of the same type run in ascending position.
    pub position: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Script {
    pub fn new(script_type: ScriptType, data: impl Into<String>, position: i64) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            profile_id: None,
            script_type,
            interpreter: None,
            chroot: script_type == ScriptType::Post,
            data: data.into(),
            position,
            created: now,
            modified: now,
        }
    }
}
