use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A kickstart directive the server knows how to render, e.g. `rootpw`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandName {
    pub id: i64,
    pub name: String,
    pub uses_arguments: bool,
    /// Every profile must carry this command.
    pub required: bool,
    /// Listed on the advanced options page.
    pub advanced: bool,
    pub sort_order: i64,
}

impl CommandName {
    pub const SELINUX: &'static str = "selinux";
    pub const LILOCHECK: &'static str = "lilocheck";
}

/// One directive on a profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    pub id: Option<i64>,
    pub profile_id: Option<i64>,
    pub command_name: CommandName,
    pub arguments: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}
