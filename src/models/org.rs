use serde::{Deserialize, Serialize};

/// A tenant. Everything a customer creates is owned by exactly one org.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Org {
    pub id: i64,
    pub name: String,
}

/// The user an edit operation runs on behalf of.
///
/// Authentication happens outside this crate; all the data layer needs is the
/// org the user belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub org_id: i64,
}

impl User {
    pub fn new(login: impl Into<String>, org_id: i64) -> Self {
        Self {
            login: login.into(),
            org_id,
        }
    }
}
