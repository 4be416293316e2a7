use serde::{Deserialize, Serialize};

use super::reference::CryptoKeyType;

/// A GPG or SSL key an org distributes to provisioned systems.
///
/// Descriptions are unique within an org.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CryptoKey {
    pub id: Option<i64>,
    pub org_id: i64,
    pub key_type: CryptoKeyType,
    pub description: String,
    #[serde(skip_serializing, default)]
    pub key: Vec<u8>,
}

impl CryptoKey {
    pub fn new(
        org_id: i64,
        key_type: CryptoKeyType,
        description: impl Into<String>,
        key: Vec<u8>,
    ) -> Self {
        Self {
            id: None,
            org_id,
            key_type,
            description: description.into(),
            key,
        }
    }
}
