//! Account document schema
//!
//! Rotating login credentials. A device holds at most one account, and an
//! account is assigned to at most one device at a time.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for accounts
pub const ACCOUNT_COLLECTION: &str = "accounts";

/// Account as seen by the allocator
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub login_type: String,
    pub username: String,
    pub encounters: i64,
}

impl Account {
    pub fn new(login_type: &str, username: &str, encounters: i64) -> Self {
        Self {
            login_type: login_type.to_string(),
            username: username.to_string(),
            encounters,
        }
    }
}

/// Account document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AccountDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Login provider (e.g. "ptc", "google")
    pub login_type: String,

    pub username: String,

    /// Encounters charged against this account
    #[serde(default)]
    pub encounters: i64,

    #[serde(default)]
    pub banned: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub banned_at: Option<DateTime>,

    /// Origin currently holding this account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_origin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_assigned_at: Option<DateTime>,
}

impl AccountDoc {
    pub fn to_account(&self) -> Account {
        Account::new(&self.login_type, &self.username, self.encounters)
    }
}

impl IntoIndexes for AccountDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "login_type": 1, "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("login_unique".to_string())
                        .build(),
                ),
            ),
            // Lookup of a device's current account, and candidate scans
            (
                doc! { "assigned_origin": 1, "banned": 1, "encounters": 1 },
                Some(
                    IndexOptions::builder()
                        .name("assignment_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for AccountDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
