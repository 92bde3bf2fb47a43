//! Bookkeeping fields shared by every stored document

use bson::{doc, DateTime, Document};
use serde::{Deserialize, Serialize};

/// Creation, update and soft-delete markers
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Metadata {
    /// `$set` fragment bumping `metadata.updated_at`, merged into `fields`
    pub fn touch(mut fields: Document) -> Document {
        fields.insert("metadata.updated_at", DateTime::now());
        doc! { "$set": fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_wraps_in_set() {
        let update = Metadata::touch(doc! { "banned": true });
        let set = update.get_document("$set").unwrap();
        assert!(set.get_bool("banned").unwrap());
        assert!(set.get_datetime("metadata.updated_at").is_ok());
    }
}
