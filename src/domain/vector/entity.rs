//! Labelled reference vectors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Classification label of a reference example
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Label {
    Benign,
    Malicious,
}

impl From<i32> for Label {
    /// Only 1 means malicious; every other value is benign
    fn from(value: i32) -> Self {
        if value == 1 {
            Self::Malicious
        } else {
            Self::Benign
        }
    }
}

impl From<Label> for i32 {
    fn from(label: Label) -> Self {
        match label {
            Label::Benign => 0,
            Label::Malicious => 1,
        }
    }
}

impl Label {
    pub fn is_malicious(self) -> bool {
        self == Self::Malicious
    }
}

/// Hex SHA-256 of a text, the dedupe key of the corpus
pub fn text_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// A labelled example in the reference corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceVector {
    #[serde(default)]
    id: i64,
    text: String,
    text_hash: String,
    label_text: String,
    label: Label,
    embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding_type: Option<String>,
    created_at: DateTime<Utc>,
}

impl ReferenceVector {
    pub fn new(
        text: impl Into<String>,
        label_text: impl Into<String>,
        label: Label,
        embedding: Vec<f32>,
    ) -> Self {
        let text = text.into();

        Self {
            id: 0,
            text_hash: text_hash(&text),
            text,
            label_text: label_text.into(),
            label,
            embedding,
            embedding_type: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_embedding_type(mut self, embedding_type: impl Into<String>) -> Self {
        self.embedding_type = Some(embedding_type.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn text_hash(&self) -> &str {
        &self.text_hash
    }

    pub fn label_text(&self) -> &str {
        &self.label_text
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// Family tag of the generator that produced the embedding, if recorded
    pub fn embedding_type(&self) -> Option<&str> {
        self.embedding_type.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
