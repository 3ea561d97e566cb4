use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Document,
    Field,
    Stat,
}

impl EvidenceKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Document => "document",
            EvidenceKind::Field => "field",
            EvidenceKind::Stat => "stat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: EvidenceKind,
    pub value: String,
}

impl Evidence {
    pub fn document(value: impl Into<String>) -> Self {
        Self {
            kind: EvidenceKind::Document,
            value: value.into(),
        }
    }

    pub fn field(value: impl Into<String>) -> Self {
        Self {
            kind: EvidenceKind::Field,
            value: value.into(),
        }
    }

    pub fn stat(value: impl Into<String>) -> Self {
        Self {
            kind: EvidenceKind::Stat,
            value: value.into(),
        }
    }
}
