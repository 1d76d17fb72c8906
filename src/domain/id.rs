use {
    super::error::PaymentError,
    derive_more::Display,
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Gateway-assigned transaction identifier (e.g. `1234-1610641025-49201`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Result<Self, PaymentError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(PaymentError::Validation(format!(
                "ExternalId must be non-empty without whitespace, got: {id:?}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Idempotency reference sent to the gateway. A fresh one is generated per
/// creation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    const PREFIX: &'static str = "CLN";

    pub fn generate() -> Self {
        Self(format!("{}-{}", Self::PREFIX, Uuid::now_v7().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_references_are_distinct() {
        let a = Reference::generate();
        let b = Reference::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("CLN-"));
    }

    #[test]
    fn external_id_rejects_blank() {
        assert!(ExternalId::new("").is_err());
        assert!(ExternalId::new("12 34").is_err());
        assert!(ExternalId::new("1234-1610641025-49201").is_ok());
    }
}
