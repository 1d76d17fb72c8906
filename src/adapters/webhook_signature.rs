use {
    crate::domain::{error::PaymentError, webhook::WebhookEnvelope},
    sha2::{Digest, Sha256},
    subtle::ConstantTimeEq,
};

/// Header the gateway mirrors the body checksum into.
pub const CHECKSUM_HEADER: &str = "X-Event-Checksum";

/// Checks event checksums against the events secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    events_secret: String,
    require_signature: bool,
}

impl WebhookVerifier {
    pub fn new(events_secret: impl Into<String>, require_signature: bool) -> Self {
        Self {
            events_secret: events_secret.into(),
            require_signature,
        }
    }

    /// Returns the verified checksum, or `None` for an unsigned event that
    /// was let through because signatures are not required.
    pub fn verify(
        &self,
        envelope: &WebhookEnvelope,
        header: Option<&str>,
    ) -> Result<Option<String>, PaymentError> {
        let Some(signature) = &envelope.signature else {
            if self.require_signature {
                return Err(PaymentError::Authenticity("event is not signed".into()));
            }
            tracing::warn!(event = %envelope.event, "accepting unsigned event");
            return Ok(None);
        };

        let timestamp = envelope
            .timestamp
            .ok_or_else(|| PaymentError::Authenticity("signed event has no timestamp".into()))?;

        let expected = compute_checksum(
            &envelope.data,
            &signature.properties,
            timestamp,
            &self.events_secret,
        )?;

        if !checksums_match(&expected, &signature.checksum) {
            return Err(PaymentError::Authenticity("checksum mismatch".into()));
        }

        if let Some(header) = header
            && !checksums_match(header.trim(), &signature.checksum)
        {
            return Err(PaymentError::Authenticity(format!(
                "{CHECKSUM_HEADER} does not match body checksum"
            )));
        }

        Ok(Some(signature.checksum.clone()))
    }
}

/// Hex SHA-256 over the values named by `properties` (dot paths into `data`),
/// then the timestamp, then the secret.
pub fn compute_checksum(
    data: &serde_json::Value,
    properties: &[String],
    timestamp: i64,
    secret: &str,
) -> Result<String, PaymentError> {
    let mut hasher = Sha256::new();

    for property in properties {
        let value = property
            .split('.')
            .try_fold(data, |node, key| node.get(key))
            .ok_or_else(|| {
                PaymentError::Authenticity(format!("signed property {property} is missing"))
            })?;

        match value {
            serde_json::Value::String(s) => hasher.update(s.as_bytes()),
            serde_json::Value::Null => {}
            other => hasher.update(other.to_string().as_bytes()),
        }
    }

    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(secret.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn checksums_match(expected: &str, given: &str) -> bool {
    // gateway sends upper-case hex
    let expected = expected.to_ascii_lowercase();
    let given = given.to_ascii_lowercase();
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_events_secret";

    fn signed_envelope(checksum: Option<String>) -> WebhookEnvelope {
        let data = serde_json::json!({
            "transaction": {
                "id": "1234-1610641025-49201",
                "status": "APPROVED",
                "amount_in_cents": 5000000,
                "currency": "COP",
                "reference": "CLN-abc"
            }
        });
        let properties = vec![
            "transaction.id".to_string(),
            "transaction.status".to_string(),
            "transaction.amount_in_cents".to_string(),
        ];
        let checksum = checksum.unwrap_or_else(|| {
            compute_checksum(&data, &properties, 1_530_291_411, SECRET).unwrap()
        });
        serde_json::from_value(serde_json::json!({
            "event": "transaction.updated",
            "data": data,
            "signature": { "properties": properties, "checksum": checksum },
            "timestamp": 1_530_291_411
        }))
        .unwrap()
    }

    #[test]
    fn checksum_concatenates_properties_timestamp_and_secret() {
        let data = serde_json::json!({"transaction": {"id": "T1", "amount_in_cents": 100}});
        let props: Vec<String> = vec!["transaction.id".into(), "transaction.amount_in_cents".into()];
        let got = compute_checksum(&data, &props, 42, "s").unwrap();
        assert_eq!(got, hex::encode(Sha256::digest(b"T110042s")));
    }

    #[test]
    fn valid_signature_passes_and_header_is_case_insensitive() {
        let verifier = WebhookVerifier::new(SECRET, true);
        let envelope = signed_envelope(None);
        let checksum = envelope.signature.as_ref().unwrap().checksum.clone();
        let verified = verifier
            .verify(&envelope, Some(&checksum.to_ascii_uppercase()))
            .unwrap();
        assert_eq!(verified, Some(checksum));
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let verifier = WebhookVerifier::new(SECRET, true);
        let envelope = signed_envelope(Some("00".repeat(32)));
        assert!(matches!(
            verifier.verify(&envelope, None),
            Err(PaymentError::Authenticity(_))
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = WebhookVerifier::new("other_secret", true);
        assert!(verifier.verify(&signed_envelope(None), None).is_err());
    }

    #[test]
    fn header_must_agree_with_body() {
        let verifier = WebhookVerifier::new(SECRET, true);
        let envelope = signed_envelope(None);
        assert!(verifier.verify(&envelope, Some("deadbeef")).is_err());
    }

    #[test]
    fn unsigned_event_depends_on_policy() {
        let mut envelope = signed_envelope(None);
        envelope.signature = None;

        let strict = WebhookVerifier::new(SECRET, true);
        assert!(matches!(
            strict.verify(&envelope, None),
            Err(PaymentError::Authenticity(_))
        ));

        let lenient = WebhookVerifier::new(SECRET, false);
        assert_eq!(lenient.verify(&envelope, None).unwrap(), None);
    }

    #[test]
    fn missing_signed_property_is_rejected() {
        let data = serde_json::json!({"transaction": {"id": "T1"}});
        let props = vec!["transaction.status".to_string()];
        assert!(compute_checksum(&data, &props, 1, SECRET).is_err());
    }
}
