use {
    crate::{
        config::GatewaySettings,
        domain::{
            gateway::{
                AcceptanceTokens, GatewayError, GatewayLink, GatewayResult, GatewayStatus,
                GatewayTransaction, GatewayVoid, PaymentGateway, PaymentLinkRequest,
                TransactionRequest, VoidRequest,
            },
            id::ExternalId,
            money::{Currency, MoneyAmount},
        },
    },
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    sha2::{Digest, Sha256},
};

/// HTTP client for the payment gateway's REST API.
pub struct HttpGateway {
    client: reqwest::Client,
    settings: GatewaySettings,
}

impl HttpGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Terminal(format!("http client: {e}")))?;
        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }
}

/// Hex SHA-256 of `reference ‖ amount ‖ currency ‖ secret`, which the gateway
/// uses to check that amount and reference were not altered in transit.
pub fn integrity_signature(
    reference: &str,
    amount: MoneyAmount,
    currency: Currency,
    secret: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reference.as_bytes());
    hasher.update(amount.minor_units().to_string().as_bytes());
    hasher.update(currency.as_str().as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Sorts a non-2xx response into validation / transient / terminal.
pub fn classify_status(status: u16, body: &str) -> GatewayError {
    match status {
        429 => GatewayError::Transient(format!("rate limited: {body}")),
        401 | 403 => GatewayError::Terminal(format!("gateway refused credentials ({status})")),
        404 => GatewayError::Terminal(format!("gateway resource not found: {body}")),
        400..=499 => {
            let parsed: serde_json::Value =
                serde_json::from_str(body).unwrap_or_else(|_| serde_json::json!(body));
            let messages = parsed
                .pointer("/error/messages")
                .or_else(|| parsed.get("error"))
                .cloned()
                .unwrap_or(parsed);
            GatewayError::Validation { status, messages }
        }
        _ => GatewayError::Transient(format!("gateway returned {status}: {body}")),
    }
}

fn classify_transport(err: reqwest::Error) -> GatewayError {
    if err.is_decode() || err.is_builder() {
        GatewayError::Terminal(err.to_string())
    } else {
        // timeouts, refused connections, resets
        GatewayError::Transient(err.to_string())
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct TransactionData {
    id: String,
    status: String,
    amount_in_cents: i64,
    currency: String,
    reference: String,
    #[serde(default)]
    payment_link_id: Option<String>,
    #[serde(default)]
    redirect_url: Option<String>,
    #[serde(default)]
    payment_method: Option<serde_json::Value>,
}

impl TransactionData {
    fn into_domain(self, raw: serde_json::Value) -> Result<GatewayTransaction, GatewayError> {
        let invalid = |e: crate::domain::error::PaymentError| {
            GatewayError::Terminal(format!("unexpected gateway transaction: {e}"))
        };
        // PSE-style flows hand back a bank URL the payer must be sent to.
        let async_url = self
            .payment_method
            .as_ref()
            .and_then(|pm| pm.pointer("/extra/async_payment_url"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(GatewayTransaction {
            id: ExternalId::new(self.id).map_err(invalid)?,
            status: GatewayStatus::from(self.status),
            amount: MoneyAmount::new(self.amount_in_cents).map_err(invalid)?,
            currency: Currency::try_from(self.currency.as_str()).map_err(invalid)?,
            reference: self.reference,
            payment_link_id: self.payment_link_id,
            redirect_url: async_url.or(self.redirect_url),
            raw,
        })
    }
}

#[derive(Deserialize)]
struct LinkData {
    id: String,
}

#[derive(Deserialize)]
struct VoidData {
    transaction: VoidedTransaction,
}

#[derive(Deserialize)]
struct VoidedTransaction {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct MerchantData {
    presigned_acceptance: Presigned,
    presigned_personal_data_auth: Presigned,
}

#[derive(Deserialize)]
struct Presigned {
    acceptance_token: String,
}

#[derive(Serialize)]
struct CreateTransactionBody<'a> {
    amount_in_cents: i64,
    currency: &'static str,
    customer_email: &'a str,
    reference: &'a str,
    signature: String,
    payment_method: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    acceptance_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accept_personal_auth: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_url: Option<&'a str>,
}

#[derive(Serialize)]
struct CreateLinkBody<'a> {
    name: &'a str,
    description: &'a str,
    single_use: bool,
    collect_shipping: bool,
    currency: &'static str,
    amount_in_cents: i64,
    sku: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_url: Option<&'a str>,
}

#[derive(Serialize)]
struct VoidBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount_in_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

impl HttpGateway {
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(T, serde_json::Value), GatewayError> {
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            let err = classify_status(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), error = %err, "gateway call failed");
            return Err(err);
        }

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Terminal(format!("undecodable gateway body: {e}")))?;
        let envelope: Envelope<T> = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Terminal(format!("unexpected gateway body: {e}")))?;
        Ok((envelope.data, raw))
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.settings.private_key)
    }

    async fn create_transaction_inner(
        &self,
        request: &TransactionRequest,
    ) -> Result<GatewayTransaction, GatewayError> {
        let amount = request.money.amount();
        let currency = request.money.currency();
        let body = CreateTransactionBody {
            amount_in_cents: amount.minor_units(),
            currency: currency.as_str(),
            customer_email: &request.customer_email,
            reference: request.reference.as_str(),
            signature: integrity_signature(
                request.reference.as_str(),
                amount,
                currency,
                &self.settings.integrity_secret,
            ),
            payment_method: &request.payment_method,
            acceptance_token: request
                .acceptance
                .as_ref()
                .map(|a| a.acceptance_token.as_str()),
            accept_personal_auth: request
                .acceptance
                .as_ref()
                .map(|a| a.personal_auth_token.as_str()),
            redirect_url: request.redirect_url.as_deref(),
        };

        tracing::debug!(reference = %request.reference, "creating gateway transaction");
        let (data, raw) = self
            .send::<TransactionData>(
                self.authed(self.client.post(self.url("/transactions")))
                    .json(&body),
            )
            .await?;
        data.into_domain(raw)
    }

    async fn create_payment_link_inner(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<GatewayLink, GatewayError> {
        let body = CreateLinkBody {
            name: &request.name,
            description: &request.description,
            single_use: request.single_use,
            collect_shipping: false,
            currency: request.money.currency().as_str(),
            amount_in_cents: request.money.amount().minor_units(),
            sku: request.reference.as_str(),
            expires_at: request.expires_at.map(|t| t.to_rfc3339()),
            redirect_url: request.redirect_url.as_deref(),
        };

        tracing::debug!(reference = %request.reference, "creating gateway payment link");
        let (data, raw) = self
            .send::<LinkData>(
                self.authed(self.client.post(self.url("/payment_links")))
                    .json(&body),
            )
            .await?;

        Ok(GatewayLink {
            permalink: format!(
                "{}/l/{}",
                self.settings.checkout_url.trim_end_matches('/'),
                data.id
            ),
            id: data.id,
            raw,
        })
    }

    async fn confirm_transaction_inner(
        &self,
        id: &ExternalId,
        proof: &serde_json::Value,
    ) -> Result<GatewayTransaction, GatewayError> {
        let (data, raw) = self
            .send::<TransactionData>(
                self.authed(
                    self.client
                        .post(self.url(&format!("/transactions/{id}/confirm"))),
                )
                .json(proof),
            )
            .await?;
        data.into_domain(raw)
    }

    async fn get_transaction_inner(
        &self,
        id: &ExternalId,
    ) -> Result<GatewayTransaction, GatewayError> {
        let (data, raw) = self
            .send::<TransactionData>(
                self.authed(self.client.get(self.url(&format!("/transactions/{id}")))),
            )
            .await?;
        data.into_domain(raw)
    }

    async fn void_transaction_inner(
        &self,
        request: &VoidRequest,
    ) -> Result<GatewayVoid, GatewayError> {
        let body = VoidBody {
            amount_in_cents: request.amount.map(|a| a.minor_units()),
            reason: request.reason.as_deref(),
        };
        let (data, raw) = self
            .send::<VoidData>(
                self.authed(self.client.post(self.url(&format!(
                    "/transactions/{}/void",
                    request.transaction_id
                ))))
                .json(&body),
            )
            .await?;

        Ok(GatewayVoid {
            transaction_id: ExternalId::new(data.transaction.id).map_err(|e| {
                GatewayError::Terminal(format!("unexpected void response: {e}"))
            })?,
            status: data
                .transaction
                .status
                .map(GatewayStatus::from)
                .unwrap_or(GatewayStatus::Voided),
            raw,
        })
    }

    async fn acceptance_tokens_inner(&self) -> Result<AcceptanceTokens, GatewayError> {
        let (data, _) = self
            .send::<MerchantData>(self.client.get(self.url(&format!(
                "/merchants/{}",
                self.settings.public_key
            ))))
            .await?;

        Ok(AcceptanceTokens {
            acceptance_token: data.presigned_acceptance.acceptance_token,
            personal_auth_token: data.presigned_personal_data_auth.acceptance_token,
        })
    }
}

impl PaymentGateway for HttpGateway {
    fn create_transaction<'a>(
        &'a self,
        request: &'a TransactionRequest,
    ) -> GatewayResult<'a, GatewayTransaction> {
        Box::pin(self.create_transaction_inner(request))
    }

    fn create_payment_link<'a>(
        &'a self,
        request: &'a PaymentLinkRequest,
    ) -> GatewayResult<'a, GatewayLink> {
        Box::pin(self.create_payment_link_inner(request))
    }

    fn confirm_transaction<'a>(
        &'a self,
        id: &'a ExternalId,
        proof: &'a serde_json::Value,
    ) -> GatewayResult<'a, GatewayTransaction> {
        Box::pin(self.confirm_transaction_inner(id, proof))
    }

    fn get_transaction<'a>(&'a self, id: &'a ExternalId) -> GatewayResult<'a, GatewayTransaction> {
        Box::pin(self.get_transaction_inner(id))
    }

    fn void_transaction<'a>(&'a self, request: &'a VoidRequest) -> GatewayResult<'a, GatewayVoid> {
        Box::pin(self.void_transaction_inner(request))
    }

    fn acceptance_tokens(&self) -> GatewayResult<'_, AcceptanceTokens> {
        Box::pin(self.acceptance_tokens_inner())
    }
}
