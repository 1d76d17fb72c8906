use {
    crate::domain::{
        entitlement::NewEntitlement,
        error::PaymentError,
        purchase::{Purchase, PurchaseTarget},
        store::{Catalog, EntitlementStore},
    },
    chrono::{Duration, Utc},
    std::sync::Arc,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Created(u64),
    AlreadyGranted,
}

/// Turns a completed purchase into session entitlements, at most once.
pub struct EntitlementGranter {
    entitlements: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn Catalog>,
}

impl EntitlementGranter {
    pub fn new(entitlements: Arc<dyn EntitlementStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            entitlements,
            catalog,
        }
    }

    pub async fn grant(&self, purchase: &Purchase) -> Result<GrantOutcome, PaymentError> {
        if self.entitlements.has_entitlements(purchase.id).await? {
            return Ok(GrantOutcome::AlreadyGranted);
        }

        let now = Utc::now();
        let rows: Vec<NewEntitlement> = match purchase.target {
            PurchaseTarget::Package(package_id) => {
                let package = self
                    .catalog
                    .get_package(package_id)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(format!("package {package_id}")))?;
                let expires_at = now + Duration::days(i64::from(package.validity_days));

                package
                    .items
                    .iter()
                    .map(|item| NewEntitlement {
                        id: Uuid::now_v7(),
                        purchase_id: purchase.id,
                        service_id: item.service_id,
                        remaining: item.sessions,
                        expires_at,
                    })
                    .collect()
            }
            PurchaseTarget::Service(service_id) => {
                let service = self
                    .catalog
                    .get_service(service_id)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(format!("service {service_id}")))?;

                vec![NewEntitlement {
                    id: Uuid::now_v7(),
                    purchase_id: purchase.id,
                    service_id,
                    remaining: 1,
                    expires_at: now + Duration::days(i64::from(service.validity_days)),
                }]
            }
        };

        if rows.is_empty() {
            tracing::warn!(purchase_id = %purchase.id, "package has no items, nothing to grant");
            return Ok(GrantOutcome::Created(0));
        }

        // A concurrent grant may have won between the check and the insert.
        let inserted = self.entitlements.insert_entitlements(&rows).await?;
        if inserted == 0 {
            return Ok(GrantOutcome::AlreadyGranted);
        }

        tracing::info!(purchase_id = %purchase.id, count = inserted, "entitlements granted");
        Ok(GrantOutcome::Created(inserted))
    }
}
