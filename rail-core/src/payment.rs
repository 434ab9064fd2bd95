use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rail_shared::Masked;

use crate::{CoreError, CoreResult};

/// Card data as entered by the traveller. Never logged in clear.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub card_number: Masked<String>,
    pub expiry_date: String,
    pub cvv: Masked<String>,
}

impl CardDetails {
    pub fn validate(&self) -> CoreResult<()> {
        if self.card_number.is_blank() || self.expiry_date.trim().is_empty() || self.cvv.is_blank() {
            return Err(CoreError::ValidationError(
                "cardNumber, expiryDate and cvv are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order_id: i64,
    pub amount_minor: i64,
    pub card: CardDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "outcome")]
pub enum PaymentOutcome {
    Approved { transaction_id: String },
    Declined { reason: String },
}

/// Opaque payment provider. An `Err` means the provider could not be reached;
/// a refusal is reported as `PaymentOutcome::Declined`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> CoreResult<PaymentOutcome>;
}
