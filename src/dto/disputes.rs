use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Dispute, DisputeReason, Order};

#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenDisputeRequest {
    pub reason: DisputeReason,
    pub description: String,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RespondDisputeRequest {
    pub response: String,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisputeWithOrder {
    pub dispute: Dispute,
    pub order: Order,
}
