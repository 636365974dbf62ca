use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::requests::repo::{BloodRequest, RequestOwner, RequestWithOwner};
use crate::types::{BloodType, Urgency};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    pub blood_type: BloodType,
    pub location: String,
    pub contact: String,
    #[serde(default = "default_urgency")]
    pub urgency: Urgency,
    pub description: Option<String>,
}

fn default_urgency() -> Urgency {
    Urgency::Medium
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestBody {
    pub blood_type: Option<BloodType>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub urgency: Option<Urgency>,
    pub description: Option<String>,
}

/// Discovery filters plus 1-based pagination.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub blood_type: Option<BloodType>,
    pub urgency: Option<Urgency>,
    pub location: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_requests: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Read model of a request, optionally enriched with the owner's contact
/// fields. The owner projection never includes credentials.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blood_type: BloodType,
    pub location: String,
    pub contact: String,
    pub urgency: Urgency,
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub fulfillment_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<RequestOwner>,
}

impl From<RequestWithOwner> for RequestResponse {
    fn from(r: RequestWithOwner) -> Self {
        let mut response = RequestResponse::from(r.request);
        response.owner = Some(r.owner);
        response
    }
}

impl From<BloodRequest> for RequestResponse {
    fn from(r: BloodRequest) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            blood_type: r.blood_type,
            location: r.location,
            contact: r.contact,
            urgency: r.urgency,
            description: r.description,
            is_active: r.is_active,
            fulfillment_date: r.fulfillment_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
            owner: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub requests: Vec<RequestResponse>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Serialize)]
pub struct OwnRequestsResponse {
    pub requests: Vec<RequestResponse>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Mutation acknowledgement carrying the resulting record.
#[derive(Debug, Serialize)]
pub struct RequestEnvelope {
    pub message: &'static str,
    pub request: RequestResponse,
}
