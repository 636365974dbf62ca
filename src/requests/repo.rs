use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::{BloodType, Urgency};

/// Blood request record. `is_active = false` is the single terminal flag;
/// `fulfillment_date` distinguishes fulfilled from withdrawn.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BloodRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blood_type: BloodType,
    pub location: String,
    pub contact: String,
    pub urgency: Urgency,
    pub description: Option<String>,
    pub is_active: bool,
    pub fulfillment_date: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub user_id: Uuid,
    pub blood_type: BloodType,
    pub location: String,
    pub contact: String,
    pub urgency: Urgency,
    pub description: Option<String>,
}

/// Allow-listed mutable fields; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct RequestPatch {
    pub blood_type: Option<BloodType>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub urgency: Option<Urgency>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub blood_type: Option<BloodType>,
    pub urgency: Option<Urgency>,
    pub location: Option<String>,
}

/// Owner fields a request is enriched with for display. Never the hash.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOwner {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequestWithOwner {
    pub request: BloodRequest,
    pub owner: RequestOwner,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, new: NewRequest) -> anyhow::Result<BloodRequest>;

    /// Active record by id, enriched with owner fields.
    async fn find_active(&self, id: Uuid) -> anyhow::Result<Option<RequestWithOwner>>;

    /// Partial update gated on `id AND owner AND active` in one statement.
    /// `None` covers both "no such id" and "not the owner".
    async fn update_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &RequestPatch,
    ) -> anyhow::Result<Option<BloodRequest>>;

    /// Atomic transition out of Active. `fulfilled` stamps the fulfillment
    /// date; a withdrawal leaves it null. A second call finds no active row.
    async fn close_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fulfilled: bool,
    ) -> anyhow::Result<Option<BloodRequest>>;

    /// Active records matching the filter, urgency high-first then newest,
    /// plus the total match count for pagination.
    async fn list_active(
        &self,
        filter: &RequestFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<RequestWithOwner>, i64)>;

    /// Owner's active requests, newest first.
    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<BloodRequest>>;
}

const REQUEST_COLUMNS: &str = "id, user_id, blood_type, location, contact, urgency, description, is_active, fulfillment_date, created_at, updated_at";

/// Flattened join row used by the enriched read queries.
#[derive(Debug, FromRow)]
struct RequestOwnerRow {
    id: Uuid,
    user_id: Uuid,
    blood_type: BloodType,
    location: String,
    contact: String,
    urgency: Urgency,
    description: Option<String>,
    is_active: bool,
    fulfillment_date: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    owner_name: String,
    owner_email: String,
    owner_phone: Option<String>,
}

impl From<RequestOwnerRow> for RequestWithOwner {
    fn from(r: RequestOwnerRow) -> Self {
        Self {
            request: BloodRequest {
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
            },
            owner: RequestOwner {
                name: r.owner_name,
                email: r.owner_email,
                phone: r.owner_phone,
            },
        }
    }
}

const ENRICHED_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.blood_type, r.location, r.contact, r.urgency,
           r.description, r.is_active, r.fulfillment_date, r.created_at, r.updated_at,
           u.name AS owner_name, u.email AS owner_email, u.phone AS owner_phone
    FROM blood_requests r
    JOIN users u ON u.id = r.user_id
    WHERE r.is_active = TRUE
"#;

pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a RequestFilter) {
    if let Some(bt) = filter.blood_type {
        qb.push(" AND r.blood_type = ").push_bind(bt);
    }
    if let Some(urgency) = filter.urgency {
        qb.push(" AND r.urgency = ").push_bind(urgency);
    }
    if let Some(location) = &filter.location {
        qb.push(" AND r.location ILIKE ")
            .push_bind(format!("%{location}%"));
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn insert(&self, new: NewRequest) -> anyhow::Result<BloodRequest> {
        let request = sqlx::query_as::<_, BloodRequest>(&format!(
            r#"
            INSERT INTO blood_requests (user_id, blood_type, location, contact, urgency, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REQUEST_COLUMNS}
            "#,
        ))
        .bind(new.user_id)
        .bind(new.blood_type)
        .bind(&new.location)
        .bind(&new.contact)
        .bind(new.urgency)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(request)
    }

    async fn find_active(&self, id: Uuid) -> anyhow::Result<Option<RequestWithOwner>> {
        let row = sqlx::query_as::<_, RequestOwnerRow>(&format!("{ENRICHED_SELECT} AND r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &RequestPatch,
    ) -> anyhow::Result<Option<BloodRequest>> {
        let request = sqlx::query_as::<_, BloodRequest>(&format!(
            r#"
            UPDATE blood_requests
            SET blood_type = COALESCE($3, blood_type),
                location = COALESCE($4, location),
                contact = COALESCE($5, contact),
                urgency = COALESCE($6, urgency),
                description = COALESCE($7, description),
                updated_at = now()
            WHERE id = $1 AND user_id = $2 AND is_active = TRUE
            RETURNING {REQUEST_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(owner_id)
        .bind(patch.blood_type)
        .bind(&patch.location)
        .bind(&patch.contact)
        .bind(patch.urgency)
        .bind(&patch.description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn close_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fulfilled: bool,
    ) -> anyhow::Result<Option<BloodRequest>> {
        let request = sqlx::query_as::<_, BloodRequest>(&format!(
            r#"
            UPDATE blood_requests
            SET is_active = FALSE,
                fulfillment_date = CASE WHEN $3 THEN now() ELSE fulfillment_date END,
                updated_at = now()
            WHERE id = $1 AND user_id = $2 AND is_active = TRUE
            RETURNING {REQUEST_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(owner_id)
        .bind(fulfilled)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn list_active(
        &self,
        filter: &RequestFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<RequestWithOwner>, i64)> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(ENRICHED_SELECT);
        push_filters(&mut qb, filter);
        qb.push(
            " ORDER BY CASE r.urgency WHEN 'high' THEN 3 WHEN 'medium' THEN 2 ELSE 1 END DESC, r.created_at DESC",
        );
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);
        let rows: Vec<RequestOwnerRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM blood_requests r WHERE r.is_active = TRUE");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<BloodRequest>> {
        let rows = sqlx::query_as::<_, BloodRequest>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM blood_requests
            WHERE user_id = $1 AND is_active = TRUE
            ORDER BY created_at DESC
            "#,
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
