use tracing::info;
use uuid::Uuid;

use crate::auth::repo::User;
use crate::error::{ApiError, FieldError};
use crate::requests::dto::{
    CreateRequestBody, ListQuery, ListResponse, OwnRequestsResponse, PaginationInfo,
    RequestResponse, UpdateRequestBody,
};
use crate::requests::repo::{NewRequest, RequestFilter, RequestOwner, RequestPatch};
use crate::state::AppState;

const MAX_LIMIT: i64 = 100;

fn validate_location(location: &str, errors: &mut Vec<FieldError>) {
    let len = location.chars().count();
    if !(3..=100).contains(&len) {
        errors.push(FieldError::new("location", "Location must be 3-100 chars"));
    }
}

fn validate_contact(contact: &str, errors: &mut Vec<FieldError>) {
    let len = contact.chars().count();
    if !(10..=50).contains(&len) {
        errors.push(FieldError::new("contact", "Contact must be 10-50 chars"));
    }
}

fn validate_description(description: &str, errors: &mut Vec<FieldError>) {
    if description.chars().count() > 500 {
        errors.push(FieldError::new("description", "Description max 500 chars"));
    }
}

fn owner_projection(user: &User) -> RequestOwner {
    RequestOwner {
        name: user.name.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
    }
}

pub async fn create_request(
    state: &AppState,
    owner: &User,
    body: CreateRequestBody,
) -> Result<RequestResponse, ApiError> {
    let location = body.location.trim().to_string();
    let contact = body.contact.trim().to_string();
    let description = body
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let mut errors = Vec::new();
    validate_location(&location, &mut errors);
    validate_contact(&contact, &mut errors);
    if let Some(description) = &description {
        validate_description(description, &mut errors);
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let request = state
        .requests
        .insert(NewRequest {
            user_id: owner.id,
            blood_type: body.blood_type,
            location,
            contact,
            urgency: body.urgency,
            description,
        })
        .await?;
    info!(request_id = %request.id, user_id = %owner.id, "blood request created");

    let mut response = RequestResponse::from(request);
    response.owner = Some(owner_projection(owner));
    Ok(response)
}

pub async fn get_request(state: &AppState, id: Uuid) -> Result<RequestResponse, ApiError> {
    let request = state
        .requests
        .find_active(id)
        .await?
        .ok_or(ApiError::NotFound("Blood request"))?;
    Ok(request.into())
}

pub async fn list_requests(state: &AppState, query: ListQuery) -> Result<ListResponse, ApiError> {
    let mut errors = Vec::new();
    if query.page < 1 {
        errors.push(FieldError::new("page", "Page must be a positive integer"));
    }
    if !(1..=MAX_LIMIT).contains(&query.limit) {
        errors.push(FieldError::new("limit", "Limit must be between 1 and 100"));
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let filter = RequestFilter {
        blood_type: query.blood_type,
        urgency: query.urgency,
        location: query.location,
    };
    let offset = (query.page - 1) * query.limit;
    let (items, total) = state.requests.list_active(&filter, query.limit, offset).await?;

    Ok(ListResponse {
        requests: items.into_iter().map(Into::into).collect(),
        pagination: PaginationInfo {
            current_page: query.page,
            total_pages: (total + query.limit - 1) / query.limit,
            total_requests: total,
            has_next: query.page * query.limit < total,
            has_prev: query.page > 1,
        },
    })
}

pub async fn list_own(state: &AppState, owner: &User) -> Result<OwnRequestsResponse, ApiError> {
    let requests = state.requests.list_by_owner(owner.id).await?;
    Ok(OwnRequestsResponse {
        requests: requests.into_iter().map(Into::into).collect(),
    })
}

pub async fn update_request(
    state: &AppState,
    owner: &User,
    id: Uuid,
    body: UpdateRequestBody,
) -> Result<RequestResponse, ApiError> {
    let location = body.location.map(|l| l.trim().to_string());
    let contact = body.contact.map(|c| c.trim().to_string());
    let description = body.description.map(|d| d.trim().to_string());

    let mut errors = Vec::new();
    if let Some(location) = &location {
        validate_location(location, &mut errors);
    }
    if let Some(contact) = &contact {
        validate_contact(contact, &mut errors);
    }
    if let Some(description) = &description {
        validate_description(description, &mut errors);
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let patch = RequestPatch {
        blood_type: body.blood_type,
        location,
        contact,
        urgency: body.urgency,
        description,
    };
    let request = state
        .requests
        .update_owned(id, owner.id, &patch)
        .await?
        .ok_or(ApiError::NotFound("Blood request"))?;
    info!(request_id = %request.id, user_id = %owner.id, "blood request updated");

    let mut response = RequestResponse::from(request);
    response.owner = Some(owner_projection(owner));
    Ok(response)
}

pub async fn withdraw_request(state: &AppState, owner: &User, id: Uuid) -> Result<(), ApiError> {
    state
        .requests
        .close_owned(id, owner.id, false)
        .await?
        .ok_or(ApiError::NotFound("Blood request"))?;
    info!(request_id = %id, user_id = %owner.id, "blood request withdrawn");
    Ok(())
}

pub async fn fulfill_request(
    state: &AppState,
    owner: &User,
    id: Uuid,
) -> Result<RequestResponse, ApiError> {
    let request = state
        .requests
        .close_owned(id, owner.id, true)
        .await?
        .ok_or(ApiError::NotFound("Blood request"))?;
    info!(request_id = %id, user_id = %owner.id, "blood request fulfilled");
    Ok(request.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::dto::{LoginRequest, RegisterRequest};
    use crate::auth::repo::NewUser;
    use crate::types::{BloodType, Role, Urgency};

    async fn seed_user(state: &AppState, email: &str) -> User {
        state
            .users
            .insert(NewUser {
                name: "Alice".into(),
                email: email.into(),
                password_hash: "$argon2id$placeholder".into(),
                blood_type: None,
                phone: Some("9998887777".into()),
                location: None,
                role: Role::Patient,
            })
            .await
            .expect("insert user")
    }

    fn body(blood_type: BloodType, urgency: Urgency) -> CreateRequestBody {
        CreateRequestBody {
            blood_type,
            location: "City Hospital".into(),
            contact: "9998887777".into(),
            urgency,
            description: None,
        }
    }

    fn default_query() -> ListQuery {
        ListQuery {
            page: 1,
            limit: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_validates_field_bounds() {
        let state = AppState::in_memory();
        let owner = seed_user(&state, "alice@x.com").await;
        let err = create_request(
            &state,
            &owner,
            CreateRequestBody {
                blood_type: BloodType::ONeg,
                location: "ab".into(),
                contact: "short".into(),
                urgency: Urgency::High,
                description: Some("x".repeat(501)),
            },
        )
        .await
        .unwrap_err();
        match err {
            ApiError::Validation(details) => {
                let fields: Vec<_> = details.iter().map(|d| d.field).collect();
                assert!(fields.contains(&"location"));
                assert!(fields.contains(&"contact"));
                assert!(fields.contains(&"description"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_owner_mutation_looks_like_missing_id() {
        let state = AppState::in_memory();
        let alice = seed_user(&state, "alice@x.com").await;
        let bob = seed_user(&state, "bob@x.com").await;
        let created = create_request(&state, &alice, body(BloodType::ONeg, Urgency::High))
            .await
            .expect("create");

        let foreign = update_request(
            &state,
            &bob,
            created.id,
            UpdateRequestBody {
                urgency: Some(Urgency::Low),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        let missing = update_request(
            &state,
            &bob,
            Uuid::new_v4(),
            UpdateRequestBody {
                urgency: Some(Urgency::Low),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(foreign, ApiError::NotFound("Blood request")));
        assert!(matches!(missing, ApiError::NotFound("Blood request")));

        // The record is untouched.
        let current = get_request(&state, created.id).await.expect("still active");
        assert_eq!(current.urgency, Urgency::High);
    }

    #[tokio::test]
    async fn owner_can_partially_update_active_request() {
        let state = AppState::in_memory();
        let owner = seed_user(&state, "alice@x.com").await;
        let created = create_request(&state, &owner, body(BloodType::APos, Urgency::Medium))
            .await
            .expect("create");

        let updated = update_request(
            &state,
            &owner,
            created.id,
            UpdateRequestBody {
                urgency: Some(Urgency::High),
                description: Some("post-surgery transfusion".into()),
                ..Default::default()
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.urgency, Urgency::High);
        assert_eq!(updated.description.as_deref(), Some("post-surgery transfusion"));
        // Unsupplied fields keep their values.
        assert_eq!(updated.blood_type, BloodType::APos);
        assert_eq!(updated.location, "City Hospital");
    }

    #[tokio::test]
    async fn update_revalidates_supplied_fields() {
        let state = AppState::in_memory();
        let owner = seed_user(&state, "alice@x.com").await;
        let created = create_request(&state, &owner, body(BloodType::APos, Urgency::Medium))
            .await
            .expect("create");
        let err = update_request(
            &state,
            &owner,
            created.id,
            UpdateRequestBody {
                location: Some("ab".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn fulfill_is_terminal_and_second_call_fails() {
        let state = AppState::in_memory();
        let owner = seed_user(&state, "alice@x.com").await;
        let created = create_request(&state, &owner, body(BloodType::BNeg, Urgency::High))
            .await
            .expect("create");

        let fulfilled = fulfill_request(&state, &owner, created.id)
            .await
            .expect("first fulfill");
        assert!(!fulfilled.is_active);
        assert!(fulfilled.fulfillment_date.is_some());

        let err = fulfill_request(&state, &owner, created.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound("Blood request")));

        // State equals the state after the first call alone: no active rows
        // and no further transition possible, fulfilled or withdrawn.
        let (_, total) = state
            .requests
            .list_active(&RequestFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(total, 0);
        let err = withdraw_request(&state, &owner, created.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn withdrawal_leaves_fulfillment_date_unset() {
        let state = AppState::in_memory();
        let owner = seed_user(&state, "alice@x.com").await;
        let created = create_request(&state, &owner, body(BloodType::BNeg, Urgency::Low))
            .await
            .expect("create");

        withdraw_request(&state, &owner, created.id).await.expect("withdraw");

        // Gone from discovery and from the owner's own view.
        let err = get_request(&state, created.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let own = list_own(&state, &owner).await.unwrap();
        assert!(own.requests.is_empty());

        // Withdrawing again is the same unified error.
        let err = withdraw_request(&state, &owner, created.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn listing_orders_by_urgency_then_newest() {
        let state = AppState::in_memory();
        let owner = seed_user(&state, "alice@x.com").await;
        let low = create_request(&state, &owner, body(BloodType::OPos, Urgency::Low))
            .await
            .unwrap();
        let high = create_request(&state, &owner, body(BloodType::OPos, Urgency::High))
            .await
            .unwrap();
        let medium = create_request(&state, &owner, body(BloodType::OPos, Urgency::Medium))
            .await
            .unwrap();

        let listed = list_requests(&state, default_query()).await.unwrap();
        let ids: Vec<Uuid> = listed.requests.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![high.id, medium.id, low.id]);

        // Equal urgency ties break newest-first.
        let newer_high = create_request(&state, &owner, body(BloodType::OPos, Urgency::High))
            .await
            .unwrap();
        let listed = list_requests(&state, default_query()).await.unwrap();
        let ids: Vec<Uuid> = listed.requests.iter().map(|r| r.id).collect();
        assert_eq!(ids[0], newer_high.id);
        assert_eq!(ids[1], high.id);
    }

    #[tokio::test]
    async fn pagination_reports_pages_and_flags() {
        let state = AppState::in_memory();
        let owner = seed_user(&state, "alice@x.com").await;
        for _ in 0..25 {
            create_request(&state, &owner, body(BloodType::OPos, Urgency::Medium))
                .await
                .unwrap();
        }

        let page1 = list_requests(&state, default_query()).await.unwrap();
        assert_eq!(page1.requests.len(), 10);
        assert_eq!(
            page1.pagination,
            PaginationInfo {
                current_page: 1,
                total_pages: 3,
                total_requests: 25,
                has_next: true,
                has_prev: false,
            }
        );

        let page3 = list_requests(
            &state,
            ListQuery {
                page: 3,
                limit: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page3.requests.len(), 5);
        assert_eq!(
            page3.pagination,
            PaginationInfo {
                current_page: 3,
                total_pages: 3,
                total_requests: 25,
                has_next: false,
                has_prev: true,
            }
        );
    }

    #[tokio::test]
    async fn pagination_bounds_are_validated() {
        let state = AppState::in_memory();
        let err = list_requests(
            &state,
            ListQuery {
                page: 0,
                limit: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = list_requests(
            &state,
            ListQuery {
                page: 1,
                limit: 101,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn filters_match_blood_type_urgency_and_location_substring() {
        let state = AppState::in_memory();
        let owner = seed_user(&state, "alice@x.com").await;
        create_request(&state, &owner, body(BloodType::ONeg, Urgency::High))
            .await
            .unwrap();
        create_request(
            &state,
            &owner,
            CreateRequestBody {
                blood_type: BloodType::APos,
                location: "Riverside Clinic".into(),
                contact: "0123456789".into(),
                urgency: Urgency::Low,
                description: None,
            },
        )
        .await
        .unwrap();

        let by_type = list_requests(
            &state,
            ListQuery {
                blood_type: Some(BloodType::ONeg),
                ..default_query()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_type.requests.len(), 1);
        assert_eq!(by_type.requests[0].blood_type, BloodType::ONeg);

        let by_urgency = list_requests(
            &state,
            ListQuery {
                urgency: Some(Urgency::Low),
                ..default_query()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_urgency.requests.len(), 1);

        let by_location = list_requests(
            &state,
            ListQuery {
                location: Some("riverside".into()),
                ..default_query()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_location.requests.len(), 1);
        assert_eq!(by_location.requests[0].location, "Riverside Clinic");
    }

    #[tokio::test]
    async fn enriched_reads_expose_owner_contact_but_no_credentials() {
        let state = AppState::in_memory();
        let owner = seed_user(&state, "alice@x.com").await;
        let created = create_request(&state, &owner, body(BloodType::ONeg, Urgency::High))
            .await
            .unwrap();

        let fetched = get_request(&state, created.id).await.unwrap();
        let owner_view = fetched.owner.as_ref().expect("owner enrichment");
        assert_eq!(owner_view.email, "alice@x.com");
        assert_eq!(owner_view.phone.as_deref(), Some("9998887777"));

        let json = serde_json::to_string(&fetched).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    /// The end-to-end scenario: register, login, bad login, create,
    /// filtered discovery, fulfill, gone from the default listing.
    #[tokio::test]
    async fn full_request_lifecycle_scenario() {
        let state = AppState::in_memory();

        let registered = crate::auth::services::register(
            &state,
            RegisterRequest {
                name: "Alice".into(),
                email: "alice@x.com".into(),
                password: "secret1".into(),
                blood_type: None,
                phone: None,
                location: None,
                role: Some(Role::Patient),
            },
        )
        .await
        .expect("register");

        crate::auth::services::login(
            &state,
            LoginRequest {
                email: "alice@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .expect("login with correct password");

        let err = crate::auth::services::login(
            &state,
            LoginRequest {
                email: "alice@x.com".into(),
                password: "wrong".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));

        let alice = state
            .users
            .find_by_id(registered.id)
            .await
            .unwrap()
            .expect("alice exists");
        let created = create_request(
            &state,
            &alice,
            CreateRequestBody {
                blood_type: BloodType::ONeg,
                location: "City Hospital".into(),
                contact: "9998887777".into(),
                urgency: Urgency::High,
                description: None,
            },
        )
        .await
        .expect("create request");

        let filtered = list_requests(
            &state,
            ListQuery {
                blood_type: Some(BloodType::ONeg),
                ..default_query()
            },
        )
        .await
        .unwrap();
        assert_eq!(filtered.requests.len(), 1);
        assert_eq!(filtered.requests[0].id, created.id);

        fulfill_request(&state, &alice, created.id).await.expect("fulfill");

        let after = list_requests(&state, default_query()).await.unwrap();
        assert!(after.requests.iter().all(|r| r.id != created.id));
        assert_eq!(after.pagination.total_requests, 0);
    }
}
