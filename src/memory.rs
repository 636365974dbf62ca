//! In-process store used by the test suite and for running without
//! Postgres. Implements the same traits as the sqlx-backed stores; every
//! mutation happens under one mutex acquisition, mirroring the single
//! atomic statement the Postgres implementation issues.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{NewUser, ProfilePatch, User, UserStore};
use crate::requests::repo::{
    BloodRequest, NewRequest, RequestFilter, RequestOwner, RequestPatch, RequestStore,
    RequestWithOwner,
};

#[derive(Debug)]
struct StoredRequest {
    // Insertion sequence breaks created_at ties so ordering stays total.
    seq: u64,
    request: BloodRequest,
}

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    requests: Mutex<Vec<StoredRequest>>,
    next_seq: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner_of(users: &[User], owner_id: Uuid) -> anyhow::Result<RequestOwner> {
        let user = users
            .iter()
            .find(|u| u.id == owner_id)
            .ok_or_else(|| anyhow::anyhow!("request owner missing from store"))?;
        Ok(RequestOwner {
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        })
    }

    fn matches(filter: &RequestFilter, request: &BloodRequest) -> bool {
        if let Some(bt) = filter.blood_type {
            if request.blood_type != bt {
                return false;
            }
        }
        if let Some(urgency) = filter.urgency {
            if request.urgency != urgency {
                return false;
            }
        }
        if let Some(location) = &filter.location {
            if !request
                .location
                .to_lowercase()
                .contains(&location.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, new: NewUser) -> anyhow::Result<User> {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            blood_type: new.blood_type,
            phone: new.phone,
            location: new.location,
            role: new.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            anyhow::bail!("duplicate key value violates unique constraint on email");
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(location) = &patch.location {
            user.location = Some(location.clone());
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let mut users = self.users.lock().unwrap().clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.is_active = active;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert(&self, new: NewRequest) -> anyhow::Result<BloodRequest> {
        let now = OffsetDateTime::now_utc();
        let request = BloodRequest {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            blood_type: new.blood_type,
            location: new.location,
            contact: new.contact,
            urgency: new.urgency,
            description: new.description,
            is_active: true,
            fulfillment_date: None,
            created_at: now,
            updated_at: now,
        };
        let seq = {
            let mut next = self.next_seq.lock().unwrap();
            *next += 1;
            *next
        };
        self.requests.lock().unwrap().push(StoredRequest {
            seq,
            request: request.clone(),
        });
        Ok(request)
    }

    async fn find_active(&self, id: Uuid) -> anyhow::Result<Option<RequestWithOwner>> {
        let requests = self.requests.lock().unwrap();
        let Some(stored) = requests
            .iter()
            .find(|s| s.request.id == id && s.request.is_active)
        else {
            return Ok(None);
        };
        let users = self.users.lock().unwrap();
        Ok(Some(RequestWithOwner {
            request: stored.request.clone(),
            owner: Self::owner_of(&users, stored.request.user_id)?,
        }))
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &RequestPatch,
    ) -> anyhow::Result<Option<BloodRequest>> {
        let mut requests = self.requests.lock().unwrap();
        let Some(stored) = requests
            .iter_mut()
            .find(|s| s.request.id == id && s.request.user_id == owner_id && s.request.is_active)
        else {
            return Ok(None);
        };
        let request = &mut stored.request;
        if let Some(bt) = patch.blood_type {
            request.blood_type = bt;
        }
        if let Some(location) = &patch.location {
            request.location = location.clone();
        }
        if let Some(contact) = &patch.contact {
            request.contact = contact.clone();
        }
        if let Some(urgency) = patch.urgency {
            request.urgency = urgency;
        }
        if let Some(description) = &patch.description {
            request.description = Some(description.clone());
        }
        request.updated_at = OffsetDateTime::now_utc();
        Ok(Some(request.clone()))
    }

    async fn close_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fulfilled: bool,
    ) -> anyhow::Result<Option<BloodRequest>> {
        let mut requests = self.requests.lock().unwrap();
        let Some(stored) = requests
            .iter_mut()
            .find(|s| s.request.id == id && s.request.user_id == owner_id && s.request.is_active)
        else {
            return Ok(None);
        };
        let request = &mut stored.request;
        request.is_active = false;
        if fulfilled {
            request.fulfillment_date = Some(OffsetDateTime::now_utc());
        }
        request.updated_at = OffsetDateTime::now_utc();
        Ok(Some(request.clone()))
    }

    async fn list_active(
        &self,
        filter: &RequestFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<RequestWithOwner>, i64)> {
        let requests = self.requests.lock().unwrap();
        let mut matching: Vec<&StoredRequest> = requests
            .iter()
            .filter(|s| s.request.is_active && Self::matches(filter, &s.request))
            .collect();
        matching.sort_by(|a, b| {
            b.request
                .urgency
                .cmp(&a.request.urgency)
                .then(b.request.created_at.cmp(&a.request.created_at))
                .then(b.seq.cmp(&a.seq))
        });
        let total = matching.len() as i64;

        let users = self.users.lock().unwrap();
        let page: Vec<RequestWithOwner> = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|s| {
                Ok(RequestWithOwner {
                    request: s.request.clone(),
                    owner: Self::owner_of(&users, s.request.user_id)?,
                })
            })
            .collect::<anyhow::Result<_>>()?;
        Ok((page, total))
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<BloodRequest>> {
        let requests = self.requests.lock().unwrap();
        let mut own: Vec<&StoredRequest> = requests
            .iter()
            .filter(|s| s.request.user_id == owner_id && s.request.is_active)
            .collect();
        own.sort_by(|a, b| {
            b.request
                .created_at
                .cmp(&a.request.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(own.into_iter().map(|s| s.request.clone()).collect())
    }
}
