//! Entity-scoped CRUD helpers and role-scoped queries.
//!
//! Role-scoped queries first call a specialized endpoint
//! (`/leads/employee/{id}`) and, if that fails for any reason, issue one
//! fallback call to the generic collection with an equivalent filter
//! (`/leads?assignedEmployee={id}`). The fallback is a separate logical
//! request with its own retry budget; when both fail, the fallback's error is
//! returned.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use urlencoding::encode;

use crate::{
    types::EntityPayload, ApiError, CrmClient, FollowUp, Lead, Listing, Reminder, RequestOptions,
    Result, Role, Task, User,
};

/// A CRM entity served from a REST collection.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection path relative to the API root, e.g. `/leads`.
    const COLLECTION: &'static str;
}

impl Resource for Lead {
    const COLLECTION: &'static str = "/leads";
}

impl Resource for User {
    const COLLECTION: &'static str = "/users";
}

impl Resource for Task {
    const COLLECTION: &'static str = "/tasks";
}

impl Resource for FollowUp {
    const COLLECTION: &'static str = "/followups";
}

impl Resource for Reminder {
    const COLLECTION: &'static str = "/reminders";
}

/// CRUD handle for one collection, borrowed from a [`CrmClient`].
pub struct Resources<'a, R> {
    client: &'a CrmClient,
    _resource: PhantomData<fn() -> R>,
}

impl<'a, R: Resource> Resources<'a, R> {
    fn new(client: &'a CrmClient) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }

    fn item_path(id: &str) -> String {
        format!("{}/{}", R::COLLECTION, encode(id.trim()))
    }

    pub async fn list(&self) -> Result<Vec<R>> {
        self.list_where(&[]).await
    }

    /// Lists the collection filtered by query parameters.
    pub async fn list_where(&self, filters: &[(&str, &str)]) -> Result<Vec<R>> {
        let options = filters
            .iter()
            .fold(RequestOptions::new(), |opts, (name, value)| opts.query(*name, *value));
        let payload = self.client.get_with(R::COLLECTION, &options).await?;
        decode_listing(&self.client.endpoint(R::COLLECTION), payload)
    }

    pub async fn get(&self, id: &str) -> Result<R> {
        let path = Self::item_path(id);
        let payload = self.client.get(&path).await?;
        decode_entity(&self.client.endpoint(&path), payload)
    }

    pub async fn create<B: Serialize + ?Sized>(&self, draft: &B) -> Result<R> {
        let payload = self.client.post(R::COLLECTION, draft).await?;
        decode_entity(&self.client.endpoint(R::COLLECTION), payload)
    }

    /// Replaces the entity with `changes` (`PUT`).
    pub async fn update<B: Serialize + ?Sized>(&self, id: &str, changes: &B) -> Result<R> {
        let path = Self::item_path(id);
        let payload = self.client.put(&path, changes).await?;
        decode_entity(&self.client.endpoint(&path), payload)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&Self::item_path(id)).await.map(|_| ())
    }
}

impl CrmClient {
    pub fn resource<R: Resource>(&self) -> Resources<'_, R> {
        Resources::new(self)
    }

    pub fn leads(&self) -> Resources<'_, Lead> {
        self.resource()
    }

    pub fn users(&self) -> Resources<'_, User> {
        self.resource()
    }

    pub fn tasks(&self) -> Resources<'_, Task> {
        self.resource()
    }

    pub fn follow_ups(&self) -> Resources<'_, FollowUp> {
        self.resource()
    }

    pub fn reminders(&self) -> Resources<'_, Reminder> {
        self.resource()
    }

    /// Leads assigned to an employee.
    pub async fn leads_for_employee(&self, employee_id: &str) -> Result<Vec<Lead>> {
        self.list_with_fallback(
            &format!("/leads/employee/{}", encode(employee_id)),
            ("assignedEmployee", employee_id),
        )
        .await
    }

    /// Leads owned by a manager's team.
    pub async fn leads_for_manager(&self, manager_id: &str) -> Result<Vec<Lead>> {
        self.list_with_fallback(
            &format!("/leads/manager/{}", encode(manager_id)),
            ("assignedManager", manager_id),
        )
        .await
    }

    pub async fn tasks_for_employee(&self, employee_id: &str) -> Result<Vec<Task>> {
        self.list_with_fallback(
            &format!("/tasks/employee/{}", encode(employee_id)),
            ("assignedTo", employee_id),
        )
        .await
    }

    pub async fn users_by_role(&self, role: Role) -> Result<Vec<User>> {
        self.list_with_fallback(&format!("/users/role/{role}"), ("role", role.as_str()))
            .await
    }

    /// Employees reporting to a manager.
    pub async fn team_for_manager(&self, manager_id: &str) -> Result<Vec<User>> {
        self.list_with_fallback(
            &format!("/users/manager/{}", encode(manager_id)),
            ("manager", manager_id),
        )
        .await
    }

    pub async fn follow_ups_for_lead(&self, lead_id: &str) -> Result<Vec<FollowUp>> {
        self.list_with_fallback(
            &format!("/followups/lead/{}", encode(lead_id)),
            ("lead", lead_id),
        )
        .await
    }

    pub async fn reminders_for_user(&self, user_id: &str) -> Result<Vec<Reminder>> {
        self.list_with_fallback(
            &format!("/reminders/user/{}", encode(user_id)),
            ("user", user_id),
        )
        .await
    }

    /// Leads visible to the signed-in user: everything for admins, the
    /// team's leads for managers, assigned leads for employees.
    pub async fn my_leads(&self) -> Result<Vec<Lead>> {
        let user = self.current_user().ok_or_else(|| {
            ApiError::session(
                self.endpoint(Lead::COLLECTION),
                "no signed-in user in session",
            )
        })?;
        match user.role {
            Role::Admin => self.leads().list().await,
            Role::Manager => self.leads_for_manager(&user.id).await,
            Role::Employee => self.leads_for_employee(&user.id).await,
        }
    }

    async fn list_with_fallback<R: Resource>(
        &self,
        specialized: &str,
        filter: (&str, &str),
    ) -> Result<Vec<R>> {
        let primary = match self.get(specialized).await {
            Ok(payload) => decode_listing::<R>(&self.endpoint(specialized), payload),
            Err(err) => Err(err),
        };

        match primary {
            Ok(items) => Ok(items),
            Err(primary_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    specialized,
                    fallback = R::COLLECTION,
                    filter = filter.0,
                    error = %primary_err,
                    "specialized endpoint failed, using generic collection"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = primary_err;

                self.resource::<R>().list_where(&[filter]).await
            }
        }
    }
}

fn decode_listing<R: Resource>(endpoint: &str, payload: JsonValue) -> Result<Vec<R>> {
    CrmClient::decode::<Listing<R>>(endpoint, payload).map(Listing::into_items)
}

fn decode_entity<R: Resource>(endpoint: &str, payload: JsonValue) -> Result<R> {
    CrmClient::decode::<EntityPayload<R>>(endpoint, payload).map(EntityPayload::into_inner)
}
