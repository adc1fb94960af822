use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::Role;

/// Sales lead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_employee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Fields this crate does not model.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// CRM account (admin, manager or employee).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Manager the user reports to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Scheduled contact with a lead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remind_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Collection response of a list endpoint: a bare array, or an envelope
/// holding the array under a named key. Anything else, including a single
/// entity, is a decode error.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Items(Vec<T>),
    Page(Page<T>),
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Items(items) => items,
            Self::Page(page) => page.data,
        }
    }

    /// Total reported by the server, or the number of items received.
    pub fn total(&self) -> u64 {
        match self {
            Self::Items(items) => items.len() as u64,
            Self::Page(page) => page.total.unwrap_or(page.data.len() as u64),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Page<T> {
    #[serde(
        alias = "leads",
        alias = "users",
        alias = "tasks",
        alias = "followUps",
        alias = "followups",
        alias = "reminders",
        alias = "items",
        alias = "results"
    )]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub pages: Option<u64>,
}

/// Single-entity response: bare, or wrapped next to a status message.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum EntityPayload<T> {
    Bare(T),
    Wrapped {
        #[serde(
            alias = "lead",
            alias = "user",
            alias = "task",
            alias = "followUp",
            alias = "followup",
            alias = "reminder"
        )]
        data: T,
    },
}

impl<T> EntityPayload<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Bare(item) | Self::Wrapped { data: item } => item,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EntityPayload, Lead, Listing, User};
    use crate::Role;

    fn lead(id: &str) -> serde_json::Value {
        json!({ "_id": id, "name": format!("Lead {id}"), "assignedEmployee": "e-1" })
    }

    #[test]
    fn listing_accepts_bare_array() {
        let listing: Listing<Lead> = serde_json::from_value(json!([lead("1"), lead("2")])).unwrap();
        assert!(matches!(listing, Listing::Items(_)));
        assert_eq!(listing.total(), 2);
        let items = listing.into_items();
        assert_eq!(items[1].id, "2");
        assert_eq!(items[0].assigned_employee.as_deref(), Some("e-1"));
    }

    #[test]
    fn listing_accepts_named_page() {
        let body = json!({ "leads": [lead("1")], "total": 40, "page": 1, "pages": 40 });
        let listing: Listing<Lead> = serde_json::from_value(body).unwrap();
        assert!(matches!(listing, Listing::Page(_)));
        assert_eq!(listing.total(), 40);
        assert_eq!(listing.into_items().len(), 1);
    }

    #[test]
    fn listing_rejects_single_entity() {
        let result = serde_json::from_value::<Listing<Lead>>(lead("9"));
        assert!(result.is_err());
    }

    #[test]
    fn listing_rejects_unrelated_object() {
        let result = serde_json::from_value::<Listing<Lead>>(json!({ "message": "ok" }));
        assert!(result.is_err());
    }

    #[test]
    fn entity_payload_unwraps_envelope() {
        let body = json!({ "message": "created", "lead": lead("5") });
        let payload: EntityPayload<Lead> = serde_json::from_value(body).unwrap();
        assert_eq!(payload.into_inner().id, "5");
    }

    #[test]
    fn unknown_fields_are_kept() {
        let body = json!({ "id": "u-1", "name": "Sam", "role": "manager", "department": "Sales" });
        let user: User = serde_json::from_value(body).unwrap();
        assert_eq!(user.role, Some(Role::Manager));
        assert_eq!(user.extra.get("department"), Some(&json!("Sales")));
    }
}
