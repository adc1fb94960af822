//! `leaddesk-http` is a resilient async HTTP client for the LeadDesk CRM
//! REST API.
//!
//! Every call goes through [`CrmClient::request`], which adds:
//! - the session bearer token (`Authorization: Bearer <token>`)
//! - a per-attempt timeout
//! - exponential-backoff retry of timeouts, connect failures, 5xx and 429
//! - a process-wide connection flag ([`ConnectionMonitor`]) with change
//!   listeners, see [`CrmClient::on_connection_change`]
//!
//! On top of it sit entity CRUD helpers ([`CrmClient::leads`],
//! [`CrmClient::tasks`], ...) and role-scoped queries that fall back from a
//! specialized endpoint to the generic collection
//! ([`CrmClient::leads_for_employee`], [`CrmClient::my_leads`], ...).

mod client;
mod clock;
mod connection;
mod error;
mod options;
mod request;
mod resources;
pub mod session;
mod types;

pub use client::{CrmClient, CACHE_BUST_PARAM};
pub use connection::{ConnectionListener, ConnectionMonitor, Subscription};
pub use error::{ApiError, ErrorCause};
pub use options::{base_url_from_env, ClientOptions, BASE_URL_ENV, DEFAULT_BASE_URL};
pub use request::{Method, RequestOptions};
pub use resources::{Resource, Resources};
pub use session::{MemorySessionStore, Role, SessionStore, SessionUser};
pub use types::{FollowUp, Lead, Listing, Page, Reminder, Task, User};

pub type Result<T> = std::result::Result<T, ApiError>;
