//! Dataverse Web API access
//!
//! A [`DataverseClient`] is the authenticated session: it acquires a bearer
//! token from [`Credentials`], resolves the organization name, and serves
//! pages of a [`FetchQuery`] through the
//! [`RecordSource`](crate::core::pagination::RecordSource) seam.

pub mod auth;
pub mod client;
pub mod error;
pub mod fetch;

pub use auth::{CredentialInputs, Credentials};
pub use client::{parse_page, DataverseClient};
pub use error::{DataverseError, DataverseResult};
pub use fetch::{owner_column, FetchQuery, LinkEntity, OWNER_ALIAS};
