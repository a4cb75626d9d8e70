//! Client side of the hosted backend: handle construction, cookie sessions, and
//! the REST, auth and storage call surfaces.

pub mod auth;
pub mod client;
pub mod cookies;
pub mod error;
pub mod factory;
pub mod query;
pub mod session;
pub mod storage;

pub use auth::User;
pub use client::{BackendClient, CredentialKind, HandleSnapshot};
pub use cookies::{ResponseCookies, SessionCookies, SessionWriteError};
pub use error::{BackendError, RemoteCallError, RemoteErrorKind};
pub use factory::ClientFactory;
pub use query::Order;
pub use session::Session;
