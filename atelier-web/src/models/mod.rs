pub mod customer;
pub mod project;
pub mod service;
pub mod webhook;

pub use customer::{
    ContactRequest, Customer, CustomerFilter, CustomerPatch, CustomerStatus, NewCustomer,
};
pub use project::{NewProject, PortfolioItem, Project, ProjectForm, ProjectPatch};
pub use service::{NewService, Service, ServicePatch};
pub use webhook::{WebhookEvent, WebhookPayload};

use serde::{Deserialize, Deserializer};

/// Column value with an explicit `null` read as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
