use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Where an enquiry is in the sales pipeline.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    New,
    Contacted,
    Quoted,
    Won,
    Lost,
}

impl CustomerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomerStatus::New => "new",
            CustomerStatus::Contacted => "contacted",
            CustomerStatus::Quoted => "quoted",
            CustomerStatus::Won => "won",
            CustomerStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub status: CustomerStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Public contact form.
#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(max = 40, message = "Phone number is too long"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "Message is required"))]
    pub message: String,
    /// Hidden field; humans leave it empty.
    #[serde(default)]
    pub website: Option<String>,
}

impl ContactRequest {
    pub fn is_honeypot_filled(&self) -> bool {
        self.website.as_deref().is_some_and(|w| !w.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub status: CustomerStatus,
}

impl From<ContactRequest> for NewCustomer {
    fn from(request: ContactRequest) -> Self {
        Self {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            phone: request
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            message: request.message.trim().to_string(),
            status: CustomerStatus::New,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct CustomerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CustomerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

impl CustomerPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.notes.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerFilter {
    pub status: Option<CustomerStatus>,
    /// Case-insensitive name search.
    pub q: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_as_lowercase() {
        assert_eq!(serde_json::to_string(&CustomerStatus::Quoted).unwrap(), r#""quoted""#);
        let status: CustomerStatus = serde_json::from_str(r#""won""#).unwrap();
        assert_eq!(status, CustomerStatus::Won);
        assert_eq!(status.to_string(), "won");
    }

    #[test]
    fn null_status_reads_as_new() {
        let customer: Customer = serde_json::from_str(
            r#"{"id":"22222222-2222-2222-2222-222222222222","name":"Ada","email":"ada@example.com","status":null,"created_at":"2026-10-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(customer.status, CustomerStatus::New);
    }

    #[test]
    fn contact_request_normalizes_into_new_customer() {
        let request = ContactRequest {
            name: " Ada ".to_string(),
            email: "Ada@Example.com ".to_string(),
            phone: Some("  ".to_string()),
            message: "Can you repaint a sideboard?".to_string(),
            website: None,
        };
        assert!(!request.is_honeypot_filled());

        let customer = NewCustomer::from(request);
        assert_eq!(customer.name, "Ada");
        assert_eq!(customer.email, "ada@example.com");
        assert!(customer.phone.is_none());
        assert_eq!(customer.status, CustomerStatus::New);
    }

    #[test]
    fn invalid_email_fails_validation() {
        let request = ContactRequest {
            name: "Ada".to_string(),
            email: "not-an-email".to_string(),
            phone: None,
            message: "Hello".to_string(),
            website: None,
        };
        assert!(request.validate().is_err());
    }
}
