//! Owner notifications rendered from templates.

use super::email::EmailMessage;
use askama::Template;
use reqwest::Url;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Template)]
#[template(path = "email/new_enquiry.html")]
struct NewEnquiryHtml<'a> {
    name: &'a str,
    email: &'a str,
    phone: Option<&'a str>,
    message: &'a str,
    dashboard_url: Option<String>,
}

#[derive(Template)]
#[template(path = "email/new_enquiry.txt")]
struct NewEnquiryText<'a> {
    name: &'a str,
    email: &'a str,
    phone: Option<&'a str>,
    message: &'a str,
    dashboard_url: Option<String>,
}

/// The `customers` row carried by an insert webhook.
#[derive(Debug, Deserialize)]
pub struct EnquiryRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

pub fn new_enquiry_email(
    record: &EnquiryRecord,
    notify_address: &str,
    site_url: Option<&Url>,
) -> Result<EmailMessage, askama::Error> {
    let dashboard_url = match (site_url, record.id) {
        (Some(site), Some(id)) => site
            .join(&format!("dashboard/customers/{}", id))
            .ok()
            .map(|u| u.to_string()),
        _ => None,
    };

    let phone = record.phone.as_deref().filter(|p| !p.trim().is_empty());
    let message = record.message.as_deref().unwrap_or("");

    let html = NewEnquiryHtml {
        name: &record.name,
        email: &record.email,
        phone,
        message,
        dashboard_url: dashboard_url.clone(),
    }
    .render()?;

    let text = NewEnquiryText {
        name: &record.name,
        email: &record.email,
        phone,
        message,
        dashboard_url,
    }
    .render()?;

    Ok(EmailMessage {
        to: notify_address.to_string(),
        subject: format!("New enquiry from {}", record.name),
        body_text: Some(text),
        body_html: Some(html),
        reply_to: Some(record.email.clone()),
    })
}
