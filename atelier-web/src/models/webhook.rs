use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookEvent {
    Insert,
    Update,
    Delete,
}

/// Database change notification posted by the backend.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub event: WebhookEvent,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
}

impl WebhookPayload {
    pub fn is_new_customer(&self) -> bool {
        self.event == WebhookEvent::Insert && self.table == "customers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert_event() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"type":"INSERT","table":"customers","schema":"public","record":{"name":"Ada"},"old_record":null}"#,
        )
        .unwrap();
        assert!(payload.is_new_customer());
        assert!(payload.old_record.is_none());
    }

    #[test]
    fn other_tables_are_not_enquiries() {
        let payload: WebhookPayload =
            serde_json::from_str(r#"{"type":"UPDATE","table":"customers","record":{}}"#).unwrap();
        assert!(!payload.is_new_customer());
    }
}
