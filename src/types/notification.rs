use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message fanned out to every subscribed administrator. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub title: String,
    pub body: String,
    pub urgent: bool,
    #[serde(flatten)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "data", rename_all = "kebab-case")]
pub enum EventPayload {
    NewLead {
        lead_id: Uuid,
        name: String,
        email: String,
    },
    Test {
        requested_by: String,
    },
}

impl EventPayload {
    pub fn category(&self) -> &'static str {
        match self {
            EventPayload::NewLead { .. } => "new-lead",
            EventPayload::Test { .. } => "test",
        }
    }
}

/// Body excerpts longer than this are cut on a char boundary.
const BODY_EXCERPT_CHARS: usize = 140;

impl NotificationEvent {
    pub fn new_lead(lead_id: Uuid, name: &str, email: &str, message: &str) -> Self {
        Self {
            title: format!("New lead from {name}"),
            body: excerpt(message, BODY_EXCERPT_CHARS),
            urgent: true,
            payload: EventPayload::NewLead {
                lead_id,
                name: name.to_string(),
                email: email.to_string(),
            },
        }
    }

    pub fn test(app_name: &str, requested_by: &str) -> Self {
        Self {
            title: format!("{app_name} notifications"),
            body: "Push notifications are working.".to_string(),
            urgent: false,
            payload: EventPayload::Test {
                requested_by: requested_by.to_string(),
            },
        }
    }

    /// JSON handed to the service worker. `tag` lets the browser collapse
    /// notifications of one category.
    pub fn to_message(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(object) = value.as_object_mut() {
            object.insert(
                "tag".to_string(),
                serde_json::Value::String(self.payload.category().to_string()),
            );
        }
        value.to_string()
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", trimmed[..cut].trim_end()),
        None => trimmed.to_string(),
    }
}
