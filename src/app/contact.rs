use crate::error::AppError;
use crate::ports::push::PushSender;
use crate::state::AppState;
use crate::types::notification::NotificationEvent;
use crate::types::records::{Lead, LeadStatus};

use axum::Json;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_NAME_CHARS: usize = 120;
const MAX_EMAIL_CHARS: usize = 254;
const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
pub(crate) struct ContactForm {
    pub(crate) name: String,
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) company: Option<String>,
    pub(crate) message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ContactAccepted {
    pub(crate) id: Uuid,
}

/// Records a contact-form submission as a lead, then notifies subscribed
/// admins in the background. The visitor's response depends only on the
/// lead being stored.
pub(crate) async fn contact_submit<P: PushSender>(
    State(state): State<AppState<P>>,
    Form(form): Form<ContactForm>,
) -> Result<(StatusCode, Json<ContactAccepted>), AppError> {
    let lead = validate(form)?;
    let lead = state.leads.insert(lead).await?;
    tracing::info!(lead_id = %lead.id, "lead recorded");

    let event = NotificationEvent::new_lead(lead.id, &lead.name, &lead.email, &lead.message);
    let registry = Arc::clone(&state.subscriptions);
    let sender = state.push_sender.clone();
    tokio::spawn(async move {
        registry.notify_all(sender.as_ref(), &event).await;
    });

    Ok((StatusCode::CREATED, Json(ContactAccepted { id: lead.id })))
}

fn validate(form: ContactForm) -> Result<Lead, AppError> {
    let name = form.name.trim();
    let email = form.email.trim();
    let message = form.message.trim();
    let company = form
        .company
        .as_deref()
        .map(str::trim)
        .filter(|company| !company.is_empty());

    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "name must be between 1 and {MAX_NAME_CHARS} characters"
        )));
    }
    if !is_plausible_email(email) {
        return Err(AppError::Validation("email address is invalid".to_string()));
    }
    if company.is_some_and(|company| company.chars().count() > MAX_NAME_CHARS) {
        return Err(AppError::Validation(format!(
            "company must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    if message.is_empty() || message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "message must be between 1 and {MAX_MESSAGE_CHARS} characters"
        )));
    }

    Ok(Lead {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        company: company.map(str::to_string),
        message: message.to_string(),
        status: LeadStatus::New,
        submitted_at: OffsetDateTime::now_utc(),
    })
}

fn is_plausible_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_CHARS || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
