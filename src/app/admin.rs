use crate::app::auth::RequireSession;
use crate::error::AppError;
use crate::ports::push::PushSender;
use crate::state::AppState;
use crate::types::identity::AdminIdentity;
use crate::types::records::{Lead, LeadStatus, Project};

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_TITLE_CHARS: usize = 200;
const MAX_SUMMARY_CHARS: usize = 2000;
const MAX_TAGS: usize = 20;

#[derive(Debug, Serialize)]
pub(crate) struct DashboardSummary {
    pub(crate) admin: AdminIdentity,
    /// Total and unhandled lead counts; `None` for editors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) leads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) new_leads: Option<usize>,
    pub(crate) projects: usize,
    pub(crate) push_subscribers: usize,
    pub(crate) push_enabled: bool,
}

pub(crate) async fn dashboard<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(admin): RequireSession,
) -> Json<DashboardSummary> {
    let (leads, new_leads) = if admin.is_administrator() {
        let leads = state.leads.list().await;
        let new_leads = leads
            .iter()
            .filter(|lead| lead.status == LeadStatus::New)
            .count();
        (Some(leads.len()), Some(new_leads))
    } else {
        (None, None)
    };

    Json(DashboardSummary {
        admin,
        leads,
        new_leads,
        projects: state.projects.len().await,
        push_subscribers: state.subscriptions.len().await,
        push_enabled: state.push_sender.is_some(),
    })
}

fn require_administrator(admin: &AdminIdentity) -> Result<(), AppError> {
    if admin.is_administrator() {
        Ok(())
    } else {
        tracing::info!(admin_id = %admin.id, "editor denied access to leads");
        Err(AppError::Forbidden)
    }
}

pub(crate) async fn lead_list<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(admin): RequireSession,
) -> Result<Json<Vec<Lead>>, AppError> {
    require_administrator(&admin)?;
    let mut leads = state.leads.list().await;
    leads.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    Ok(Json(leads))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeadUpdate {
    status: LeadStatus,
}

pub(crate) async fn lead_update<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(admin): RequireSession,
    Path(id): Path<Uuid>,
    Json(update): Json<LeadUpdate>,
) -> Result<Json<Lead>, AppError> {
    require_administrator(&admin)?;
    let updated = state
        .leads
        .update(id, |_, lead| {
            lead.status = update.status;
            true
        })
        .await?;
    match updated {
        Some(Ok(lead)) => {
            tracing::info!(lead_id = %lead.id, status = ?lead.status, "lead updated");
            Ok(Json(lead))
        }
        Some(Err(_)) | None => Err(AppError::NotFound),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectInput {
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    client: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    published: bool,
}

/// Input after validation; the slug is always present.
struct ProjectFields {
    title: String,
    slug: String,
    summary: String,
    client: Option<String>,
    url: Option<String>,
    tags: Vec<String>,
    published: bool,
}

impl ProjectFields {
    fn apply(self, project: &mut Project, now: OffsetDateTime) {
        project.title = self.title;
        project.slug = self.slug;
        project.summary = self.summary;
        project.client = self.client;
        project.url = self.url;
        project.tags = self.tags;
        project.published = self.published;
        project.updated_at = now;
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn validate_project(input: ProjectInput) -> Result<ProjectFields, AppError> {
    let title = input.title.trim().to_string();
    if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "title must be between 1 and {MAX_TITLE_CHARS} characters"
        )));
    }

    let slug = match non_blank(input.slug) {
        Some(slug) => slugify(&slug),
        None => slugify(&title),
    };
    if slug.is_empty() {
        return Err(AppError::Validation(
            "slug must contain at least one letter or digit".to_string(),
        ));
    }

    let summary = input.summary.trim().to_string();
    if summary.chars().count() > MAX_SUMMARY_CHARS {
        return Err(AppError::Validation(format!(
            "summary must be at most {MAX_SUMMARY_CHARS} characters"
        )));
    }

    let url = non_blank(input.url);
    let url_allowed = |url: &String| url.starts_with("https://") || url.starts_with("http://");
    if url.as_ref().is_some_and(|url| !url_allowed(url)) {
        return Err(AppError::Validation(
            "url must start with http:// or https://".to_string(),
        ));
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in input.tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "at most {MAX_TAGS} tags are allowed"
        )));
    }

    Ok(ProjectFields {
        title,
        slug,
        summary,
        client: non_blank(input.client),
        url,
        tags,
        published: input.published,
    })
}

/// Lowercase ASCII letters and digits joined by single dashes.
fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn slug_conflict(slug: &str) -> AppError {
    AppError::Conflict(format!("a project with slug '{slug}' already exists"))
}

pub(crate) async fn project_list<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(_): RequireSession,
) -> Json<Vec<Project>> {
    let mut projects = state.projects.list().await;
    projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Json(projects)
}

pub(crate) async fn project_create<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(admin): RequireSession,
    Json(input): Json<ProjectInput>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let fields = validate_project(input)?;
    let now = OffsetDateTime::now_utc();
    let mut project = Project {
        id: Uuid::new_v4(),
        title: String::new(),
        slug: String::new(),
        summary: String::new(),
        client: None,
        url: None,
        tags: Vec::new(),
        published: false,
        created_at: now,
        updated_at: now,
    };
    fields.apply(&mut project, now);

    let created = state
        .projects
        .insert_unless(project, |existing, new| existing.slug == new.slug)
        .await?
        .map_err(|existing| slug_conflict(&existing.slug))?;
    tracing::info!(project_id = %created.id, admin_id = %admin.id, "project created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn project_get<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(_): RequireSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    state.projects.get(id).await.map(Json).ok_or(AppError::NotFound)
}

pub(crate) async fn project_update<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(admin): RequireSession,
    Path(id): Path<Uuid>,
    Json(input): Json<ProjectInput>,
) -> Result<Json<Project>, AppError> {
    let fields = validate_project(input)?;
    let slug = fields.slug.clone();
    let now = OffsetDateTime::now_utc();

    let updated = state
        .projects
        .update(id, |others, project| {
            if others.iter().any(|other| other.slug == slug) {
                return false;
            }
            fields.apply(project, now);
            true
        })
        .await?;
    match updated {
        Some(Ok(project)) => {
            tracing::info!(project_id = %project.id, admin_id = %admin.id, "project updated");
            Ok(Json(project))
        }
        Some(Err(_)) => Err(slug_conflict(&slug)),
        None => Err(AppError::NotFound),
    }
}

pub(crate) async fn project_delete<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(admin): RequireSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.projects.remove(id).await? {
        tracing::info!(project_id = %id, admin_id = %admin.id, "project deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// Published projects for the public site.
pub(crate) async fn public_projects<P: PushSender>(
    State(state): State<AppState<P>>,
) -> Json<Vec<Project>> {
    let mut projects: Vec<Project> = state
        .projects
        .list()
        .await
        .into_iter()
        .filter(|project| project.published)
        .collect();
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(projects)
}
