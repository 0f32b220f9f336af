//! Projects section of the dashboard.
//!
//! The board is swapped into `#profile-content`; its filter tabs, sort select
//! and search box re-request the board with the new query.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query},
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use tyxar_core::{ProjectId, ProjectStatus, ProjectType, Visibility};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::projects::{
    ARCHIVED_MESSAGE, CREATED_MESSAGE, NewProject, Project, ProjectBoard, ProjectFilter,
    ProjectSort, ProjectStats, format_relative,
};

use super::account::Notice;

/// Filter, sort and search state of the board.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BoardQuery {
    pub filter: ProjectFilter,
    pub sort: ProjectSort,
    pub search: String,
}

/// One project card, pre-formatted.
#[derive(Debug)]
pub struct ProjectCard {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub icon: &'static str,
    pub type_label: String,
    pub visibility: &'static str,
    pub archived: bool,
    pub updated: String,
    pub size: String,
    pub collaborators: u32,
    pub commits: u32,
    pub language: String,
    pub stars: u32,
    pub forks: u32,
    pub is_public: bool,
}

impl ProjectCard {
    fn new(project: &Project, today: NaiveDate) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            description: project.description.clone(),
            icon: project.kind.icon(),
            type_label: project.type_label(),
            visibility: project.visibility.as_str(),
            archived: project.status == ProjectStatus::Archived,
            updated: format_relative(project.last_updated, today),
            size: project.size_label(),
            collaborators: project.collaborators,
            commits: project.commits,
            language: project.language.clone(),
            stars: project.stars,
            forks: project.forks,
            is_public: project.is_public(),
        }
    }
}

/// Projects board.
#[derive(Template, WebTemplate)]
#[template(path = "account/projects.html")]
pub struct ProjectsTemplate {
    pub cards: Vec<ProjectCard>,
    pub stats: ProjectStats,
    pub filter: &'static str,
    pub sort: &'static str,
    pub search: String,
    pub notice: Option<Notice>,
    pub filters: [(&'static str, &'static str); 4],
    pub sorts: [(&'static str, &'static str); 4],
    pub types: [ProjectType; 6],
}

const fn filter_name(filter: ProjectFilter) -> &'static str {
    match filter {
        ProjectFilter::All => "all",
        ProjectFilter::Active => "active",
        ProjectFilter::Archived => "archived",
        ProjectFilter::Shared => "shared",
    }
}

const fn sort_name(sort: ProjectSort) -> &'static str {
    match sort {
        ProjectSort::Updated => "updated",
        ProjectSort::Name => "name",
        ProjectSort::Created => "created",
        ProjectSort::Size => "size",
    }
}

fn board_template(board: &ProjectBoard, query: &BoardQuery, notice: Option<Notice>) -> ProjectsTemplate {
    let today = Utc::now().date_naive();
    ProjectsTemplate {
        cards: board
            .view(query.filter, &query.search, query.sort)
            .into_iter()
            .map(|p| ProjectCard::new(p, today))
            .collect(),
        stats: board.stats(),
        filter: filter_name(query.filter),
        sort: sort_name(query.sort),
        search: query.search.clone(),
        notice,
        filters: [
            ("all", "All"),
            ("active", "Active"),
            ("archived", "Archived"),
            ("shared", "Shared"),
        ],
        sorts: [
            ("updated", "Last updated"),
            ("name", "Name"),
            ("created", "Created"),
            ("size", "Size"),
        ],
        types: [
            ProjectType::Web,
            ProjectType::Mobile,
            ProjectType::Desktop,
            ProjectType::Library,
            ProjectType::Game,
            ProjectType::Other,
        ],
    }
}

/// Render the board stored in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be read or the template fails.
pub async fn board_html(session: &Session, query: &BoardQuery, notice: Option<Notice>) -> Result<String> {
    let board = ProjectBoard::load(session).await?;
    Ok(board_template(&board, query, notice).render()?)
}

/// Board with the requested filter, sort and search.
#[instrument(skip(session, _user))]
pub async fn list(
    session: Session,
    RequireAuth(_user): RequireAuth,
    Query(query): Query<BoardQuery>,
) -> Result<impl IntoResponse> {
    let board = ProjectBoard::load(&session).await?;
    Ok(board_template(&board, &query, None))
}

/// New-project modal form.
#[derive(Debug, Deserialize)]
pub struct NewProjectForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub kind: ProjectType,
    #[serde(default)]
    pub visibility: Visibility,
    /// Checkbox: present when ticked.
    pub initialize_repo: Option<String>,
}

impl From<NewProjectForm> for NewProject {
    fn from(form: NewProjectForm) -> Self {
        Self {
            name: form.name.trim().to_string(),
            description: form.description.trim().to_string(),
            kind: form.kind,
            visibility: form.visibility,
            initialize_repo: form.initialize_repo.is_some(),
        }
    }
}

/// Add a project to the front of the board.
#[instrument(skip(session, _user, form))]
pub async fn create(
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<NewProjectForm>,
) -> Result<impl IntoResponse> {
    let mut board = ProjectBoard::load(&session).await?;
    let notice = match board.create(form.into(), Utc::now().date_naive()) {
        Ok(project) => {
            board.save(&session).await?;
            tracing::info!(project = %project.id, "Project created");
            Notice::ok(CREATED_MESSAGE)
        }
        Err(e) => Notice::error(e.to_string()),
    };
    Ok(board_template(&board, &BoardQuery::default(), Some(notice)))
}

/// Archive a project.
#[instrument(skip(session, _user))]
pub async fn archive(
    session: Session,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<i64>,
    Query(query): Query<BoardQuery>,
) -> Result<impl IntoResponse> {
    let mut board = ProjectBoard::load(&session).await?;
    let notice = if board.archive(ProjectId::new(id)) {
        board.save(&session).await?;
        Some(Notice::ok(ARCHIVED_MESSAGE))
    } else {
        tracing::debug!(id, "Archive requested for unknown project");
        None
    };
    Ok(board_template(&board, &query, notice))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_board_query_defaults() {
        let query: BoardQuery = serde_json::from_str(r#"{"filter":"shared"}"#).unwrap();
        assert_eq!(query.filter, ProjectFilter::Shared);
        assert_eq!(query.sort, ProjectSort::Updated);
        assert!(query.search.is_empty());
    }

    #[test]
    fn test_board_template_applies_query() {
        let board = ProjectBoard::samples();
        let query = BoardQuery {
            filter: ProjectFilter::Active,
            sort: ProjectSort::Name,
            search: String::new(),
        };
        let template = board_template(&board, &query, None);
        let names: Vec<_> = template.cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Tyxar API", "Tyxar Mobile", "Tyxar Web App"]);
        assert_eq!(template.stats.total, 4);
        assert_eq!(template.filter, "active");
        assert_eq!(template.sort, "name");
    }

    #[test]
    fn test_form_conversion() {
        let form = NewProjectForm {
            name: "  Parser  ".into(),
            description: String::new(),
            kind: ProjectType::Library,
            visibility: Visibility::Public,
            initialize_repo: Some("on".into()),
        };
        let project = NewProject::from(form);
        assert_eq!(project.name, "Parser");
        assert!(project.initialize_repo);
    }
}
