//! Per-visitor sample project board.
//!
//! Projects are local sample records kept in the visitor's session. They are
//! seeded with four samples on first access and never written anywhere else.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use tyxar_core::{ProjectId, ProjectStatus, ProjectType, Visibility};

use crate::services::validation::ValidationError;

/// Session key holding the board.
pub const SESSION_KEY: &str = "projects";

pub const CREATED_MESSAGE: &str = "Project created successfully!";
pub const ARCHIVED_MESSAGE: &str = "Project archived successfully.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
    pub visibility: Visibility,
    pub status: ProjectStatus,
    pub last_updated: NaiveDate,
    pub size_mb: f64,
    pub collaborators: u32,
    pub commits: u32,
    pub language: String,
    pub stars: u32,
    pub forks: u32,
}

impl Project {
    /// Size as shown on the card, e.g. `2.4 MB`.
    #[must_use]
    pub fn size_label(&self) -> String {
        format!("{} MB", self.size_mb)
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    #[must_use]
    pub const fn is_shared(&self) -> bool {
        self.collaborators > 1
    }

    /// `Web Application`, `Game Application`, ...
    #[must_use]
    pub fn type_label(&self) -> String {
        let kind = self.kind.as_str();
        let mut chars = kind.chars();
        chars.next().map_or_else(String::new, |first| {
            format!("{}{} Application", first.to_ascii_uppercase(), chars.as_str())
        })
    }
}

/// Filter tabs on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectFilter {
    #[default]
    All,
    Active,
    Archived,
    /// More than one collaborator.
    Shared,
}

impl ProjectFilter {
    #[must_use]
    pub fn matches(self, project: &Project) -> bool {
        match self {
            Self::All => true,
            Self::Active => project.status == ProjectStatus::Active,
            Self::Archived => project.status == ProjectStatus::Archived,
            Self::Shared => project.is_shared(),
        }
    }
}

/// Sort options on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSort {
    #[default]
    Updated,
    Name,
    /// Newest id first.
    Created,
    Size,
}

/// Form input for a new project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub kind: ProjectType,
    pub visibility: Visibility,
    pub initialize_repo: bool,
}

/// Totals shown above the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStats {
    pub total: usize,
    pub active: usize,
    pub shared: usize,
    /// One decimal place, e.g. `17.4 MB`.
    pub total_size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectBoard {
    projects: Vec<Project>,
}

impl Default for ProjectBoard {
    fn default() -> Self {
        Self::samples()
    }
}

impl ProjectBoard {
    /// The four seed projects.
    #[must_use]
    pub fn samples() -> Self {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        let project = |id, name: &str, description: &str, kind, visibility, status| Project {
            id: ProjectId::new(id),
            name: name.to_string(),
            description: description.to_string(),
            kind,
            visibility,
            status,
            last_updated: NaiveDate::default(),
            size_mb: 0.0,
            collaborators: 1,
            commits: 0,
            language: String::new(),
            stars: 0,
            forks: 0,
        };

        Self {
            projects: vec![
                Project {
                    last_updated: date(2024, 1, 15),
                    size_mb: 2.4,
                    collaborators: 3,
                    commits: 156,
                    language: "JavaScript".into(),
                    ..project(
                        1,
                        "Tyxar Web App",
                        "Main web application for Tyxar project management",
                        ProjectType::Web,
                        Visibility::Private,
                        ProjectStatus::Active,
                    )
                },
                Project {
                    last_updated: date(2024, 1, 12),
                    size_mb: 8.7,
                    collaborators: 2,
                    commits: 89,
                    language: "JavaScript".into(),
                    stars: 12,
                    forks: 3,
                    ..project(
                        2,
                        "Tyxar Mobile",
                        "React Native mobile application",
                        ProjectType::Mobile,
                        Visibility::Public,
                        ProjectStatus::Active,
                    )
                },
                Project {
                    last_updated: date(2023, 12, 20),
                    size_mb: 1.2,
                    collaborators: 1,
                    commits: 45,
                    language: "Python".into(),
                    stars: 8,
                    forks: 2,
                    ..project(
                        3,
                        "Tyxar CLI",
                        "Command-line interface for Tyxar",
                        ProjectType::Desktop,
                        Visibility::Public,
                        ProjectStatus::Archived,
                    )
                },
                Project {
                    last_updated: date(2024, 1, 10),
                    size_mb: 5.1,
                    collaborators: 4,
                    commits: 203,
                    language: "Node.js".into(),
                    ..project(
                        4,
                        "Tyxar API",
                        "REST API for Tyxar services",
                        ProjectType::Web,
                        Visibility::Private,
                        ProjectStatus::Active,
                    )
                },
            ],
        }
    }

    /// Board stored in the session, seeding it on first access.
    ///
    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn load(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        if let Some(board) = session.get::<Self>(SESSION_KEY).await? {
            return Ok(board);
        }
        let board = Self::samples();
        board.save(session).await?;
        Ok(board)
    }

    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(SESSION_KEY, self).await
    }

    #[must_use]
    pub fn all(&self) -> &[Project] {
        &self.projects
    }

    #[must_use]
    pub fn get(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Projects matching the filter tab and the search box, sorted.
    #[must_use]
    pub fn view(&self, filter: ProjectFilter, search: &str, sort: ProjectSort) -> Vec<&Project> {
        let needle = search.trim().to_lowercase();
        let mut projects: Vec<&Project> = self
            .projects
            .iter()
            .filter(|p| filter.matches(p))
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            })
            .collect();

        match sort {
            ProjectSort::Updated => projects.sort_by(|a, b| b.last_updated.cmp(&a.last_updated)),
            ProjectSort::Name => projects.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.name.cmp(&b.name))
            }),
            ProjectSort::Created => projects.sort_by(|a, b| b.id.cmp(&a.id)),
            ProjectSort::Size => projects.sort_by(|a, b| b.size_mb.total_cmp(&a.size_mb)),
        }
        projects
    }

    /// Add a project at the front of the board.
    ///
    /// # Errors
    ///
    /// `ProjectNameRequired` for a blank name.
    pub fn create(&mut self, input: NewProject, today: NaiveDate) -> Result<Project, ValidationError> {
        if input.name.trim().is_empty() {
            return Err(ValidationError::ProjectNameRequired);
        }
        let next_id = self
            .projects
            .iter()
            .map(|p| p.id.as_i64())
            .max()
            .unwrap_or(0)
            + 1;

        let project = Project {
            id: ProjectId::new(next_id),
            name: input.name,
            description: input.description,
            kind: input.kind,
            visibility: input.visibility,
            status: ProjectStatus::Active,
            last_updated: today,
            size_mb: 0.0,
            collaborators: 1,
            commits: u32::from(input.initialize_repo),
            language: input.kind.default_language().to_string(),
            stars: 0,
            forks: 0,
        };
        self.projects.insert(0, project.clone());
        Ok(project)
    }

    /// Mark a project archived. Returns `false` for unknown ids.
    pub fn archive(&mut self, id: ProjectId) -> bool {
        match self.projects.iter_mut().find(|p| p.id == id) {
            Some(project) => {
                project.status = ProjectStatus::Archived;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn stats(&self) -> ProjectStats {
        let total_size: f64 = self.projects.iter().map(|p| p.size_mb).sum();
        ProjectStats {
            total: self.projects.len(),
            active: self
                .projects
                .iter()
                .filter(|p| p.status == ProjectStatus::Active)
                .count(),
            shared: self.projects.iter().filter(|p| p.is_shared()).count(),
            total_size: format!("{total_size:.1} MB"),
        }
    }
}

/// "today", "yesterday", "3 days ago", "2 weeks ago", "5 months ago".
///
/// Day counts are inclusive of the current day, so one day back reads as
/// "yesterday" and three weeks back as "4 weeks ago".
#[must_use]
pub fn format_relative(date: NaiveDate, today: NaiveDate) -> String {
    let days = (today - date).num_days().unsigned_abs() + 1;
    match days {
        1 => "today".to_string(),
        2 => "yesterday".to_string(),
        3..=7 => format!("{} days ago", days - 1),
        8..=30 => format!("{} weeks ago", days.div_ceil(7)),
        _ => format!("{} months ago", days.div_ceil(30)),
    }
}
