//! Status enums for role requests and sample projects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing one of the enums in this module fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `Display`, `FromStr` and `as_str` for a unit-variant enum.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Wire/string form of the value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = StatusParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(StatusParseError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Lifecycle of a role-elevation request.
///
/// Approval deletes the row, so `Approved` is only seen on rows written by
/// other tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

string_enum!(RequestStatus, "request status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Whether a sample project is live or archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
}

string_enum!(ProjectStatus, "project status", {
    Active => "active",
    Archived => "archived",
});

/// Kind of sample project, which drives its icon and default language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    #[default]
    Web,
    Mobile,
    Desktop,
    Library,
    Game,
    Other,
}

string_enum!(ProjectType, "project type", {
    Web => "web",
    Mobile => "mobile",
    Desktop => "desktop",
    Library => "library",
    Game => "game",
    Other => "other",
});

impl ProjectType {
    /// Language assumed for a newly created project of this type.
    #[must_use]
    pub const fn default_language(self) -> &'static str {
        match self {
            Self::Web | Self::Mobile | Self::Library | Self::Game => "JavaScript",
            Self::Desktop => "Python",
            Self::Other => "Unknown",
        }
    }

    /// Icon shown on project cards.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Web => "🌐",
            Self::Mobile => "📱",
            Self::Desktop => "💻",
            Self::Library => "📚",
            Self::Game => "🎮",
            Self::Other => "📁",
        }
    }
}

/// Project visibility. Public projects expose stars and forks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

string_enum!(Visibility, "visibility", {
    Public => "public",
    Private => "private",
});
