//! Core domain model for the Germany IT job search.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "dejobs-core";

/// Job boards the external search collaborator is asked to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Indeed,
    Linkedin,
    Google,
}

impl Site {
    pub fn as_str(self) -> &'static str {
        match self {
            Site::Indeed => "indeed",
            Site::Linkedin => "linkedin",
            Site::Google => "google",
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned (search term, location) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQuery {
    pub search_term: String,
    pub location: String,
    pub is_priority_location: bool,
}

/// Posting row as returned by the external search collaborator.
///
/// Collaborators differ in which columns they fill, so every field is
/// optional and absent fields deserialize to `None`. Consumers must
/// presence-check instead of assuming a column exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRecord {
    pub title: Option<String>,
    pub company: Option<String>,
    pub site: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub job_url: Option<String>,
    pub job_url_direct: Option<String>,
    pub date_posted: Option<NaiveDate>,
}

impl JobRecord {
    /// Resolved application identifier: the primary listing URL when the
    /// collaborator filled it, the direct one otherwise.
    pub fn application_link(&self) -> Option<&str> {
        self.job_url.as_deref().or(self.job_url_direct.as_deref())
    }

    /// True when the row's location mentions `name`, ignoring case.
    /// Rows without a location never match.
    pub fn location_mentions(&self, name: &str) -> bool {
        let Some(location) = self.location.as_deref() else {
            return false;
        };
        location.to_lowercase().contains(&name.to_lowercase())
    }
}
