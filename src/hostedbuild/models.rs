use serde::{Deserialize, Serialize};

/// `GET /repo/<slug>/branch/<branch>` (API v3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branch {
    pub name: String,
    pub last_build: Option<Build>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Build {
    pub id: Option<u64>,
    pub number: Option<String>,
    pub state: Option<String>,
}

/// Resolved outcome of a branch's latest build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Passed,
    /// Any other resolved state: failed, errored, canceled, running, or no build yet.
    NotPassed,
}

impl Branch {
    #[must_use]
    pub fn build_state(&self) -> BuildState {
        match self.last_build.as_ref().and_then(|b| b.state.as_deref()) {
            Some("passed") => BuildState::Passed,
            _ => BuildState::NotPassed,
        }
    }
}

/// One tracked repository branch on a hosted build service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    pub organization: String,
    pub name: String,
    pub branch: String,
}

impl Repository {
    pub const DEFAULT_BRANCH: &'static str = "master";

    #[must_use]
    pub fn new(
        organization: impl Into<String>,
        name: impl Into<String>,
        branch: Option<&str>,
    ) -> Self {
        let branch = match branch {
            Some(branch) if !branch.is_empty() => branch.to_owned(),
            _ => Self::DEFAULT_BRANCH.to_owned(),
        };
        Self {
            organization: organization.into(),
            name: name.into(),
            branch,
        }
    }

    /// `<organization>/<name>`
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}/{}", self.organization, self.name)
    }
}
