use std::fmt;

use serde::{Deserialize, Serialize};

/// Stages of a verification run.
///
/// `Enumerating → SetComparing → ContentComparing → Done`, or `Failed` from
/// any stage once a mismatch has been recorded or a fatal error occurs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyPhase {
    Enumerating,
    SetComparing,
    ContentComparing,
    Done,
    Failed,
}

impl VerifyPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for VerifyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enumerating => "enumerating",
            Self::SetComparing => "set comparing",
            Self::ContentComparing => "content comparing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
