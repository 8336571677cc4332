// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

/// Identifier of an attendance card, kept as the digits found in the page.
///
/// The text is never reinterpreted as a number: `007` and `7` are different
/// cards, and identifiers of any length are accepted. Ordering is numeric for
/// identifiers without leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not a task identifier")]
pub struct InvalidTaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = InvalidTaskId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(TaskId(s.to_string()))
        } else {
            Err(InvalidTaskId(s.to_string()))
        }
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        TaskId(value.to_string())
    }
}

impl Ord for TaskId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0.len(), &self.0).cmp(&(other.0.len(), &other.0))
    }
}

impl PartialOrd for TaskId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Progress of a single task within a run.
///
/// `Unchecked` moves either to `Done`, when the card is already signed, or to
/// `Submitted` and then to one of the two verified states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Unchecked,
    Submitted,
    /// Signed before this run touched it.
    Done,
    VerifiedSuccess,
    VerifiedFailure,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::VerifiedSuccess | Self::VerifiedFailure
        )
    }

    /// Advance after inspecting the listing fetched at the start of the run.
    pub fn on_precheck(self, signed: bool) -> Self {
        match self {
            Self::Unchecked if signed => Self::Done,
            Self::Unchecked => Self::Submitted,
            other => other,
        }
    }

    /// Advance after the verification fetch, where `signed` is `None`
    /// if the page could not be retrieved.
    pub fn on_verify(self, signed: Option<bool>) -> Self {
        match self {
            Self::Submitted if signed == Some(true) => Self::VerifiedSuccess,
            Self::Submitted => Self::VerifiedFailure,
            other => other,
        }
    }
}
