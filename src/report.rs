// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use crate::task::{TaskId, TaskState};

/// Final result of a task within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The card was already signed, nothing was submitted.
    AlreadySigned,
    /// Submitted and found signed on the refreshed page.
    Signed,
    /// Submitted but the refreshed page still shows the card as not signed.
    NotSigned,
    /// Submission or verification could not be carried out.
    Failed(String),
}

impl Outcome {
    pub fn state(&self) -> TaskState {
        match self {
            Self::AlreadySigned => TaskState::Done,
            Self::Signed => TaskState::VerifiedSuccess,
            Self::NotSigned | Self::Failed(_) => TaskState::VerifiedFailure,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.state() == TaskState::VerifiedFailure
    }

    /// Human-readable message, also used as notification content.
    pub fn message(&self, id: &TaskId) -> String {
        match self {
            Self::AlreadySigned => format!("ID: {} 已是 [已签] 状态，跳过", id),
            Self::Signed => format!("签到成功！ID: {} 状态已更新为 [已签]", id),
            Self::NotSigned => format!("签到可能失败，ID: {} 页面仍未显示 [已签]", id),
            Self::Failed(reason) => format!("签到请求异常，ID: {}: {}", id, reason),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadySigned => write!(f, "already signed"),
            Self::Signed => write!(f, "signed"),
            Self::NotSigned => write!(f, "not signed after submission"),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Outcomes of the tasks processed in a run, in processing order.
#[derive(Debug, Default)]
pub struct RunReport {
    outcomes: Vec<(TaskId, Outcome)>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: TaskId, outcome: Outcome) {
        self.outcomes.push((id, outcome));
    }

    pub fn outcomes(&self) -> &[(TaskId, Outcome)] {
        &self.outcomes
    }

    pub fn get(&self, id: &TaskId) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(x, _)| x == id)
            .map(|(_, outcome)| outcome)
    }

    /// True if no task was found in the page.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn num_signed(&self) -> usize {
        self.count(|x| *x == Outcome::Signed)
    }

    pub fn num_already_signed(&self) -> usize {
        self.count(|x| *x == Outcome::AlreadySigned)
    }

    pub fn num_failed(&self) -> usize {
        self.count(Outcome::is_failure)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, x)| pred(x)).count()
    }

    /// One line per task followed by the totals.
    pub fn summary(&self) -> Vec<String> {
        if self.is_empty() {
            return vec!["no check-in task found".to_string()];
        }
        let mut lines = self
            .outcomes
            .iter()
            .map(|(id, outcome)| format!("task {}: {}", id, outcome))
            .collect::<Vec<String>>();
        lines.push(format!(
            "{} task(s): {} signed, {} already signed, {} failed",
            self.outcomes.len(),
            self.num_signed(),
            self.num_already_signed(),
            self.num_failed()
        ));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_report() {
        let mut report = RunReport::new();
        assert!(report.is_empty());
        assert_eq!(vec!["no check-in task found".to_string()], report.summary());

        report.record(TaskId::from(3), Outcome::Signed);
        report.record(TaskId::from(1), Outcome::AlreadySigned);
        report.record(TaskId::from(2), Outcome::NotSigned);
        report.record(TaskId::from(5), Outcome::Failed("timeout".to_string()));

        assert_eq!(1, report.num_signed());
        assert_eq!(1, report.num_already_signed());
        assert_eq!(2, report.num_failed());
        assert_eq!(Some(&Outcome::NotSigned), report.get(&TaskId::from(2)));
        assert_eq!(None, report.get(&TaskId::from(4)));

        // insertion order is kept
        assert_eq!(
            vec![TaskId::from(3), TaskId::from(1), TaskId::from(2), TaskId::from(5)],
            report.outcomes().iter().map(|(id, _)| id.clone()).collect::<Vec<_>>()
        );
        assert_eq!(
            vec![
                "task 3: signed".to_string(),
                "task 1: already signed".to_string(),
                "task 2: not signed after submission".to_string(),
                "task 5: failed (timeout)".to_string(),
                "4 task(s): 1 signed, 1 already signed, 2 failed".to_string(),
            ],
            report.summary()
        );
    }

    #[test]
    fn test_outcome_message() {
        assert_eq!(
            "签到成功！ID: 7 状态已更新为 [已签]",
            Outcome::Signed.message(&TaskId::from(7))
        );
        assert_eq!(
            "签到可能失败，ID: 7 页面仍未显示 [已签]",
            Outcome::NotSigned.message(&TaskId::from(7))
        );
        assert_eq!(TaskState::Done, Outcome::AlreadySigned.state());
        assert!(Outcome::Failed(String::new()).is_failure());
        assert!(!Outcome::Signed.is_failure());
    }
}
