// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use crate::config::Config;
use crate::error::CheckinResult;
use crate::markup::{extract_task_ids, is_signed};
use crate::notify::{notify_outcome, Notifier};
use crate::portal::Portal;
use crate::report::{Outcome, RunReport};
use crate::task::{TaskId, TaskState};

/// Performs one complete check-in pass over the course page.
///
/// Tasks are handled one at a time: a task is submitted and verified before
/// the next one is looked at. Nothing is retried.
pub struct CheckinRunner<'a> {
    config: &'a Config,
    portal: &'a dyn Portal,
    notifier: Option<&'a dyn Notifier>,
}

impl<'a> CheckinRunner<'a> {
    pub fn new(
        config: &'a Config,
        portal: &'a dyn Portal,
        notifier: Option<&'a dyn Notifier>,
    ) -> Self {
        Self {
            config,
            portal,
            notifier,
        }
    }

    /// Run the pass.
    ///
    /// Only a failure to retrieve the course page is returned as an error:
    /// the failures of single tasks are recorded in the report.
    pub async fn run(&self) -> CheckinResult<RunReport> {
        log::info!("fetching course page of class {}", self.config.class_id);
        let markup = self.portal.fetch_task_page().await?;

        let ids = extract_task_ids(&markup);
        let mut report = RunReport::new();
        if ids.is_empty() {
            log::info!("no check-in task found, nothing to do");
            return Ok(report);
        }
        log::info!(
            "found {} check-in task(s): {}",
            ids.len(),
            ids.iter()
                .map(|x| x.to_string())
                .collect::<Vec<String>>()
                .join(",")
        );

        for id in ids {
            let outcome = self.process(&id, &markup).await;
            report.record(id, outcome);
        }

        for line in report.summary() {
            log::info!("{}", line);
        }
        Ok(report)
    }

    async fn process(&self, id: &TaskId, markup: &str) -> Outcome {
        log::info!("processing task {}", id);

        let state = TaskState::Unchecked.on_precheck(is_signed(markup, id));
        if state == TaskState::Done {
            log::info!("task {} already signed, skipping", id);
            return Outcome::AlreadySigned;
        }

        log::info!("task {} not signed, submitting check-in", id);
        let verified = match self.portal.submit_checkin(id, &self.config.location).await {
            Ok(()) => self.verify_after_submit(id).await,
            Err(err) => {
                log::error!("check-in request for task {} failed: {}", id, err);
                Err(err)
            }
        };

        let state = state.on_verify(verified.as_ref().ok().copied());
        let outcome = match verified {
            Ok(_) if state == TaskState::VerifiedSuccess => Outcome::Signed,
            Ok(_) => Outcome::NotSigned,
            Err(err) => Outcome::Failed(err.to_string()),
        };

        match &outcome {
            Outcome::Signed => {
                log::info!("{}", outcome.message(id));
                notify_outcome(self.notifier, &outcome.message(id)).await;
            }
            _ => {
                log::warn!("{}", outcome.message(id));
                if self.config.notify_failures {
                    notify_outcome(self.notifier, &outcome.message(id)).await;
                }
            }
        }
        outcome
    }

    /// Wait for the site to process the submission, then fetch the course
    /// page again and tell whether the task is now signed.
    ///
    /// The response to the submission itself is not trusted.
    pub async fn verify_after_submit(&self, id: &TaskId) -> CheckinResult<bool> {
        tokio::time::sleep(self.config.verify_delay).await;
        log::info!("refreshing course page to verify task {}", id);
        match self.portal.fetch_task_page().await {
            Ok(markup) => Ok(is_signed(&markup, id)),
            Err(err) => {
                log::error!("cannot verify task {}: {}", id, err);
                Err(err)
            }
        }
    }
}
