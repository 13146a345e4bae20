//! End-to-end handling of one webhook delivery.
//!
//! intake -> list changes -> workspace -> resolve -> execute -> report.
//! Nothing here is shared between deliveries except the read-only config
//! and the collaborator handles.

use crate::config::UpdateConfig;
use crate::context::EventContext;
use crate::error::Result;
use crate::event::{intake, Intake};
use crate::executor::{execute, TaskRunner};
use crate::github::{format_response_raw, ChangeRequestClient};
use crate::report::ResultSet;
use crate::resolver::resolve;
use crate::workspace::{SourceControl, Workspace};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Ignored {
        reason: String,
    },
    NothingToReport,
    Reported {
        succeeded: usize,
        failed: usize,
        internal: usize,
    },
}

#[derive(Clone)]
pub struct Pipeline {
    config: Arc<UpdateConfig>,
    github: Arc<dyn ChangeRequestClient>,
    scm: Arc<dyn SourceControl>,
    runner: Arc<dyn TaskRunner>,
}

impl Pipeline {
    pub fn new(
        config: Arc<UpdateConfig>,
        github: Arc<dyn ChangeRequestClient>,
        scm: Arc<dyn SourceControl>,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            config,
            github,
            scm,
            runner,
        }
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    pub fn handle_event(
        &self,
        event_type: &str,
        delivery_id: &str,
        payload: &[u8],
    ) -> Result<EventOutcome> {
        let ctx = EventContext::new(event_type, delivery_id);
        let entered = ctx.span().entered();
        tracing::info!("received webhook");

        let pr = match intake(event_type, payload)? {
            Intake::Accepted(pr) => pr,
            Intake::Ignored(reason) => {
                tracing::debug!(%reason, "ignoring event");
                return Ok(EventOutcome::Ignored { reason });
            }
        };

        let ctx = ctx.with_pull_request(&pr.org, &pr.repo, pr.number, &pr.author, &pr.url);
        drop(entered);
        let _entered = ctx.span().entered();
        tracing::info!(
            head_sha = %pr.head_sha,
            merge_sha = %pr.merge_sha,
            "accepted merged pull request"
        );

        let changes = match self.github.get_changes(&pr.org, &pr.repo, pr.number) {
            Ok(changes) => changes,
            Err(e) => {
                tracing::error!(error = %e, "error getting pull request changes");
                return Ok(EventOutcome::Ignored {
                    reason: e.to_string(),
                });
            }
        };

        let mut results = ResultSet::default();
        {
            let workspace = Workspace::acquire(self.scm.as_ref(), &pr.org, &pr.repo, &pr.head_sha)?;
            let (tasks, errors) = resolve(&self.config, &changes, workspace.dir());
            results.internal = errors;
            tracing::info!(
                tasks = tasks.len(),
                internal = results.internal.len(),
                "resolved tasks"
            );
            execute(tasks, workspace.dir(), self.runner.as_ref(), &mut results);
            workspace.release();
        }

        if results.is_empty() {
            return Ok(EventOutcome::NothingToReport);
        }

        let comment = format_response_raw(&pr.body, &pr.url, &pr.author, &results.render());
        self.github
            .create_comment(&pr.org, &pr.repo, pr.number, &comment)?;

        Ok(EventOutcome::Reported {
            succeeded: results.succeeded.len(),
            failed: results.failed.len(),
            internal: results.internal.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Matcher;
    use crate::error::UpdaterError;
    use crate::event::tests::payload;
    use crate::executor::tests::FakeRunner;
    use crate::github::ChangeRecord;
    use crate::workspace::tests::FakeScm;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGithub {
        changes: Vec<String>,
        fail_changes: bool,
        fail_comment: bool,
        comments: Mutex<Vec<(String, String, u64, String)>>,
    }

    impl FakeGithub {
        fn with_changes(paths: &[&str]) -> Self {
            Self {
                changes: paths.iter().map(|p| p.to_string()).collect(),
                ..Self::default()
            }
        }

        fn comments(&self) -> Vec<String> {
            self.comments
                .lock()
                .unwrap()
                .iter()
                .map(|(_, _, _, body)| body.clone())
                .collect()
        }
    }

    impl ChangeRequestClient for FakeGithub {
        fn get_changes(&self, org: &str, repo: &str, number: u64) -> Result<Vec<ChangeRecord>> {
            if self.fail_changes {
                return Err(UpdaterError::ListChanges {
                    org: org.into(),
                    repo: repo.into(),
                    number,
                    reason: "502".into(),
                });
            }
            Ok(self.changes.iter().map(ChangeRecord::new).collect())
        }

        fn create_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<()> {
            if self.fail_comment {
                return Err(UpdaterError::CreateComment {
                    org: org.into(),
                    repo: repo.into(),
                    number,
                    reason: "403".into(),
                });
            }
            self.comments
                .lock()
                .unwrap()
                .push((org.into(), repo.into(), number, body.into()));
            Ok(())
        }
    }

    struct Harness {
        github: Arc<FakeGithub>,
        scm: FakeScm,
        runner: Arc<FakeRunner>,
        pipeline: Pipeline,
    }

    fn harness(
        config: UpdateConfig,
        github: FakeGithub,
        scm: FakeScm,
        runner: FakeRunner,
    ) -> Harness {
        let github = Arc::new(github);
        let runner = Arc::new(runner);
        let pipeline = Pipeline::new(
            Arc::new(config),
            github.clone(),
            Arc::new(scm.clone()),
            runner.clone(),
        );
        Harness {
            github,
            scm,
            runner,
            pipeline,
        }
    }

    fn merged() -> Vec<u8> {
        payload("closed", true, Some("m1"))
    }

    fn app_target() -> UpdateConfig {
        UpdateConfig {
            targets: vec!["manifests/app.yaml".into()],
            ..UpdateConfig::default()
        }
    }

    #[test]
    fn deployment_target_is_applied_and_reported() {
        let h = harness(
            app_target(),
            FakeGithub::with_changes(&["manifests/app.yaml"]),
            FakeScm::with_files(&[("manifests/app.yaml", "kind: Deployment\n")]),
            FakeRunner::default(),
        );
        let outcome = h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap();
        assert_eq!(
            outcome,
            EventOutcome::Reported {
                succeeded: 1,
                failed: 0,
                internal: 0
            }
        );

        let calls = h.runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "/usr/bin/make");
        assert_eq!(calls[0][1], "apply");
        assert!(calls[0][2].starts_with("WHAT=/"));
        assert!(calls[0][2].ends_with("/manifests/app.yaml"));

        let comments = h.github.comments();
        assert_eq!(comments.len(), 1);
        let greeting = "@alice: The following updates succeeded:";
        assert!(comments[0].starts_with(greeting));
        assert!(!comments[0].contains("updates failed"));
        assert!(!comments[0].contains("internal errors"));
        assert!(comments[0].contains(">Bump the app manifest"));
        assert_eq!(h.scm.clean_count(), 1);
        assert_eq!(*h.scm.checkouts.lock().unwrap(), vec!["abc123".to_string()]);
    }

    #[test]
    fn template_target_uses_apply_template() {
        let h = harness(
            app_target(),
            FakeGithub::with_changes(&["manifests/app.yaml"]),
            FakeScm::with_files(&[("manifests/app.yaml", "kind: Template\n")]),
            FakeRunner::default(),
        );
        h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap();
        assert_eq!(h.runner.calls()[0][1], "applyTemplate");
    }

    #[test]
    fn matcher_runs_once_for_many_files() {
        let config = UpdateConfig {
            matchers: vec![Matcher::new(r"^jobs/.*\.yaml$", "jobs").unwrap()],
            ..UpdateConfig::default()
        };
        let h = harness(
            config,
            FakeGithub::with_changes(&["jobs/a.yaml", "jobs/b.yaml"]),
            FakeScm::default(),
            FakeRunner::default(),
        );
        h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap();
        assert_eq!(
            h.runner.calls(),
            vec![vec!["/usr/bin/make".to_string(), "jobs".to_string()]]
        );
    }

    #[test]
    fn empty_config_posts_nothing() {
        let h = harness(
            UpdateConfig::default(),
            FakeGithub::with_changes(&["manifests/app.yaml", "jobs/a.yaml"]),
            FakeScm::default(),
            FakeRunner::default(),
        );
        let outcome = h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap();
        assert_eq!(outcome, EventOutcome::NothingToReport);
        assert!(h.runner.calls().is_empty());
        assert!(h.github.comments().is_empty());
        assert_eq!(h.scm.clean_count(), 1);
    }

    #[test]
    fn failed_task_reported_alongside_success() {
        let config = UpdateConfig {
            matchers: vec![
                Matcher::new("^jobs/", "jobs").unwrap(),
                Matcher::new("^plugins/", "plugins").unwrap(),
            ],
            ..UpdateConfig::default()
        };
        let h = harness(
            config,
            FakeGithub::with_changes(&["jobs/a.yaml", "plugins/p.yaml"]),
            FakeScm::default(),
            FakeRunner::failing_on("jobs"),
        );
        let outcome = h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap();
        assert_eq!(
            outcome,
            EventOutcome::Reported {
                succeeded: 1,
                failed: 1,
                internal: 0
            }
        );
        let comment = &h.github.comments()[0];
        let failed_at = comment.find("The following updates failed:").unwrap();
        assert!(comment[failed_at..].contains("make jobs"));
        assert!(comment[failed_at..].contains("exit status: 2"));
        assert!(!comment[failed_at..].contains("make plugins"));
        assert_eq!(h.scm.clean_count(), 1);
    }

    #[test]
    fn unparseable_target_is_internal_error() {
        let h = harness(
            app_target(),
            FakeGithub::with_changes(&["manifests/app.yaml"]),
            FakeScm::with_files(&[("manifests/app.yaml", "kind: [oops\n")]),
            FakeRunner::default(),
        );
        let outcome = h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap();
        assert_eq!(
            outcome,
            EventOutcome::Reported {
                succeeded: 0,
                failed: 0,
                internal: 1
            }
        );
        assert!(h.runner.calls().is_empty());
        let comment = &h.github.comments()[0];
        assert!(comment.contains("internal errors occurred"));
        assert!(comment.contains("manifests/app.yaml"));
        assert_eq!(h.scm.clean_count(), 1);
    }

    #[test]
    fn unmerged_close_does_nothing() {
        let h = harness(
            app_target(),
            FakeGithub::with_changes(&["manifests/app.yaml"]),
            FakeScm::default(),
            FakeRunner::default(),
        );
        let outcome = h
            .pipeline
            .handle_event("pull_request", "d1", &payload("closed", false, None))
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored { .. }));
        assert_eq!(h.scm.clean_count(), 0);
    }

    #[test]
    fn malformed_payload_is_error() {
        let h = harness(
            app_target(),
            FakeGithub::default(),
            FakeScm::default(),
            FakeRunner::default(),
        );
        let err = h.pipeline.handle_event("pull_request", "d1", b"{").unwrap_err();
        assert!(matches!(err, UpdaterError::Decode(_)));
    }

    #[test]
    fn change_listing_failure_skips_clone() {
        let github = FakeGithub {
            fail_changes: true,
            ..FakeGithub::default()
        };
        let h = harness(
            app_target(),
            github,
            FakeScm::default(),
            FakeRunner::default(),
        );
        let outcome = h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored { .. }));
        assert_eq!(h.scm.clean_count(), 0);
        assert!(h.scm.checkouts.lock().unwrap().is_empty());
    }

    #[test]
    fn checkout_failure_aborts_and_cleans() {
        let scm = FakeScm {
            fail_checkout: true,
            ..FakeScm::default()
        };
        let h = harness(
            app_target(),
            FakeGithub::with_changes(&["manifests/app.yaml"]),
            scm,
            FakeRunner::default(),
        );
        let err = h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap_err();
        assert!(matches!(err, UpdaterError::Checkout { .. }));
        assert_eq!(h.scm.clean_count(), 1);
        assert!(h.github.comments().is_empty());
    }

    #[test]
    fn clone_failure_aborts_without_comment() {
        let scm = FakeScm {
            fail_clone: true,
            ..FakeScm::default()
        };
        let h = harness(
            app_target(),
            FakeGithub::with_changes(&["manifests/app.yaml"]),
            scm,
            FakeRunner::default(),
        );
        let err = h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap_err();
        assert!(matches!(err, UpdaterError::Clone { .. }));
        assert!(h.github.comments().is_empty());
    }

    #[test]
    fn comment_failure_is_invocation_error() {
        let github = FakeGithub {
            changes: vec!["manifests/app.yaml".into()],
            fail_comment: true,
            ..FakeGithub::default()
        };
        let h = harness(
            app_target(),
            github,
            FakeScm::with_files(&[("manifests/app.yaml", "kind: Deployment\n")]),
            FakeRunner::default(),
        );
        let err = h.pipeline.handle_event("pull_request", "d1", &merged()).unwrap_err();
        assert!(matches!(err, UpdaterError::CreateComment { .. }));
        assert_eq!(h.scm.clean_count(), 1);
    }
}
