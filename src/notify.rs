//! Notifier dispatch: the `Notifier` plug-in trait, the delivery policy
//! table, and message formatting.

use crate::job::NotifyPolicy;
use crate::result::JobResult;

/// A sink for `(title, body)` outcome messages. The core holds a list of
/// these; registration happens once at config load.
pub trait Notifier: Send + Sync {
    fn deliver(&self, title: &str, body: &str) -> anyhow::Result<()>;
}

/// Built-in sink that records deliveries to the tracing log, since actual
/// transports (email, etc.) are external collaborators this crate doesn't
/// implement.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, title: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(%title, %body, "notification");
        Ok(())
    }
}

/// Whether `result` should be delivered under `notify`. Locked and Skipped
/// are never delivered.
pub fn should_deliver(notify: NotifyPolicy, result: &JobResult) -> bool {
    match notify {
        NotifyPolicy::Never => false,
        NotifyPolicy::Always => matches!(result, JobResult::Completed { .. } | JobResult::Error { .. }),
        NotifyPolicy::OnError => match result {
            JobResult::Completed { exit_status, .. } => *exit_status != 0,
            JobResult::Error { .. } => true,
            JobResult::Locked { .. } | JobResult::Skipped { .. } => false,
        },
    }
}

/// Transform a result into a `(title, body)` message. Only called when
/// `should_deliver` is true; `Locked`/`Skipped` have no message form.
pub fn format_message(result: &JobResult) -> (String, String) {
    match result {
        JobResult::Completed {
            name,
            exit_status,
            stdout,
            stderr,
        } => {
            let title = if *exit_status == 0 {
                format!("Job '{name}' succeeded")
            } else {
                format!("Job '{name}' failed with code {exit_status}")
            };
            let body = format!("stderr:\n{}\nstdout:\n{}", stderr.text(), stdout.text());
            (title, body)
        }
        JobResult::Error { name, message, log } => {
            let title = format!("Job '{name}' did not run because of an error");
            let body = format!("{message}\n{log}");
            (title, body)
        }
        JobResult::Locked { name } | JobResult::Skipped { name } => {
            (String::new(), format!("no message for job '{name}'"))
        }
    }
}

/// Apply the policy for `job` to `result`, delivering to every configured
/// notifier when warranted.
pub fn notify_if_necessary(
    notify: NotifyPolicy,
    result: &JobResult,
    notifiers: &[Box<dyn Notifier>],
) {
    if !should_deliver(notify, result) {
        return;
    }
    let (title, body) = format_message(result);
    for notifier in notifiers {
        if let Err(err) = notifier.deliver(&title, &body) {
            tracing::warn!(%err, "notifier delivery failed");
        }
    }
}
