//! User-facing message catalog and reporters.
//!
//! Progress messages are identified by a [`MessageId`] and rendered from a
//! `%s` template, so the engine never builds user-facing strings itself.
//! Where they go is up to the injected [`Reporter`].

use std::sync::Mutex;

use tracing::Level;

/// Catalog of user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    StartAddonExecute,
    FinishAddonExecute,
    TargetIsFile,
    ActionIsNotPermitted,
    TaskNotFound,
    NoRecords,
    RetrievingData,
    RetrievingDataCompleted,
    PlanComputed,
    DeletingTargetData,
    UploadingFiles,
    FilesProcessed,
    ActionFailed,
    JobAborted,
}

impl MessageId {
    /// Stable key, used in structured logs.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::StartAddonExecute => "startAddonExecute",
            Self::FinishAddonExecute => "finishAddonExecute",
            Self::TargetIsFile => "targetIsFile",
            Self::ActionIsNotPermitted => "actionIsNotPermitted",
            Self::TaskNotFound => "taskNotFound",
            Self::NoRecords => "noRecords",
            Self::RetrievingData => "retrievingData",
            Self::RetrievingDataCompleted => "retrievingDataCompleted",
            Self::PlanComputed => "planComputed",
            Self::DeletingTargetData => "deletingTargetData",
            Self::UploadingFiles => "uploadingFiles",
            Self::FilesProcessed => "filesProcessed",
            Self::ActionFailed => "actionFailed",
            Self::JobAborted => "jobAborted",
        }
    }

    /// Message template; each `%s` takes the next token.
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::StartAddonExecute => "[%s] Add-on module %s started.",
            Self::FinishAddonExecute => "[%s] Add-on module %s finished.",
            Self::TargetIsFile => "[%s] The target is a file. Files cannot be exported.",
            Self::ActionIsNotPermitted => "[%s] The action is not permitted for operation %s.",
            Self::TaskNotFound => "[%s] No task is defined for this object.",
            Self::NoRecords => "[%s] There are no files to process.",
            Self::RetrievingData => "[%s] Retrieving %s from the %s.",
            Self::RetrievingDataCompleted => "[%s] %s records of %s retrieved from the %s.",
            Self::PlanComputed => "[%s] Files to create: %s, to update: %s, to skip: %s, to delete: %s.",
            Self::DeletingTargetData => "[%s] Deleting %s old files from the target.",
            Self::UploadingFiles => "[%s] Uploading %s files to the target.",
            Self::FilesProcessed => "[%s] Files created: %s, updated: %s, skipped: %s, deleted: %s, failed: %s.",
            Self::ActionFailed => "[%s] %s failed: %s",
            Self::JobAborted => "[%s] Job aborted. %s actions were not started.",
        }
    }
}

/// Render a message, filling `%s` placeholders from `tokens` in order.
///
/// Missing tokens render as empty strings; extra tokens are ignored.
#[must_use]
pub fn render(id: MessageId, tokens: &[String]) -> String {
    let mut out = String::new();
    let mut tokens = tokens.iter();
    let mut parts = id.template().split("%s").peekable();

    while let Some(part) = parts.next() {
        out.push_str(part);
        if parts.peek().is_some() {
            if let Some(token) = tokens.next() {
                out.push_str(token);
            }
        }
    }
    out
}

/// Destination for user-facing messages.
pub trait Reporter: Send + Sync {
    fn report(&self, level: Level, id: MessageId, tokens: &[String]);

    fn info(&self, id: MessageId, tokens: &[String]) {
        self.report(Level::INFO, id, tokens);
    }

    fn warn(&self, id: MessageId, tokens: &[String]) {
        self.report(Level::WARN, id, tokens);
    }
}

/// Sends messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, level: Level, id: MessageId, tokens: &[String]) {
        let message = render(id, tokens);
        let key = id.key();
        if level == Level::ERROR {
            tracing::error!(key, "{message}");
        } else if level == Level::WARN {
            tracing::warn!(key, "{message}");
        } else if level == Level::INFO {
            tracing::info!(key, "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(key, "{message}");
        } else {
            tracing::trace!(key, "{message}");
        }
    }
}

/// A message captured by [`MemoryReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedMessage {
    pub level: Level,
    pub id: MessageId,
    pub text: String,
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    messages: Mutex<Vec<ReportedMessage>>,
}

impl MemoryReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages reported so far, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<ReportedMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Whether a message with this id was reported.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.messages().iter().any(|m| m.id == id)
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, level: Level, id: MessageId, tokens: &[String]) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(ReportedMessage { level, id, text: render(id, tokens) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_render_fills_placeholders_in_order() {
        let text = render(MessageId::StartAddonExecute, &tokens(&["Account", "core:ExportFiles"]));
        assert_eq!(text, "[Account] Add-on module core:ExportFiles started.");
    }

    #[test]
    fn test_render_tolerates_token_mismatch() {
        assert_eq!(
            render(MessageId::ActionIsNotPermitted, &tokens(&["Account"])),
            "[Account] The action is not permitted for operation ."
        );
        assert_eq!(
            render(MessageId::NoRecords, &tokens(&["Account", "extra"])),
            "[Account] There are no files to process."
        );
    }

    #[test]
    fn test_memory_reporter_records_messages() {
        let reporter = MemoryReporter::new();
        reporter.info(MessageId::NoRecords, &tokens(&["Contact"]));
        reporter.warn(MessageId::JobAborted, &tokens(&["Contact", "3"]));

        let messages = reporter.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].level, Level::WARN);
        assert_eq!(messages[1].text, "[Contact] Job aborted. 3 actions were not started.");
        assert!(reporter.contains(MessageId::NoRecords));
        assert!(!reporter.contains(MessageId::ActionFailed));
    }

    #[test]
    fn test_keys_are_unique() {
        use std::collections::HashSet;
        let all = [
            MessageId::StartAddonExecute,
            MessageId::FinishAddonExecute,
            MessageId::TargetIsFile,
            MessageId::ActionIsNotPermitted,
            MessageId::TaskNotFound,
            MessageId::NoRecords,
            MessageId::RetrievingData,
            MessageId::RetrievingDataCompleted,
            MessageId::PlanComputed,
            MessageId::DeletingTargetData,
            MessageId::UploadingFiles,
            MessageId::FilesProcessed,
            MessageId::ActionFailed,
            MessageId::JobAborted,
        ];
        let keys: HashSet<_> = all.iter().map(|id| id.key()).collect();
        assert_eq!(keys.len(), all.len());
    }
}
