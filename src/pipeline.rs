//! Batch processing: normalize, classify and extract for each email, then
//! hand meetings to the calendar and noteworthy emails to the notifier.
//!
//! Emails run concurrently, bounded by `maxWorkers`. One bad email is logged
//! and skipped; it never stops the batch.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::collaborators::{CalendarSink, LogNotifier, Notifier};
use crate::error::{CollaboratorError, ConfigError, CoreError};
use crate::extractor::MeetingExtractor;
use crate::intent::{self, Intent};
use crate::mime;
use crate::normalizer::{self, Normalizer};
use crate::notification::{self, CALENDAR_FAILURE_NOTE};
use crate::thread;
use crate::types::{Config, MeetingCandidate, ProcessedEmail, RawEmail};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Emails processed at the same time.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Only create calendar events for emails classified as meetings.
    #[serde(default)]
    pub require_meeting_intent: bool,
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            require_meeting_intent: false,
            min_content_chars: default_min_content_chars(),
        }
    }
}

fn default_max_workers() -> usize {
    4
}

fn default_min_content_chars() -> usize {
    10
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.maxWorkers",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// An email that could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub id: String,
    pub reason: String,
}

/// Outcome of a batch, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: Vec<ProcessedEmail>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn meetings_found(&self) -> usize {
        self.processed.iter().filter(|p| p.meeting.is_some()).count()
    }

    pub fn events_created(&self) -> usize {
        self.processed
            .iter()
            .filter(|p| p.calendar_event_created)
            .count()
    }
}

pub struct Pipeline {
    extractor: Arc<MeetingExtractor>,
    config: PipelineConfig,
    calendar: Option<Arc<dyn CalendarSink>>,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    /// Build from validated config. No calendar; notifications go to the log.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.pipeline.validate()?;
        Ok(Self {
            extractor: Arc::new(MeetingExtractor::from_config(config)?),
            config: config.pipeline.clone(),
            calendar: None,
            notifier: Arc::new(LogNotifier),
        })
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarSink>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Process one email: CPU work on the blocking pool, then collaborators.
    pub async fn process_email(&self, email: RawEmail) -> Result<ProcessedEmail, CoreError> {
        email.validate()?;
        let id = email.id.clone();

        let extractor = Arc::clone(&self.extractor);
        let config = self.config.clone();
        let mut processed =
            tokio::task::spawn_blocking(move || analyze_email(&extractor, &config, &email))
                .await
                .map_err(|e| CoreError::Aborted {
                    id,
                    reason: e.to_string(),
                })??;

        self.dispatch(&mut processed).await;
        Ok(processed)
    }

    /// Process a batch with at most `maxWorkers` emails in flight.
    pub async fn process_batch(self: &Arc<Self>, emails: Vec<RawEmail>) -> BatchReport {
        let total = emails.len();
        let ids: Vec<String> = emails.iter().map(|e| e.id.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut join_set = JoinSet::new();

        for (index, email) in emails.into_iter().enumerate() {
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let id = email.id.clone();
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                (index, id, pipeline.process_email(email).await)
            });
        }

        let mut slots: Vec<Option<ProcessedEmail>> = vec![None; total];
        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, _, Ok(processed))) => slots[index] = Some(processed),
                Ok((index, id, Err(e))) => {
                    warn!("Skipping email #{} ({}): {}", index, id, e);
                    failures.push(BatchFailure {
                        index,
                        id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => warn!("Email task failed to complete: {}", e),
            }
        }
        // A task that panicked never reported its index
        for (index, id) in ids.into_iter().enumerate() {
            if slots[index].is_none() && !failures.iter().any(|f| f.index == index) {
                failures.push(BatchFailure {
                    index,
                    id,
                    reason: "processing task did not complete".to_string(),
                });
            }
        }
        failures.sort_by_key(|f| f.index);

        let report = BatchReport {
            processed: slots.into_iter().flatten().collect(),
            failures,
        };
        info!(
            "Processed {}/{} emails: {} meetings found, {} calendar events created",
            report.processed.len(),
            total,
            report.meetings_found(),
            report.events_created()
        );
        report
    }

    async fn dispatch(&self, processed: &mut ProcessedEmail) {
        if let Some(meeting) = processed.meeting.clone() {
            let wanted =
                !self.config.require_meeting_intent || processed.intent == Intent::Meeting;
            match (&self.calendar, wanted) {
                (Some(calendar), true) => {
                    match create_event_with_retry(calendar.as_ref(), &meeting).await {
                        Ok(event_id) => {
                            info!("Created calendar event {} for email {}", event_id, processed.id);
                            processed.calendar_event_created = true;
                            processed.reply_note =
                                Some(notification::calendar_confirmation(&meeting.start_datetime));
                        }
                        Err(e) => {
                            warn!("Calendar event for email {} failed: {}", processed.id, e);
                            processed.reply_note = Some(CALENDAR_FAILURE_NOTE.to_string());
                        }
                    }
                }
                (Some(_), false) => {
                    info!(
                        "Email {} has a date but no meeting intent, skipping calendar",
                        processed.id
                    );
                }
                (None, _) => {}
            }
        }

        if processed.meeting.is_some() || processed.intent == Intent::Meeting {
            let message = notification::new_email_notification(processed);
            if let Err(e) = self.notifier.notify(&message).await {
                warn!("Notification for email {} failed: {}", processed.id, e);
            }
        }
    }
}

/// One retry for transient calendar failures.
async fn create_event_with_retry(
    calendar: &dyn CalendarSink,
    meeting: &MeetingCandidate,
) -> Result<String, CollaboratorError> {
    match calendar.create_event(meeting).await {
        Err(e) if e.is_retryable() => {
            warn!("Calendar unavailable, retrying once: {}", e);
            calendar.create_event(meeting).await
        }
        other => other,
    }
}

/// Normalized text of a body: MIME text parts when the body is a full
/// message, the body itself otherwise.
fn normalize_body(normalizer: &Normalizer, body: &str) -> String {
    match mime::text_parts(body) {
        Some(parts) => parts
            .iter()
            .map(|part| {
                if part.mime_type == "text/html" {
                    normalizer.normalize_html(&part.raw, part.charset.as_deref())
                } else {
                    normalizer.normalize(&part.raw, part.charset.as_deref())
                }
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        None => normalizer.normalize_str(body),
    }
}

/// The CPU-bound part of processing. No collaborators involved.
pub fn analyze_email(
    extractor: &MeetingExtractor,
    config: &PipelineConfig,
    email: &RawEmail,
) -> Result<ProcessedEmail, CoreError> {
    email.validate()?;

    let thread = thread::extract_thread_info(email);
    let cleaned = normalize_body(extractor.normalizer(), &email.body);

    let content_valid = normalizer::is_meaningful(&cleaned, config.min_content_chars);
    if !content_valid {
        warn!(
            "Cleaned content of email {} from {} is not meaningful",
            email.id, email.from
        );
    }

    let summary = format!("{}{}", thread::reply_context(&thread), cleaned);
    let intent = intent::detect_intent_with(extractor, &cleaned);
    let meeting =
        extractor.extract_from_normalized(&email.subject, &email.from, &email.body, &cleaned);

    Ok(ProcessedEmail {
        id: email.id.clone(),
        from: email.from.clone(),
        subject: email.subject.clone(),
        cleaned_summary: cleaned,
        summary,
        content_valid,
        thread,
        intent,
        meeting,
        calendar_event_created: false,
        reply_note: None,
        processed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::notification::Notification;

    fn email(id: &str, subject: &str, body: &str) -> RawEmail {
        RawEmail {
            id: id.to_string(),
            subject: subject.to_string(),
            from: "Jane <jane@example.com>".to_string(),
            body: body.to_string(),
            date: None,
        }
    }

    #[derive(Default)]
    struct RecordingCalendar {
        created: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CalendarSink for RecordingCalendar {
        async fn create_event(&self, meeting: &MeetingCandidate) -> Result<String, CollaboratorError> {
            let mut created = self.created.lock().unwrap();
            created.push(meeting.subject.clone());
            Ok(format!("evt-{}", created.len()))
        }
    }

    /// Fails `failures` times with `Unavailable`, then succeeds.
    struct FlakyCalendar {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CalendarSink for FlakyCalendar {
        async fn create_event(&self, _: &MeetingCandidate) -> Result<String, CollaboratorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(CollaboratorError::Unavailable {
                    service: "calendar".to_string(),
                    message: "503".to_string(),
                })
            } else {
                Ok("evt".to_string())
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), CollaboratorError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct PanickingNotifier;

    #[async_trait]
    impl Notifier for PanickingNotifier {
        async fn notify(&self, _notification: &Notification) -> Result<(), CollaboratorError> {
            panic!("notifier crashed");
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(&Config::default()).unwrap()
    }

    #[test]
    fn test_pipeline_config_defaults_and_validation() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_workers, 4);
        assert!(!config.require_meeting_intent);
        assert_eq!(config.min_content_chars, 10);

        let zero = PipelineConfig {
            max_workers: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(zero.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_analyze_meeting_email() {
        let ex = MeetingExtractor::from_config(&Config::default()).unwrap();
        let body = "Let's meet on 2024-03-15 at 2:30 PM to discuss the project.";
        let p = analyze_email(&ex, &PipelineConfig::default(), &email("m1", "Sync", body)).unwrap();
        assert_eq!(p.cleaned_summary, body);
        assert_eq!(p.summary, body);
        assert!(p.content_valid);
        assert_eq!(p.intent, Intent::Meeting);
        assert!(p.meeting.is_some());
        assert!(!p.calendar_event_created);
    }

    #[test]
    fn test_analyze_reply_gets_thread_context() {
        let ex = MeetingExtractor::from_config(&Config::default()).unwrap();
        let body = "In-Reply-To: <abc@mail>\n\nSure, 14:00 on 01/06/2024 works.";
        let p = analyze_email(&ex, &PipelineConfig::default(), &email("m2", "Re: Plan", body)).unwrap();
        assert!(p.thread.is_reply);
        assert_eq!(
            p.summary,
            format!("[REPLY to thread: plan] [In reply to: abc@mail] {}", p.cleaned_summary)
        );
    }

    #[test]
    fn test_analyze_flags_meaningless_content() {
        let ex = MeetingExtractor::from_config(&Config::default()).unwrap();
        let p = analyze_email(&ex, &PipelineConfig::default(), &email("m3", "x", "Thanks,\nBob")).unwrap();
        assert_eq!(p.cleaned_summary, "");
        assert!(!p.content_valid);
        assert_eq!(p.intent, Intent::General);
        assert!(p.meeting.is_none());
    }

    #[test]
    fn test_analyze_mime_body() {
        let ex = MeetingExtractor::from_config(&Config::default()).unwrap();
        let body = "MIME-Version: 1.0\n\
Content-Type: text/plain; charset=iso-8859-1\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
R=E9union le 2024-05-02 =E0 10:00.\n";
        let p = analyze_email(&ex, &PipelineConfig::default(), &email("m4", "Réunion", body)).unwrap();
        assert_eq!(p.cleaned_summary, "Réunion le 2024-05-02 à 10:00.");
        assert!(p.meeting.is_some());
    }

    #[test]
    fn test_analyze_rejects_missing_id() {
        let ex = MeetingExtractor::from_config(&Config::default()).unwrap();
        let result = analyze_email(&ex, &PipelineConfig::default(), &email("", "x", "body"));
        assert!(matches!(result, Err(CoreError::MissingField("id"))));
    }

    #[tokio::test]
    async fn test_calendar_event_created_with_confirmation() {
        let calendar = Arc::new(RecordingCalendar::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let p = pipeline()
            .with_calendar(calendar.clone())
            .with_notifier(notifier.clone());

        let body = "Let's meet on 2024-03-15 at 2:30 PM to discuss the project.";
        let processed = p.process_email(email("m1", "Sync", body)).await.unwrap();

        assert!(processed.calendar_event_created);
        assert_eq!(
            processed.reply_note.as_deref(),
            Some("I've added this event to your calendar for March 15, 2024 at 02:30 PM.")
        );
        assert_eq!(*calendar.created.lock().unwrap(), vec!["Sync".to_string()]);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("*Subject*: Sync"));
    }

    #[tokio::test]
    async fn test_transient_calendar_failure_retried_once() {
        let calendar = Arc::new(FlakyCalendar {
            failures: 1,
            calls: AtomicUsize::new(0),
        });
        let p = pipeline().with_calendar(calendar.clone());
        let processed = p
            .process_email(email("m1", "Sync", "Call on 2024-03-15 at 10:00"))
            .await
            .unwrap();
        assert!(processed.calendar_event_created);
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_calendar_failure_adds_manual_note() {
        let calendar = Arc::new(FlakyCalendar {
            failures: 5,
            calls: AtomicUsize::new(0),
        });
        let p = pipeline().with_calendar(calendar);
        let processed = p
            .process_email(email("m1", "Sync", "Call on 2024-03-15 at 10:00"))
            .await
            .unwrap();
        assert!(!processed.calendar_event_created);
        assert_eq!(processed.reply_note.as_deref(), Some(CALENDAR_FAILURE_NOTE));
    }

    #[tokio::test]
    async fn test_require_meeting_intent_skips_calendar() {
        let mut config = Config::default();
        config.pipeline.require_meeting_intent = true;
        let calendar = Arc::new(RecordingCalendar::default());
        let p = Pipeline::new(&config).unwrap().with_calendar(calendar.clone());

        // Date and time but no scheduling vocabulary
        let processed = p
            .process_email(email("m1", "Invoice", "Invoice 2024-03-15 10:00 paid."))
            .await
            .unwrap();
        assert!(processed.meeting.is_some());
        assert_eq!(processed.intent, Intent::General);
        assert!(!processed.calendar_event_created);
        assert!(calendar.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_skips_bad_records() {
        let mut config = Config::default();
        config.pipeline.max_workers = 2;
        let p = Arc::new(Pipeline::new(&config).unwrap());

        let emails = vec![
            email("a", "One", "Let's meet on 2024-03-15 at 2:30 PM."),
            email("", "Broken", "no id"),
            email("c", "Three", "Thanks for the update, nothing to schedule."),
            email("d", "Four", "Lunch on 2024-04-01 at 1 PM?"),
        ];
        let report = p.process_batch(emails).await;

        let ids: Vec<&str> = report.processed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.meetings_found(), 2);
        assert_eq!(report.events_created(), 0);
    }

    #[tokio::test]
    async fn test_batch_records_crashed_task() {
        let p = Arc::new(pipeline().with_notifier(Arc::new(PanickingNotifier)));
        let emails = vec![
            email("a", "Status", "Nothing new this week, all fine."),
            email("b", "Sync", "Let's meet on 2024-03-15 at 2:30 PM."),
        ];
        let report = p.process_batch(emails).await;

        let ids: Vec<&str> = report.processed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].id, "b");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let p = Arc::new(pipeline());
        let report = p.process_batch(Vec::new()).await;
        assert!(report.processed.is_empty());
        assert!(report.failures.is_empty());
    }
}
