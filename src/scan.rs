//! Scan orchestration: mail source → answer extraction → reconciliation.
//!
//! One sequential pass per run:
//! 1. list messages matching the subject filter
//! 2. fetch each, extract the answer, reconcile into the store
//! 3. ask the source to mark messages that created or updated a record
//!
//! A source failure ends the pass early; whatever was reconciled so far is
//! returned and still eligible for persistence.

use tracing::{debug, error, info, warn};

use crate::answers::extract_with_window;
use crate::config::ScanConfig;
use crate::error::MailError;
use crate::ledger::{ReconcileOutcome, Reconciler, RecordStore};
use crate::mail::MailSource;

/// Counters and the terminating error (if any) for one run.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Messages fetched and looked at.
    pub inspected: usize,
    /// Messages with a Yes/No answer to the question.
    pub answered: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Messages with no text body or no sender address.
    pub skipped: usize,
    /// Messages the source could not fetch or parse.
    pub unreadable: usize,
    /// Messages with no usable timestamp to order them by.
    pub undated: usize,
    /// Error that stopped enumeration early.
    pub failure: Option<MailError>,
}

impl ScanReport {
    pub fn log_summary(&self) {
        if let Some(e) = &self.failure {
            warn!(error = %e, "Scan stopped early; keeping results gathered so far");
        }
        info!(
            inspected = self.inspected,
            answered = self.answered,
            inserted = self.inserted,
            updated = self.updated,
            skipped = self.skipped,
            unreadable = self.unreadable,
            undated = self.undated,
            "Scan finished"
        );
    }
}

/// Result of [`Scanner::run`], ready for persistence.
#[derive(Debug)]
pub struct ScanResult {
    pub store: RecordStore,
    /// True iff any record was added or replaced this run.
    pub changed: bool,
    pub report: ScanReport,
}

/// Drives one scan over a [`MailSource`].
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `source` and merge answers into `store`.
    pub fn run(&self, source: &mut dyn MailSource, store: RecordStore) -> ScanResult {
        let mut reconciler = Reconciler::new(store);
        let mut report = ScanReport::default();

        info!(subject = %self.config.subject_filter, "Searching for matching messages");
        match source.list(&self.config.subject_filter) {
            Ok(ids) => {
                if ids.is_empty() {
                    info!(subject = %self.config.subject_filter, "No messages with matching subject");
                }
                for id in ids {
                    if let Err(e) = self.process_one(source, &id, &mut reconciler, &mut report) {
                        error!(uid = %id, stage = "fetch", error = %e, "Enumeration failed");
                        report.failure = Some(e);
                        break;
                    }
                }
            }
            Err(e) => {
                error!(stage = "list", error = %e, "Could not list messages");
                report.failure = Some(e);
            }
        }

        let (store, changed) = reconciler.finish();
        ScanResult {
            store,
            changed,
            report,
        }
    }

    /// Handle one message. Only source-level failures are returned.
    fn process_one(
        &self,
        source: &mut dyn MailSource,
        id: &str,
        reconciler: &mut Reconciler,
        report: &mut ScanReport,
    ) -> Result<(), MailError> {
        let message = match source.fetch(id) {
            Ok(message) => message,
            Err(e @ MailError::Fetch { .. }) => {
                warn!(uid = %id, stage = "fetch", error = %e, "Skipping unreadable message");
                report.unreadable += 1;
                return Ok(());
            }
            Err(e @ MailError::Undated { .. }) => {
                warn!(uid = %id, stage = "date", error = %e, "Skipping message without a timestamp");
                report.undated += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        report.inspected += 1;

        debug!(
            uid = %message.id,
            sender = %message.sender_address,
            received_at = %message.received_at,
            "Processing message"
        );

        if message.sender_address.is_empty() {
            warn!(uid = %message.id, stage = "sender", "Message has no sender address, skipping");
            report.skipped += 1;
            return Ok(());
        }
        if message.body.trim().is_empty() {
            info!(uid = %message.id, sender = %message.sender_address, "Message has no text body, skipping");
            report.skipped += 1;
            return Ok(());
        }

        let Some(answer) =
            extract_with_window(&message.body, &self.config.question, self.config.window_chars)
        else {
            info!(
                uid = %message.id,
                sender = %message.sender_address,
                "Question or Yes/No answer not found"
            );
            return Ok(());
        };
        report.answered += 1;

        let outcome = reconciler.reconcile(&message, answer);
        match outcome {
            ReconcileOutcome::Inserted => report.inserted += 1,
            ReconcileOutcome::Updated => report.updated += 1,
            ReconcileOutcome::Unchanged => {}
        }
        info!(
            uid = %message.id,
            sender = %message.sender_address,
            answer = %answer,
            outcome = outcome.label(),
            "Recorded answer"
        );

        if outcome.is_mutation()
            && let Err(e) = source.mark_processed(&message.id)
        {
            warn!(
                uid = %message.id,
                sender = %message.sender_address,
                stage = "mark_processed",
                error = %e,
                "Could not mark message as processed"
            );
        }
        Ok(())
    }
}
