//! The ingestion pipeline.
//!
//! One invocation runs strictly sequentially: fetch the navigation page,
//! determine the selectable weeks, then per week fetch → parse → reconcile
//! → persist → collect changes, and finally resolve and dispatch
//! notifications for the whole batch.
//!
//! Consistency is at-least-once, not all-or-nothing: a fetch failure
//! aborts the run but weeks already reconciled in the same run stay
//! committed, and no failure path touches a date the failing run did not
//! revisit.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Settings;
use crate::models::SubstituteEntry;
use crate::notify::{notify_changes, NotificationDispatcher};
use crate::parser::{nav, parse_week_page, DateCursor};
use crate::reconcile::reconcile_date;
use crate::repository::{NotificationRepository, PlanRepository};
use crate::scrapers::{FetchError, PageSource};

/// Fatal pipeline errors. Parse oddities are warnings, not errors, and
/// dispatch-transport trouble never surfaces here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

/// Counters for one completed ingestion run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub weeks: usize,
    pub classes: usize,
    pub parsed_entries: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub messages: usize,
    pub warnings: usize,
    pub notified_tokens: usize,
    pub invalid_tokens: usize,
}

/// The ingestion service invoked by the scheduler.
pub struct IngestService {
    settings: Settings,
    source: Arc<dyn PageSource>,
    plan: Arc<PlanRepository>,
    notifications: Arc<NotificationRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    // The external scheduler gives no overlap guarantee; a slow fetch must
    // not race a second invocation through reconciliation.
    run_guard: tokio::sync::Mutex<()>,
}

impl IngestService {
    pub fn new(
        settings: Settings,
        source: Arc<dyn PageSource>,
        plan: Arc<PlanRepository>,
        notifications: Arc<NotificationRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            settings,
            source,
            plan,
            notifications,
            dispatcher,
            run_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one ingestion cycle, unless the previous one is still going.
    ///
    /// Returns `Ok(None)` for a skipped tick.
    pub async fn run_once(&self) -> Result<Option<RunSummary>, PipelineError> {
        let _guard = match self.run_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("previous ingestion run still in progress; skipping this tick");
                return Ok(None);
            }
        };
        let summary = self.ingest().await?;
        Ok(Some(summary))
    }

    async fn ingest(&self) -> Result<RunSummary, PipelineError> {
        let nav_html = self
            .source
            .fetch_page(&self.settings.source.navigation_url)
            .await?;
        let weeks = nav::extract_weeks(&nav_html);
        let classes = nav::extract_classes(&nav_html);
        info!(
            weeks = weeks.len(),
            classes = classes.len(),
            "navigation page parsed"
        );

        let mut summary = RunSummary {
            classes: classes.len(),
            ..Default::default()
        };
        let mut all_changed: Vec<SubstituteEntry> = Vec::new();

        for week in &weeks {
            let url = self.settings.week_page_url(&week.code);
            let html = self.source.fetch_page(&url).await?;

            // Parsing state is scoped to this invocation and this week.
            let mut cursor = DateCursor::new(week.year);
            let outcome =
                parse_week_page(&html, &self.settings.source.container_selector, &mut cursor);
            for warning in &outcome.warnings {
                warn!("week {}: {}", week.code, warning);
            }
            summary.warnings += outcome.warnings.len();
            summary.parsed_entries += outcome.entries.len();

            let mut by_date: BTreeMap<NaiveDate, Vec<SubstituteEntry>> = BTreeMap::new();
            for entry in outcome.entries {
                by_date.entry(entry.date).or_default().push(entry);
            }
            for (date, candidates) in by_date {
                let reconciled = reconcile_date(&self.plan, date, candidates)?;
                summary.changed += reconciled.changed.len();
                summary.unchanged += reconciled.unchanged;
                summary.removed += reconciled.removed;
                all_changed.extend(reconciled.changed);
            }

            for message in outcome.messages {
                self.plan.replace_message(&message)?;
                summary.messages += 1;
            }
            summary.weeks += 1;
        }

        let notified = notify_changes(
            &self.notifications,
            self.dispatcher.as_ref(),
            &all_changed,
        )
        .await?;
        summary.notified_tokens = notified.tokens;
        summary.invalid_tokens = notified.invalid;

        report_run(&summary);
        Ok(summary)
    }
}

fn report_run(summary: &RunSummary) {
    if summary.changed > 0 {
        info!(
            weeks = summary.weeks,
            parsed = summary.parsed_entries,
            changed = summary.changed,
            removed = summary.removed,
            messages = summary.messages,
            notified = summary.notified_tokens,
            invalid = summary.invalid_tokens,
            "ingestion run complete with changes"
        );
    } else {
        info!(
            weeks = summary.weeks,
            parsed = summary.parsed_entries,
            unchanged = summary.unchanged,
            "ingestion run complete, plan unchanged"
        );
    }
    if summary.warnings > 0 {
        warn!(warnings = summary.warnings, "run finished with parse warnings");
    }
}

/// Drive the service on a fixed interval until the task is aborted.
///
/// A run that outlives the period makes the next tick skip via the
/// service's overlap guard rather than queueing up.
pub async fn run_scheduled(service: Arc<IngestService>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(period_secs = period.as_secs(), "scheduler started");
    loop {
        ticker.tick().await;
        match service.run_once().await {
            Ok(Some(_)) => {}
            Ok(None) => {}
            // Already-committed weeks from this run stay committed.
            Err(err) => warn!("ingestion run aborted: {err}"),
        }
    }
}
