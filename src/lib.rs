//! vplan — substitution-plan ingestion and notification service.
//!
//! A scheduled job fetches a school's externally hosted, hand-authored
//! HTML substitution pages, parses them into structured records,
//! reconciles them against previously stored state, persists the result
//! and notifies subscribed clients of genuine changes.

pub mod cli;
pub mod config;
pub mod models;
pub mod notify;
pub mod parser;
pub mod pipeline;
pub mod reconcile;
pub mod repository;
pub mod scrapers;
