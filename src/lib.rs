//! # Bureau News
//!
//! Collects news about a fixed topic from a search provider, scores and
//! deduplicates it, moves articles through an editorial workflow, translates
//! them and posts them to a Telegram channel.
//!
//! ## Pipeline
//!
//! ```text
//! search provider ──► ingest (score, dedup, threshold) ──► store
//!                                                           │
//!      Telegram ◄── publish ◄── queue ◄── final approval ◄── translate
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`scrapers`] | Search provider trait and the Webz.io client |
//! | [`ingest`] | Query building, pagination, scoring and dedup gate |
//! | [`scoring`] / [`dedup`] | Pure scoring and similarity checks |
//! | [`store`] | Article store trait, in-memory engine, JSON snapshot |
//! | [`api`] / [`translate`] | Generative provider, machine fallback, orchestration |
//! | [`publish`] | Message formatting and the Telegram channel |
//! | [`workflow`] | State machine and the scheduled translate / publish jobs |
//! | [`config`] / [`keys`] / [`error`] | Settings, API key rotation, error taxonomy |

pub mod api;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod keys;
pub mod models;
pub mod publish;
pub mod scoring;
pub mod scrapers;
pub mod store;
pub mod translate;
pub mod utils;
pub mod workflow;

pub use error::{Error, Result};
