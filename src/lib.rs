//! Report Wrapper Library
//!
//! A proxy in front of the report API: fetches report documents, slims them
//! down, derives dashboard metrics and keeps an on-disk copy of every artifact
//! next to a raw-vs-optimized comparison report.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Pure transformations (optimizer, dashboard, comparison).
//! - `integrations`: Upstream client and cache store.
//! - `cache_store`: On-disk artifact cache.
//! - `cli`: Options shared by the utility binaries.
//! - `comparison`: Raw vs optimized metrics and reports.
//! - `config`: Configuration management.
//! - `dashboard`: Dashboard metrics and month-over-month deltas.
//! - `endpoints`: Endpoint registry and parameter merging.
//! - `errors`: Error handling types.
//! - `first_write`: First-occurrence-wins accumulator.
//! - `handlers`: HTTP request handlers.
//! - `optimizer`: Payload optimizer.
//! - `pipeline`: Request orchestration.
//! - `report_client`: Upstream report API client.
//! - `timestamps`: Loose timestamp parsing.

pub mod api;
pub mod core;
pub mod integrations;

pub mod cache_store;
pub mod cli;
pub mod comparison;
pub mod config;
pub mod dashboard;
pub mod endpoints;
pub mod errors;
pub mod first_write;
pub mod handlers;
pub mod optimizer;
pub mod pipeline;
pub mod report_client;
pub mod timestamps;
