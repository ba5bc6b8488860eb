//! Core library for the outlet-insights command line application.
//!
//! Spreadsheet adapters live under [`io`], typed rows in [`model`], column
//! resolution in [`ingest`], joins in [`reconcile`], reductions in
//! [`aggregate`], user selections in [`filter`], and the data-only reports in
//! [`report`]. [`dashboard`] strings them together for each view.

pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod io;
pub mod model;
pub mod reconcile;
pub mod report;

pub use error::{InsightsError, Result};
