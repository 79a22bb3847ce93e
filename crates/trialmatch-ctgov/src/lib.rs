//! ClinicalTrials.gov v2 registry client.
//!
//! [`CtGovClient`] implements [`TrialRegistry`](trialmatch_core::registry::TrialRegistry)
//! for the proactive search and also drives [`populate_catalog`], the bulk
//! seeding used by the `populate-trials` command.

#![allow(async_fn_in_trait)]

mod client;
pub mod error;
mod populate;
pub mod study;

pub use client::{CtGovClient, CtGovConfig, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use populate::{PopulateOptions, PopulateReport, populate_catalog};

#[cfg(test)]
mod tests;
