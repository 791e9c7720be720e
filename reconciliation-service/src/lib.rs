//! Reconciliation Service - provider/platform ledger reconciliation with
//! streaming ingestion and background jobs.

pub mod config;
pub mod dtos;
pub mod engine;
pub mod handlers;
pub mod ingest;
pub mod jobs;
pub mod models;
pub mod services;
pub mod startup;
