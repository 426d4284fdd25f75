//! Medication intake tracking: owner-scoped dose records, photo evidence on
//! intake, and adherence metrics (per-day status, streak, monthly rate).

pub mod adherence;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod medications;
pub mod state;
pub mod storage;
