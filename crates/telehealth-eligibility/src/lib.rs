//! Medicare telehealth disaster exemption analysis for clinic patient populations.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
