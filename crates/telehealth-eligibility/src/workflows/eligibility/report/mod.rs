mod aggregate;
pub mod views;

pub use aggregate::PartialAggregate;
pub use views::{
    percentage, AnalysisReport, BucketShare, RemotenessBreakdown, StateBreakdown,
    TimeBasedAnalysis,
};
