//! Population eligibility analysis: per-postcode resolution, risk bucketing, streaming
//! aggregation and the batch orchestrator that ties them together.

pub mod domain;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod risk;
pub mod router;
pub mod service;

pub use domain::{EligibilityOutcome, MalformedPostcode, Postcode, RiskBucket};
pub use orchestrator::{
    AnalysisError, AnalysisRequest, CancelOnDrop, CancellationHandle, ChunkCompleted,
    PopulationAnalyzer, RunControl, ValidationError,
};
pub use report::{AnalysisReport, PartialAggregate};
pub use resolver::{resolve, resolve_raw};
pub use risk::{classify, months_between};
pub use router::eligibility_router;
pub use service::{EligibilityService, EligibilityServiceError, PostcodeCheck};
