pub mod clock;
pub mod eligibility;
pub mod reference;
