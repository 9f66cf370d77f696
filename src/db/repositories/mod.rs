pub mod errors;
pub mod interventions;
