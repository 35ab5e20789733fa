pub mod engine;
pub mod observability;
