pub mod endpoints;
pub mod errors;
pub mod types;
