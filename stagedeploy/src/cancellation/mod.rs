//! Cooperative cancellation of deployment runs.

mod token;

pub use token::CancellationToken;
