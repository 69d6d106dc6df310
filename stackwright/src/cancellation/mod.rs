//! Cooperative cancellation for long-running engine loops.

mod token;

pub use token::CancellationToken;
