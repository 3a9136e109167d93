//! Cooperative session cancellation.

mod token;

pub use token::CancellationToken;
