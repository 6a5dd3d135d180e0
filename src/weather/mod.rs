//! Weather along a route
//!
//! - Alignment of provider observations onto forecast points (`aligner`)
//! - The provider seam with batched, retrying fetches (`provider`)

pub mod aligner;
pub mod provider;

pub use aligner::{align_nearest, coverage, merge};
pub use provider::{RetryPolicy, WeatherFetcher, WeatherProvider};
