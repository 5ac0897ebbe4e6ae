//! Review generation
//!
//! This module turns a pull request event and its change set into a
//! [`ReviewRequest`] prompt and runs it through the review agent.

pub mod request;
pub mod reviewer;

pub use request::ReviewRequest;
pub use reviewer::AgentReviewGenerator;
