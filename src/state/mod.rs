//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `PageStatus`: Queue status of a discovered page (ready or finished)

mod page_status;

pub use page_status::PageStatus;
