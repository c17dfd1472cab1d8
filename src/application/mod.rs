//! Application services, repository contracts and background jobs.

pub mod aggregator;
pub mod error;
pub mod forum;
pub mod jobs;
pub mod repos;
pub mod similarity;
pub mod tags;
pub mod trending;
pub mod views;
