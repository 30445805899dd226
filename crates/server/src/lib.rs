//! The `mrqa` service: batch history commands and the live compliance feed.

pub mod api;
pub mod audit;
pub mod cli;
pub mod live;
pub mod router;
pub mod startup;
pub mod state;
pub mod update;
