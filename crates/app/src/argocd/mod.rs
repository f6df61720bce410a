//! Argo CD REST adapter.

mod client;
mod models;

pub use client::{ArgoCdClient, ArgoCdClientConfig, ArgoCdClientError};
