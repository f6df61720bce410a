//! Argo CD token controller: HTTP adapter, credential stores, manifest
//! loading and the control loop around the lifecycle reconciler.

pub mod argocd;
pub mod config;
pub mod controller;
pub mod manifest;
pub mod observability;
pub mod session;
pub mod shutdown;
pub mod store;
