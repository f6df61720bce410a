//! Argo CD tokens
//!
//! Keeps short-lived project role tokens issued by an access-control service
//! fresh: decides, per declared intent, whether to issue, rotate or keep the
//! stored token, and when to look again.

pub mod claims;
pub mod fixtures;
pub mod intent;
pub mod prelude;
pub mod project;
pub mod reconciler;
pub mod remote;
