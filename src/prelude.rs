//! Argo CD tokens prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    claims::{TokenClaims, TokenError, TokenScope},
    intent::{CredentialRef, Intent, IntentError},
    project::{IssuedTokenRecord, ProjectRole, RemoteProject},
    reconciler::{
        Action, CredentialState, ErrorKind, LifecycleReconciler, ReconcileError, ReconcileOutcome,
    },
    remote::{RemoteCredentialClient, RemoteError},
};
