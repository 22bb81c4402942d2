//! Fatal resolution errors (§7 kinds 1 and 4). Per-edge failures are
//! recoverable and live on [`crate::edge::EdgeState`] as
//! [`crate::edge::EdgeFailure`] instead.

use thiserror::Error;

use crate::identifier::ModuleIdentifier;

/// A fatal failure of the whole resolve. No visitor callbacks are emitted
/// when this is returned.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not resolve the root component: {0}")]
    UnresolvableRoot(String),

    #[error("conflict handler failed resolving module '{0}'")]
    ConflictHandlerFailure(ModuleIdentifier),

    #[error("resolution was cancelled")]
    Cancelled,
}

pub type ResolveResult<T> = Result<T, ResolveError>;
