//! Retryability classification for failed attempts.

use std::collections::HashSet;

use crate::error::{ErrorCode, FailureKind, TransportError};

/// Decide whether a failed attempt is worth retrying.
///
/// Rules are checked in order and the first match wins:
///
/// 1. a status code listed in `retryable_statuses`
/// 2. a network error code listed in `retryable_error_codes`
/// 3. a timeout or abort, which is always retryable
///
/// Anything else is not retryable.
pub fn is_retryable(
    error: &TransportError,
    retryable_statuses: &HashSet<u16>,
    retryable_error_codes: &HashSet<ErrorCode>,
) -> bool {
    if let Some(status) = error.status_code()
        && retryable_statuses.contains(&status)
    {
        return true;
    }

    if let Some(code) = error.error_code()
        && retryable_error_codes.contains(&code)
    {
        return true;
    }

    matches!(error.kind(), FailureKind::Timeout | FailureKind::Abort)
}
