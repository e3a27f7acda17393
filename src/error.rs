//! Diagnostic error types for the trustlend core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text so callers know whether a
//! failure is fatal for the search or was degraded locally.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the trustlend crate.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the consumer.
#[derive(Debug, Error, Diagnostic)]
pub enum LendError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),
}

// ---------------------------------------------------------------------------
// Address errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AddressError {
    #[error("invalid address length: expected 40 hex digits, got {len}")]
    #[diagnostic(
        code(trustlend::address::bad_length),
        help(
            "An account address is 20 bytes, written as `0x` followed by \
             40 hexadecimal digits. Check for truncation or a missing prefix."
        )
    )]
    BadLength { len: usize },

    #[error("invalid hex digit {digit:?} in address")]
    #[diagnostic(
        code(trustlend::address::bad_digit),
        help("Addresses may only contain the hex digits 0-9, a-f, A-F.")
    )]
    BadDigit { digit: char },
}

// ---------------------------------------------------------------------------
// Search errors
// ---------------------------------------------------------------------------

/// Fatal error kinds for a path search.
///
/// Anything not representable here (a failed batch entry, a failed profile
/// lookup) is degraded locally and logged instead of surfaced.
#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("invalid borrower address: {reason}")]
    #[diagnostic(
        code(trustlend::search::invalid_borrower),
        help("Pass a well-formed 20-byte account address as the borrower.")
    )]
    InvalidBorrower { reason: String },

    #[error("invalid search depth {max_depth}: must be at least 1")]
    #[diagnostic(
        code(trustlend::search::invalid_depth),
        help(
            "`max_depth` is the number of trust hops to explore outward from \
             the borrower. Depth 1 checks direct trusters only."
        )
    )]
    InvalidDepth { max_depth: usize },

    #[error("upstream data source unavailable: {source}")]
    #[diagnostic(
        code(trustlend::search::upstream_unavailable),
        help(
            "The trust graph source or the chain state reader was unreachable \
             for a whole batch. The search cannot continue; retry policy \
             belongs to the caller."
        )
    )]
    UpstreamUnavailable {
        #[source]
        source: SourceError,
    },
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

/// Failures reported by the consumed external interfaces.
///
/// Appears in two positions: as the per-entry error inside a batch map
/// (degraded to "address excluded") and as the outer error of a wholly
/// failed call (escalated to [`SearchError::UpstreamUnavailable`]).
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum SourceError {
    #[error("transport failure: {message}")]
    #[diagnostic(
        code(trustlend::source::transport),
        help(
            "The RPC endpoint could not be reached or returned a malformed \
             response. Check connectivity and endpoint configuration."
        )
    )]
    Transport { message: String },

    #[error("lookup failed for {address}: {message}")]
    #[diagnostic(
        code(trustlend::source::lookup),
        help(
            "A single entry of a batched read failed. The affected address is \
             excluded from the current search; other addresses are unaffected."
        )
    )]
    Lookup { address: String, message: String },

    #[error("malformed on-chain record for {address}: {message}")]
    #[diagnostic(
        code(trustlend::source::decode),
        help(
            "The raw positional call result could not be decoded into a typed \
             record. The contract ABI may have changed."
        )
    )]
    Decode { address: String, message: String },
}

/// Convenience alias for functions returning trustlend results.
pub type LendResult<T> = std::result::Result<T, LendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_error_converts_to_lend_error() {
        let err = AddressError::BadLength { len: 12 };
        let lend: LendError = err.into();
        assert!(matches!(
            lend,
            LendError::Address(AddressError::BadLength { .. })
        ));
    }

    #[test]
    fn search_error_wraps_source_error() {
        let src = SourceError::Transport {
            message: "connection refused".into(),
        };
        let err = SearchError::UpstreamUnavailable { source: src };
        let msg = format!("{err}");
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = SearchError::InvalidDepth { max_depth: 0 };
        assert!(format!("{err}").contains('0'));

        let err = AddressError::BadDigit { digit: 'z' };
        assert!(format!("{err}").contains('z'));
    }
}
