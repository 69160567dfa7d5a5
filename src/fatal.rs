//! Fatal contract-violation reporting.
//!
//! Recoverable conditions are represented in return types; a contract
//! violation is not recoverable and terminates the process. Aborting
//! (rather than unwinding) keeps a broken invariant from being observed
//! by code further up the stack.

/// Reports a broken invariant and aborts the process.
///
/// Used for conditions that indicate a bug in the caller or the runtime
/// itself: an unexpected wakeup source, a strategy hook invoked twice,
/// re-entering `sleep` from a suspended task, or destroying a primitive
/// that still has waiters.
#[cold]
pub(crate) fn contract_violation(message: &str) -> ! {
    tracing::error!(detail = message, "contract violation");
    eprintln!("taskpark: contract violation: {message}");
    std::process::abort();
}
