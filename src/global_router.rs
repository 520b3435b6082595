// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide router used by the level macros.
//!
//! Nothing is installed until the application calls [`install`]; until then the level
//! macros (`info!`, `error!`, ...) do nothing. Code that owns a [`Router`] directly can
//! ignore this module and use [`log!`](crate::log) with the router as first argument.
//!
//! # Lifecycle
//!
//! ```
//! use logroute::{global_router, Level, LevelFilter, Router, InMemoryHandler};
//! use std::sync::Arc;
//!
//! let router = Router::with_filter(LevelFilter::starting_at(Level::Info));
//! let handler = Arc::new(InMemoryHandler::new());
//! router.add_default_handler(handler.clone());
//! global_router::install(router);
//!
//! logroute::info!("started in %d ms", 12);
//! assert_eq!(handler.drain_logs(), "INFO started in 12 ms");
//!
//! // flushes aspects and uninstalls
//! global_router::shutdown();
//! logroute::info!("nobody hears this");
//! assert!(handler.is_empty());
//! ```
//!
//! # Implementation Notes
//!
//! The router is held as an `Arc` behind a read-write lock. Readers clone the `Arc` and
//! release the lock before logging, so a router replaced or shut down mid-call stays
//! alive until the in-flight call finishes.

use crate::Level;
use crate::router::Router;
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

static GLOBAL_ROUTER: OnceLock<RwLock<Option<Arc<Router>>>> = OnceLock::new();

fn slot() -> &'static RwLock<Option<Arc<Router>>> {
    GLOBAL_ROUTER.get_or_init(|| RwLock::new(None))
}

/// Makes `router` the process-wide router, returning the one it replaces.
///
/// The replaced router is not shut down; that is left to the caller.
pub fn install(router: Arc<Router>) -> Option<Arc<Router>> {
    slot().write().replace(router)
}

/// The installed router, if any.
pub fn router() -> Option<Arc<Router>> {
    slot().read().clone()
}

/// The installed router, but only if it would accept `level`.
///
/// This is the macros' fast path: a disabled level costs one lock-free read of the
/// router's filter after the `Arc` clone.
#[doc(hidden)]
pub fn router_if_enabled(level: Level) -> Option<Arc<Router>> {
    let guard = slot().read();
    match guard.as_ref() {
        Some(router) if router.is_enabled(level) => Some(router.clone()),
        _ => None,
    }
}

/// Uninstalls and returns the router without shutting it down.
pub fn take() -> Option<Arc<Router>> {
    slot().write().take()
}

/// Uninstalls the router and shuts it down, flushing its aspects.
pub fn shutdown() {
    if let Some(router) = take() {
        router.shutdown();
    }
}
