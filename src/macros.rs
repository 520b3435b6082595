// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call-surface macros.
//!
//! Every macro captures the call site (`module_path!()`, `file!()`, `line!()`) and checks
//! the level *before* evaluating or converting any argument, so a disabled level costs one
//! atomic load.
//!
//! Arguments are anything convertible into [`Arg`](crate::template::Arg). A cause comes
//! first, as `cause = expr`, and may be a [`Cause`](crate::Cause) or a reference to any
//! `std::error::Error`.
//!
//! ```rust
//! use logroute::{Level, LevelFilter, Router, InMemoryHandler};
//! use std::sync::Arc;
//!
//! let router = Router::with_filter(LevelFilter::starting_at(Level::Debug));
//! let handler = Arc::new(InMemoryHandler::new());
//! router.add_default_handler(handler.clone());
//!
//! let err = std::io::Error::other("connection reset");
//! logroute::log!(router, Level::Error, cause = &err, "peer %s dropped", "10.0.0.7");
//! logroute::log!(router, Level::Trace, "filtered out %d", expensive());
//! # fn expensive() -> u64 { unreachable!() }
//!
//! let records = handler.records();
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].message(), "peer 10.0.0.7 dropped");
//! assert_eq!(records[0].cause().unwrap().message(), "connection reset");
//! ```

/// The [`CallSite`](crate::CallSite) of the macro invocation.
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(::core::module_path!(), ::core::file!(), ::core::line!())
    };
}

/// Logs through an explicit router: `log!(router, level, [cause = c,] "template", args...)`.
///
/// `router` may be a `Router`, `&Router` or `Arc<Router>`.
#[macro_export]
macro_rules! log {
    ($router:expr, $level:expr, cause = $cause:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let __router: &$crate::Router = &$router;
        let __level: $crate::Level = $level;
        if __router.is_enabled(__level) {
            __router.log(
                __level,
                $crate::call_site!(),
                ::core::option::Option::Some($crate::Cause::from($cause)),
                $template,
                ::std::vec![$($crate::template::Arg::from($arg)),*],
            );
        }
    }};
    ($router:expr, $level:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let __router: &$crate::Router = &$router;
        let __level: $crate::Level = $level;
        if __router.is_enabled(__level) {
            __router.log(
                __level,
                $crate::call_site!(),
                ::core::option::Option::None,
                $template,
                ::std::vec![$($crate::template::Arg::from($arg)),*],
            );
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_global {
    ($level:expr, $($rest:tt)+) => {{
        if let ::core::option::Option::Some(__router) =
            $crate::global_router::router_if_enabled($level)
        {
            $crate::log!(__router, $level, $($rest)+);
        }
    }};
}

/// Logs at [`Level::Trace`](crate::Level::Trace) through the installed global router.
#[macro_export]
macro_rules! trace {
    ($($rest:tt)+) => { $crate::__log_global!($crate::Level::Trace, $($rest)+) };
}

/// Logs at [`Level::Debug`](crate::Level::Debug) through the installed global router.
#[macro_export]
macro_rules! debug {
    ($($rest:tt)+) => { $crate::__log_global!($crate::Level::Debug, $($rest)+) };
}

/// Logs at [`Level::Info`](crate::Level::Info) through the installed global router.
#[macro_export]
macro_rules! info {
    ($($rest:tt)+) => { $crate::__log_global!($crate::Level::Info, $($rest)+) };
}

/// Logs at [`Level::Warn`](crate::Level::Warn) through the installed global router.
#[macro_export]
macro_rules! warn {
    ($($rest:tt)+) => { $crate::__log_global!($crate::Level::Warn, $($rest)+) };
}

/// Logs at [`Level::Error`](crate::Level::Error) through the installed global router.
#[macro_export]
macro_rules! error {
    ($($rest:tt)+) => { $crate::__log_global!($crate::Level::Error, $($rest)+) };
}

/// Logs at [`Level::Fatal`](crate::Level::Fatal) through the installed global router.
#[macro_export]
macro_rules! fatal {
    ($($rest:tt)+) => { $crate::__log_global!($crate::Level::Fatal, $($rest)+) };
}
