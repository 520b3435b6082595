//SPDX-License-Identifier: MIT OR Apache-2.0
/*!
# logroute

logroute is a namespace-routed logging library for Rust.

# The problem

A process-wide logger with one level is too coarse once an application grows. The network
layer wants its own file, the storage engine is noisy at DEBUG but the rest of the program
is not, and writing a log line to a slow disk should never stall the thread that produced it.

logroute answers this with three ideas:

* **Namespaces.** Every record carries the module path it was logged from. Handlers are
  registered against a namespace (`myapp::net`) and receive everything logged at or below
  it, unless a more specific registration (`myapp::net::tls`) claims it first.
* **One cheap check.** Levels are a bitset. A disabled level costs one atomic load, and the
  macros don't evaluate their arguments until that check passes.
* **Aspects.** An [`Aspect`] turns records into its own log objects and processes them in
  batches. Producers only enqueue; whichever thread finds the queue idle drains it. An
  aspect that keeps failing shuts itself down and says so once, at FATAL.

# Levels

| Name  | Usecase                                          |
|-------|--------------------------------------------------|
| TRACE | Very detailed debugging                          |
| DEBUG | Print-style debugging                            |
| INFO  | Normal operation worth recording                 |
| WARN  | Suspicious condition                             |
| ERROR | An operation failed                              |
| FATAL | The process (or a subsystem) cannot continue     |

FATAL can never be filtered out.

# The API

```rust
use logroute::{Level, LevelFilter, Router, InMemoryHandler};
use std::sync::Arc;

let router = Router::with_filter(LevelFilter::starting_at(Level::Info));
let net = Arc::new(InMemoryHandler::new());
router.register(module_path!(), net.clone()).unwrap();

logroute::log!(router, Level::Info, "accepted %d connections", 3);
logroute::log!(router, Level::Debug, "not evaluated: %s", String::from("x"));

assert_eq!(net.drain_logs(), "INFO accepted 3 connections");
```

Messages are printf-style templates (`%s`, `%d`, `%.2f`, ...). Formatting is deferred
until a handler asks for [`LogRecord::message`], so records nobody renders are never
formatted.

Applications that want free functions install a router process-wide with
[`global_router::install`] and use [`info!`], [`error!`] and friends.

# Configuration

A [`Router`] can be built from a [`RouterConfig`], usually loaded from TOML:

```rust
let config = logroute::RouterConfig::from_toml_str(r#"
    level = "debug"
    overrides = ["noisy::dep=warn"]
    layout = "{level} {namespace} {message}"
"#).unwrap();
let router = logroute::Router::new(&config).unwrap();
assert!(router.is_enabled(logroute::Level::Debug));
router.shutdown();
```

# Multithreading

Routers are shared as `Arc<Router>`. Handlers are called on the logging thread and are
serialized per handler unless they opt out through
[`Handler::requires_serialization`]. Namespace lookups are cached; registering or
unregistering a handler invalidates the cache.
*/

pub mod aspect;
mod cause;
pub mod config;
mod error;
pub mod global_router;
pub mod handler;
mod inmemory_handler;
pub mod layout;
mod level;
mod level_filter;
mod log_record;
mod macros;
pub mod registry;
mod router;
pub mod stack;
mod stderror_handler;
mod stream_aspect;
pub mod template;

pub use aspect::{Aspect, AspectControl, AspectEngine, AspectState};
pub use cause::Cause;
pub use config::{RouterConfig, Settings};
pub use error::{AspectError, ConfigError};
pub use handler::Handler;
pub use inmemory_handler::InMemoryHandler;
pub use level::Level;
pub use level_filter::LevelFilter;
pub use log_record::{CallSite, LogRecord};
pub use router::Router;
pub use stderror_handler::StdErrorHandler;
pub use stream_aspect::{StreamAspect, Target};
pub use template::Arg;
