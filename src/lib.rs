//! routedef - declarative, hierarchical HTTP route trees.
//!
//! A route tree is written as one nested expression: every node has a path
//! segment, a name, an optional handler and transformer, and any number of
//! guards, hooks and child routes. Children may also be *aliases* that copy a
//! sibling subtree under a new path and name prefix. The finished tree can be
//! walked, searched, copied with a transform, rendered as a table, and
//! registered against a routing engine.
//!
//! # Quick Example
//! ```no_run
//! use routedef::core::{Guard, Handler, reroute, route, sroute};
//!
//! # fn main() -> Result<(), routedef::ports::EngineError> {
//! let ok = Handler::new(|_req| async { "ok" });
//! let deny = Guard::new(|_req, _ctx| true, Handler::new(|_req| async { "denied" }));
//!
//! let tree = sroute(
//!     "/",
//!     ok.clone(),
//!     "home",
//!     [
//!         route("/a", ok.clone(), "a", [], [deny], [sroute("/b", ok, "b", []).into()]).into(),
//!         reroute("a", "/mirror", "mirror", [], []),
//!     ],
//! );
//! tree.print();
//!
//! let app = tree.build_new_router()?.into_router();
//! # let _ = app;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! `core` holds the tree model and the registration walk, `ports` the engine
//! traits the walk is written against, and `adapters` the `matchit` engine,
//! its dispatcher and the Axum middleware used when serving.
//!
//! # Error Handling
//! Library operations return [`ports::EngineError`] or
//! [`config::ValidationError`]; configuration loading and the binary use
//! `eyre::Result` with context attached via `WrapErr`.
pub mod config;
pub mod ports;
pub mod sample;
pub mod tracing_setup;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{Dispatcher, MatchitEngine, RouteParams},
    core::{Entry, RouteTree, UrlFn, UrlMode},
    ports::{EngineError, EngineResult},
};
