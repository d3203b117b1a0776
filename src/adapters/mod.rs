pub mod dispatcher;
pub mod matchit_engine;
pub mod middleware;

/// Re-export commonly used types from adapters
pub use dispatcher::{Dispatcher, MatchedRoute, RouteParams};
pub use matchit_engine::{EngineRoute, MatchitEngine, RouteId, ScopeId};
pub use middleware::*;
