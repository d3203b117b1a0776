use std::{fmt, sync::Arc};

use axum::{extract::Request, http::Method};
use http::Extensions;
use thiserror::Error;

use crate::core::route::Handler;

/// Errors raised by a route-matching engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    /// No route is registered under the requested name
    #[error("invalid route name: {0}")]
    UnknownRoute(String),

    /// A route or scope handle does not belong to this engine
    #[error("unknown registration handle: {0}")]
    UnknownHandle(usize),

    /// Reverse lookup was given fewer values than the template has placeholders
    #[error("route '{route}' is missing a value for parameter '{param}'")]
    MissingParameter { route: String, param: String },

    /// Reverse lookup was given more values than the template has placeholders
    #[error("route '{route}' takes {expected} parameter(s), got {given}")]
    ExtraParameter {
        route: String,
        expected: usize,
        given: usize,
    },

    /// The path template was rejected by the underlying matcher
    #[error("route pattern '{pattern}' rejected: {reason}")]
    Conflict { pattern: String, reason: String },
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Per-attempt match state handed to every [`Matcher`].
///
/// It carries the per-request context (an [`Extensions`] map that hooks may
/// write and guards may read) and the substituted handler, if any. Only the
/// first substitution of an attempt takes effect.
#[derive(Default)]
pub struct RouteMatch {
    context: Extensions,
    substitute: Option<Handler>,
}

impl RouteMatch {
    /// Start a match attempt with an existing request context.
    pub fn new(context: Extensions) -> Self {
        Self {
            context,
            substitute: None,
        }
    }

    pub fn context(&self) -> &Extensions {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Extensions {
        &mut self.context
    }

    /// Replace the effective handler of this attempt. Returns `false` when an
    /// earlier matcher already substituted one, in which case nothing changes.
    pub fn substitute(&mut self, handler: Handler) -> bool {
        if self.substitute.is_some() {
            return false;
        }
        self.substitute = Some(handler);
        true
    }

    /// Whether a handler has already been substituted during this attempt.
    pub fn is_substituted(&self) -> bool {
        self.substitute.is_some()
    }

    /// Split into the accumulated context and the substituted handler.
    pub fn into_parts(self) -> (Extensions, Option<Handler>) {
        (self.context, self.substitute)
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("context_len", &self.context.len())
            .field("substituted", &self.substitute.is_some())
            .finish()
    }
}

/// Extra match condition evaluated while a request is matched against a route.
/// Returning `false` rejects the route for this request.
pub type Matcher = Arc<dyn Fn(&Request, &mut RouteMatch) -> bool + Send + Sync>;

/// Mutable view of a single registered route, used by the tree builder and by
/// transformers to decorate it.
pub trait RouteConfigurator {
    /// Name the route was registered under (empty for anonymous routes)
    fn name(&self) -> &str;

    /// Bind the terminal handler, replacing any previous one
    fn set_handler(&mut self, handler: Handler);

    /// Restrict the route to exactly these methods
    fn set_methods(&mut self, methods: &[Method]);

    /// Append a match condition; conditions run in insertion order
    fn add_matcher(&mut self, matcher: Matcher);

    /// Terminal handler bound so far
    fn handler(&self) -> Option<&Handler>;

    /// Add an alternative endpoint at this route's own template and return it
    /// for decoration. Variants inherit this route's conditions and are tried
    /// in insertion order. Once a route has variants it is only reachable
    /// through them.
    fn add_variant(&mut self) -> &mut dyn RouteConfigurator;
}

/// Name-indexed reverse lookup
pub trait ReverseLookup {
    /// Produce a concrete path for `name`, filling template placeholders with
    /// `params` in order.
    fn url(&self, name: &str, params: &[&str]) -> EngineResult<String>;
}

/// RouteEngine defines the port for hierarchical route registration.
///
/// Scopes nest: a route registered in a scope inherits the scope's path
/// prefix and every match condition of the routes that opened the enclosing
/// scopes.
pub trait RouteEngine: ReverseLookup {
    /// Handle for a registration scope
    type Scope: Clone + fmt::Debug;
    /// Handle for a registered route
    type Route: Copy + fmt::Debug;

    /// The outermost scope
    fn root_scope(&self) -> Self::Scope;

    /// Register `path` (relative to `scope`) under `name`.
    fn route(&mut self, scope: &Self::Scope, path: &str, name: &str) -> EngineResult<Self::Route>;

    /// Access a registered route for decoration.
    fn configure(&mut self, route: Self::Route) -> EngineResult<&mut dyn RouteConfigurator>;

    /// Open (or reuse) the nested scope below `route`. The route itself stops
    /// being an endpoint and becomes a prefix for the scope.
    fn subscope(&mut self, route: Self::Route) -> EngineResult<Self::Scope>;

    /// Register an anonymous endpoint at `path` in `scope`.
    fn handle(&mut self, scope: &Self::Scope, path: &str, handler: Handler)
    -> EngineResult<Self::Route>;
}
