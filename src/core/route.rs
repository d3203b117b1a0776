//! Route entity model.
//!
//! A [`Route`] holds the scalar fields of one node of a route tree: its name,
//! path segment, method constraint, handler, transformer, guards and hooks.
//! Children live in the owning [`RouteTree`], never in the `Route` itself, so a
//! value copy of a `Route` can be rewritten freely without touching structure.
//!
//! Guards, hooks, handlers and transformers are cheap-to-clone wrappers around
//! shared closures; cloning a route never duplicates behaviour, only the
//! references to it.
use std::{
    any::Any,
    fmt,
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use axum::{
    extract::Request,
    http::Method,
    response::{IntoResponse, Response},
};
use futures_util::{
    FutureExt,
    future::{self, BoxFuture},
};
use http::Extensions;

use crate::{
    core::tree::RouteTree,
    ports::route_engine::{RouteConfigurator, RouteMatch},
};

type HandlerFn = dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync;
type RejectFn = dyn Fn(&Request, &Extensions) -> bool + Send + Sync;
type HookFn = dyn Fn(&Request, &mut Extensions) + Send + Sync;
type TransformFn = dyn Fn(&mut dyn RouteConfigurator) + Send + Sync;

/// Terminal request handler.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    /// Wrap an async function or closure returning anything that implements
    /// [`IntoResponse`].
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self(Arc::new(move |req| {
            let fut = f(req);
            async move { fut.await.into_response() }.boxed()
        }))
    }

    /// Invoke the handler.
    pub fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        (self.0)(req)
    }

    /// Wrap this handler so a panic, either while creating the response
    /// future or while polling it, is turned into the response produced by
    /// `recover` from the panic message.
    pub fn catch_panic<F>(self, recover: F) -> Self
    where
        F: Fn(String) -> Response + Send + Sync + 'static,
    {
        let recover = Arc::new(recover);
        Self(Arc::new(move |req| {
            let recover = recover.clone();
            match catch_unwind(AssertUnwindSafe(|| self.call(req))) {
                Ok(fut) => AssertUnwindSafe(fut)
                    .catch_unwind()
                    .map(move |result| match result {
                        Ok(response) => response,
                        Err(payload) => recover(panic_message(payload)),
                    })
                    .boxed(),
                Err(payload) => future::ready(recover(panic_message(payload))).boxed(),
            }
        }))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

/// A (predicate, fallback handler) pair evaluated at match time.
///
/// When the predicate returns `true` the request is rejected and the fallback
/// becomes the effective handler.
#[derive(Clone)]
pub struct Guard {
    reject: Arc<RejectFn>,
    fallback: Handler,
}

impl Guard {
    pub fn new<F>(reject: F, fallback: Handler) -> Self
    where
        F: Fn(&Request, &Extensions) -> bool + Send + Sync + 'static,
    {
        Self {
            reject: Arc::new(reject),
            fallback,
        }
    }

    /// Evaluate the predicate against a request and its match context.
    pub fn rejects(&self, req: &Request, context: &Extensions) -> bool {
        (self.reject)(req, context)
    }

    pub fn fallback(&self) -> &Handler {
        &self.fallback
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

/// Side-effect only callback run on every match attempt against a route.
/// It may record per-request state in the match context.
#[derive(Clone)]
pub struct Hook(Arc<HookFn>);

impl Hook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Request, &mut Extensions) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn run(&self, req: &Request, context: &mut Extensions) {
        (self.0)(req, context)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook(..)")
    }
}

/// Composable decorator applied to a registered route after its handler and
/// methods are bound.
#[derive(Clone)]
pub struct Transformer(Arc<TransformFn>);

impl Transformer {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut dyn RouteConfigurator) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Apply the decoration to a registered route.
    pub fn transform(&self, route: &mut dyn RouteConfigurator) {
        (self.0)(route)
    }

    /// Bind `handler` as the route's terminal handler.
    pub fn handler(handler: Handler) -> Self {
        Self::from_fn(move |route| route.set_handler(handler.clone()))
    }

    /// Restrict the route to the given methods.
    pub fn methods<I>(methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        let methods: Vec<Method> = methods.into_iter().collect();
        Self::from_fn(move |route| route.set_methods(&methods))
    }

    /// Require every `(name, value)` header pair. An empty value only
    /// requires the header to be present.
    pub fn headers<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: Arc<Vec<(String, String)>> = Arc::new(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        );
        Self::from_fn(move |route| {
            let pairs = pairs.clone();
            route.add_matcher(Arc::new(move |req: &Request, _: &mut RouteMatch| {
                pairs.iter().all(|(name, expected)| {
                    match req.headers().get(name.as_str()) {
                        Some(_) if expected.is_empty() => true,
                        Some(value) => value.to_str().is_ok_and(|value| value == expected.as_str()),
                        None => false,
                    }
                })
            }));
        })
    }

    /// Require the request scheme to be one of `schemes`. Requests carrying an
    /// origin-form URI fall back to `X-Forwarded-Proto`, then to `http`.
    pub fn schemes<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schemes: Arc<Vec<String>> = Arc::new(
            schemes
                .into_iter()
                .map(|scheme| scheme.into().to_ascii_lowercase())
                .collect(),
        );
        Self::from_fn(move |route| {
            let schemes = schemes.clone();
            route.add_matcher(Arc::new(move |req: &Request, _: &mut RouteMatch| {
                let scheme = req
                    .uri()
                    .scheme_str()
                    .or_else(|| {
                        req.headers()
                            .get("x-forwarded-proto")
                            .and_then(|value| value.to_str().ok())
                    })
                    .unwrap_or("http")
                    .to_ascii_lowercase();
                schemes.contains(&scheme)
            }));
        })
    }

    /// Compose transformers left to right, skipping `None` entries.
    pub fn group<I, T>(transformers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<Transformer>>,
    {
        let transformers: Vec<Transformer> =
            transformers.into_iter().filter_map(|t| t.into()).collect();
        Self::from_fn(move |route| {
            for transformer in &transformers {
                transformer.transform(route);
            }
        })
    }

    /// `self` followed by `next`.
    pub fn then(self, next: Transformer) -> Self {
        Self::group([self, next])
    }

    /// Turn the route into a set of alternative endpoints at its own path,
    /// one per transformer. Each alternative inherits the route's conditions
    /// and adds its own. Alternatives are tried in order, and the route's
    /// directly bound handler is no longer served.
    ///
    /// ```
    /// use axum::http::Method;
    /// use routedef::core::{Handler, Transformer, h, sroute};
    ///
    /// let form = Handler::new(|_req| async { "form" });
    /// let accept = Handler::new(|_req| async { "accepted" });
    /// let submit = sroute(
    ///     "/submit",
    ///     Transformer::alternatives([
    ///         Transformer::methods([Method::GET]).then(h(form)),
    ///         Transformer::group([
    ///             Transformer::headers([("X", "123")]),
    ///             Transformer::methods([Method::POST]),
    ///             h(accept),
    ///         ]),
    ///     ]),
    ///     "submit-path",
    ///     [],
    /// );
    /// assert_eq!(submit.len(), 1);
    /// ```
    pub fn alternatives<I>(variants: I) -> Self
    where
        I: IntoIterator<Item = Transformer>,
    {
        let variants: Vec<Transformer> = variants.into_iter().collect();
        Self::from_fn(move |route| {
            for variant in &variants {
                variant.transform(route.add_variant());
            }
        })
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transformer(..)")
    }
}

/// Shorthand for [`Transformer::handler`].
pub fn h(handler: Handler) -> Transformer {
    Transformer::handler(handler)
}

/// Path segment with an optional method constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    pub path: String,
    pub methods: Option<Vec<Method>>,
}

impl RoutePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: None,
        }
    }

    pub fn with_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.methods = Some(methods.into_iter().collect());
        self
    }
}

impl From<&str> for RoutePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for RoutePath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// `path` restricted to `methods`.
pub fn methods<I>(methods: I, path: impl Into<String>) -> RoutePath
where
    I: IntoIterator<Item = Method>,
{
    RoutePath::new(path).with_methods(methods)
}

pub fn get(path: impl Into<String>) -> RoutePath {
    methods([Method::GET], path)
}

pub fn post(path: impl Into<String>) -> RoutePath {
    methods([Method::POST], path)
}

pub fn put(path: impl Into<String>) -> RoutePath {
    methods([Method::PUT], path)
}

pub fn delete(path: impl Into<String>) -> RoutePath {
    methods([Method::DELETE], path)
}

pub fn head(path: impl Into<String>) -> RoutePath {
    methods([Method::HEAD], path)
}

/// What a route does when it matches: a handler, a transformer, or both.
#[derive(Debug, Clone, Default)]
pub struct Action {
    pub handler: Option<Handler>,
    pub transformer: Option<Transformer>,
}

impl From<Handler> for Action {
    fn from(handler: Handler) -> Self {
        Self {
            handler: Some(handler),
            transformer: None,
        }
    }
}

impl From<Transformer> for Action {
    fn from(transformer: Transformer) -> Self {
        Self {
            handler: None,
            transformer: Some(transformer),
        }
    }
}

/// A handler decorated with a group of transformers.
pub fn with<I>(handler: Handler, transformers: I) -> Action
where
    I: IntoIterator<Item = Transformer>,
{
    Action {
        handler: Some(handler),
        transformer: Some(Transformer::group(transformers)),
    }
}

/// Scalar fields of a route tree node.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    /// Segment relative to the parent node
    pub path: String,
    /// `None` matches any method
    pub methods: Option<Vec<Method>>,
    pub handler: Option<Handler>,
    pub transformer: Option<Transformer>,
    pub guards: Vec<Guard>,
    pub hooks: Vec<Hook>,
}

impl Route {
    pub fn new(path: impl Into<RoutePath>, name: impl Into<String>) -> Self {
        let RoutePath { path, methods } = path.into();
        Self {
            name: name.into(),
            path,
            methods,
            handler: None,
            transformer: None,
            guards: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.add_transformer(transformer);
        self
    }

    /// Set handler and/or transformer from an [`Action`].
    pub fn with_action(mut self, action: impl Into<Action>) -> Self {
        let Action {
            handler,
            transformer,
        } = action.into();
        if handler.is_some() {
            self.handler = handler;
        }
        if let Some(transformer) = transformer {
            self.add_transformer(transformer);
        }
        self
    }

    pub fn with_guards(mut self, guards: impl IntoIterator<Item = Guard>) -> Self {
        self.guards.extend(guards);
        self
    }

    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Hook>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Compose `transformer` after the current one and return the result.
    pub fn add_transformer(&mut self, transformer: Transformer) -> Transformer {
        let combined = Transformer::group([self.transformer.take(), Some(transformer)]);
        self.transformer = Some(combined.clone());
        combined
    }
}

/// Deferred request to graft a renamed, re-prefixed copy of a sibling subtree.
#[derive(Debug, Clone)]
pub struct ReRoute {
    /// Name of the sibling whose subtree is copied
    pub destination: String,
    /// Prepended to the copy's root segment
    pub path_prefix: String,
    /// Every copied node is renamed to `"{name_prefix}-{name}"`
    pub name_prefix: String,
    /// Appended to the copy root's guards
    pub extra_guards: Vec<Guard>,
    /// Appended to the copy root's hooks
    pub extra_hooks: Vec<Hook>,
}

impl ReRoute {
    pub fn new(
        destination: impl Into<String>,
        path_prefix: impl Into<String>,
        name_prefix: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            path_prefix: path_prefix.into(),
            name_prefix: name_prefix.into(),
            extra_guards: Vec::new(),
            extra_hooks: Vec::new(),
        }
    }

    pub fn with_guards(mut self, guards: impl IntoIterator<Item = Guard>) -> Self {
        self.extra_guards.extend(guards);
        self
    }

    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Hook>) -> Self {
        self.extra_hooks.extend(hooks);
        self
    }
}

/// One entry of a child list before alias expansion.
#[derive(Debug, Clone)]
pub enum Subroute {
    Route(RouteTree),
    ReRoute(ReRoute),
}

impl From<RouteTree> for Subroute {
    fn from(tree: RouteTree) -> Self {
        Subroute::Route(tree)
    }
}

impl From<ReRoute> for Subroute {
    fn from(reroute: ReRoute) -> Self {
        Subroute::ReRoute(reroute)
    }
}

/// Alias entry for a child list.
pub fn reroute(
    destination: impl Into<String>,
    path_prefix: impl Into<String>,
    name_prefix: impl Into<String>,
    guards: impl IntoIterator<Item = Guard>,
    hooks: impl IntoIterator<Item = Hook>,
) -> Subroute {
    ReRoute::new(destination, path_prefix, name_prefix)
        .with_guards(guards)
        .with_hooks(hooks)
        .into()
}

/// Comma separated method list, or `ANY` when unconstrained.
pub fn methods_label(methods: Option<&[Method]>) -> String {
    match methods {
        None => "ANY".to_string(),
        Some(methods) => methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(","),
    }
}
