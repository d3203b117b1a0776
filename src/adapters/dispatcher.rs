//! Request dispatch over a compiled [`MatchitEngine`](super::MatchitEngine).
use std::{collections::HashMap, sync::Arc};

use axum::{
    Router,
    extract::Request,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use http::Extensions;

use crate::{
    adapters::matchit_engine::fill_template,
    core::route::Handler,
    ports::route_engine::{EngineError, EngineResult, Matcher, ReverseLookup, RouteMatch},
};

/// Path parameters captured by the matched template, in template order.
/// Values are percent-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(Vec<(String, String)>);

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Name of the endpoint that served the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(pub String);

/// An endpoint flattened with the conditions of every enclosing route.
pub(crate) struct CompiledRoute {
    pub(crate) name: String,
    pub(crate) pattern: String,
    /// Outermost route's matchers first
    pub(crate) matchers: Vec<Matcher>,
    /// Every method constraint along the chain; all must hold
    pub(crate) methods: Vec<Vec<Method>>,
    pub(crate) handler: Option<Handler>,
}

impl CompiledRoute {
    fn allows(&self, method: &Method) -> bool {
        self.methods.iter().all(|allowed| allowed.contains(method))
    }
}

/// Compiled, immutable routing table.
pub struct Dispatcher {
    router: matchit::Router<usize>,
    groups: Vec<Vec<CompiledRoute>>,
    names: HashMap<String, String>,
    strict_slash: bool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("names", &self.names)
            .field("strict_slash", &self.strict_slash)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub(crate) fn new(
        router: matchit::Router<usize>,
        groups: Vec<Vec<CompiledRoute>>,
        names: HashMap<String, String>,
        strict_slash: bool,
    ) -> Self {
        Self {
            router,
            groups,
            names,
            strict_slash,
        }
    }

    /// Number of endpoints, including anonymous ones.
    pub fn endpoint_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    /// Route `req` and run the effective handler.
    ///
    /// Endpoints sharing the request's template are tried in registration
    /// order. An endpoint is skipped when one of its matchers rejects, when a
    /// method constraint fails, or when it ends up without a handler. Answers
    /// `405` if only method constraints failed and `404` otherwise.
    pub async fn dispatch(&self, req: Request) -> Response {
        match self.resolve(req) {
            Ok((handler, req)) => handler.call(req).await,
            Err(status) => status.into_response(),
        }
    }

    fn resolve(&self, mut req: Request) -> Result<(Handler, Request), StatusCode> {
        let path = req.uri().path().to_string();
        let Some((group, params)) = self.lookup(&path) else {
            tracing::debug!("no route for {} {}", req.method(), path);
            return Err(StatusCode::NOT_FOUND);
        };

        let mut method_mismatch = false;
        for candidate in &self.groups[group] {
            let mut attempt = RouteMatch::new(Extensions::new());
            attempt.context_mut().insert(params.clone());

            if !candidate.matchers.iter().all(|matcher| matcher(&req, &mut attempt)) {
                continue;
            }
            if !candidate.allows(req.method()) {
                method_mismatch = true;
                continue;
            }

            let (context, substitute) = attempt.into_parts();
            let substituted = substitute.is_some();
            let Some(handler) = substitute.or_else(|| candidate.handler.clone()) else {
                continue;
            };

            tracing::debug!(
                "{} {} matched '{}' ({}){}",
                req.method(),
                path,
                candidate.name,
                candidate.pattern,
                if substituted { " via guard fallback" } else { "" }
            );
            req.extensions_mut().extend(context);
            req.extensions_mut()
                .insert(MatchedRoute(candidate.name.clone()));
            return Ok((handler, req));
        }

        if method_mismatch {
            Err(StatusCode::METHOD_NOT_ALLOWED)
        } else {
            Err(StatusCode::NOT_FOUND)
        }
    }

    fn lookup(&self, path: &str) -> Option<(usize, RouteParams)> {
        let matched = match self.router.at(path) {
            Ok(matched) => matched,
            Err(_) if self.strict_slash && path.len() > 1 && path.ends_with('/') => {
                self.router.at(path.trim_end_matches('/')).ok()?
            }
            Err(_) => return None,
        };
        let params = matched
            .params
            .iter()
            .map(|(key, value)| (key.to_string(), decode_param(value)))
            .collect();
        Some((*matched.value, RouteParams(params)))
    }

    /// Serve every request through this dispatcher.
    pub fn into_router(self) -> Router {
        let dispatcher = Arc::new(self);
        Router::new().fallback(move |req: Request| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(req).await }
        })
    }
}

/// Percent-decode a captured value. Values that do not decode to UTF-8 are
/// kept as sent.
fn decode_param(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

impl ReverseLookup for Dispatcher {
    fn url(&self, name: &str, params: &[&str]) -> EngineResult<String> {
        let pattern = self
            .names
            .get(name)
            .ok_or_else(|| EngineError::UnknownRoute(name.to_string()))?;
        fill_template(name, pattern, params)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;

    use super::*;
    use crate::{
        core::{
            route::{Guard, Handler, Hook, Transformer, get, h, post, with},
            tree::{route, sroute},
        },
        ports::route_engine::RouteEngine,
    };

    #[derive(Debug, Clone)]
    struct Visited;

    fn text(label: &'static str) -> Handler {
        Handler::new(move |_req| async move { label })
    }

    fn request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_methods_and_headers() {
        let tree = sroute(
            "/",
            text("home"),
            "home",
            [
                sroute(get("/submit"), text("form"), "submit-get", []).into(),
                sroute(
                    post("/submit"),
                    with(text("accepted"), [Transformer::headers([("X", "123")])]),
                    "submit-post",
                    [],
                )
                .into(),
            ],
        );
        let dispatcher = tree.build_new_router().unwrap();

        let response = dispatcher.dispatch(request(Method::GET, "/submit")).await;
        assert_eq!(body(response).await, "form");

        // The GET variant only fails on method, the POST variant on the header
        let response = dispatcher.dispatch(request(Method::POST, "/submit")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let mut req = request(Method::POST, "/submit");
        req.headers_mut().insert("X", "123".parse().unwrap());
        assert_eq!(body(dispatcher.dispatch(req).await).await, "accepted");

        let response = dispatcher.dispatch(request(Method::PUT, "/submit")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = dispatcher.dispatch(request(Method::GET, "/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transformer_constraints() {
        let tree = sroute(
            "/",
            text("home"),
            "home",
            [
                sroute(
                    "/secure",
                    h(text("secure")).then(Transformer::schemes(["https"])),
                    "secure",
                    [],
                )
                .into(),
                sroute(
                    "/upload",
                    Transformer::group([
                        Some(Transformer::methods([Method::PUT])),
                        None,
                        Some(h(text("uploaded"))),
                    ]),
                    "upload",
                    [],
                )
                .into(),
            ],
        );
        let dispatcher = tree.build_new_router().unwrap();

        let response = dispatcher.dispatch(request(Method::GET, "/secure")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut req = request(Method::GET, "/secure");
        req.headers_mut()
            .insert("x-forwarded-proto", "HTTPS".parse().unwrap());
        assert_eq!(body(dispatcher.dispatch(req).await).await, "secure");

        let response = dispatcher.dispatch(request(Method::PUT, "/upload")).await;
        assert_eq!(body(response).await, "uploaded");
        let response = dispatcher.dispatch(request(Method::GET, "/upload")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_nested_index_and_strict_slash() {
        let tree = sroute(
            "/",
            text("home"),
            "home",
            [sroute("/a", text("a"), "a", [sroute("/b", text("b"), "b", []).into()]).into()],
        );
        let dispatcher = tree.build_new_router().unwrap();

        assert_eq!(body(dispatcher.dispatch(request(Method::GET, "/")).await).await, "home");
        assert_eq!(body(dispatcher.dispatch(request(Method::GET, "/a")).await).await, "a");
        assert_eq!(body(dispatcher.dispatch(request(Method::GET, "/a/")).await).await, "a");
        assert_eq!(body(dispatcher.dispatch(request(Method::GET, "/a/b")).await).await, "b");
    }

    #[tokio::test]
    async fn test_ancestor_guard_substitutes_handler() {
        let tree = sroute(
            "/",
            text("home"),
            "home",
            [route(
                "/a",
                text("a"),
                "a",
                [Hook::new(|_, _| {})],
                [Guard::new(|_, _| true, text("denied"))],
                [sroute("/b", text("b"), "b", []).into()],
            )
            .into()],
        );
        let dispatcher = tree.build_new_router().unwrap();

        assert_eq!(body(dispatcher.dispatch(request(Method::GET, "/a")).await).await, "denied");
        assert_eq!(body(dispatcher.dispatch(request(Method::GET, "/a/b")).await).await, "denied");
        assert_eq!(body(dispatcher.dispatch(request(Method::GET, "/")).await).await, "home");
    }

    #[tokio::test]
    async fn test_params_and_matched_route_are_exposed() {
        let show = Handler::new(|req: Request| async move {
            let id = req
                .extensions()
                .get::<RouteParams>()
                .and_then(|params| params.get("id"))
                .unwrap_or("-")
                .to_string();
            let name = req
                .extensions()
                .get::<MatchedRoute>()
                .map(|m| m.0.clone())
                .unwrap_or_default();
            format!("{name}:{id}")
        });
        let tree = sroute("/", text("home"), "home", [sroute("/users/{id}", show, "user", []).into()]);
        let dispatcher = tree.build_new_router().unwrap();

        let response = dispatcher.dispatch(request(Method::GET, "/users/9")).await;
        assert_eq!(body(response).await, "user:9");
        assert_eq!(dispatcher.url("user", &["10"]).unwrap(), "/users/10");
        assert!(dispatcher.url("missing", &[]).is_err());
    }

    #[tokio::test]
    async fn test_alternatives_share_one_route() {
        let tree = sroute(
            "/",
            text("home"),
            "home",
            [sroute(
                "/submit",
                Transformer::alternatives([
                    Transformer::methods([Method::GET]).then(h(text("form"))),
                    Transformer::group([
                        Transformer::headers([("X", "123")]),
                        Transformer::methods([Method::POST]),
                        h(text("accepted")),
                    ]),
                ]),
                "submit-path",
                [],
            )
            .into()],
        );
        assert_eq!(tree.len(), 2);
        let dispatcher = tree.build_new_router().unwrap();
        assert_eq!(dispatcher.url("submit-path", &[]).unwrap(), "/submit");

        let response = dispatcher.dispatch(request(Method::GET, "/submit")).await;
        assert_eq!(body(response).await, "form");

        let response = dispatcher.dispatch(request(Method::POST, "/submit")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let mut req = request(Method::POST, "/submit");
        req.headers_mut().insert("X", "123".parse().unwrap());
        assert_eq!(body(dispatcher.dispatch(req).await).await, "accepted");
    }

    #[tokio::test]
    async fn test_alternatives_inherit_route_conditions() {
        let tree = sroute(
            "/",
            text("home"),
            "home",
            [sroute(
                get("/only-get"),
                Transformer::alternatives([
                    Transformer::headers([("X", "1")]).then(h(text("one"))),
                    h(text("other")),
                ]),
                "only-get",
                [],
            )
            .into()],
        );
        let engine = tree.build_engine().unwrap();
        // Root, its anonymous index and the variant holder
        assert_eq!(engine.route_count(), 3);
        let dispatcher = engine.into_dispatcher().unwrap();
        assert_eq!(dispatcher.endpoint_count(), 3);

        let mut req = request(Method::GET, "/only-get");
        req.headers_mut().insert("X", "1".parse().unwrap());
        assert_eq!(body(dispatcher.dispatch(req).await).await, "one");
        assert_eq!(
            body(dispatcher.dispatch(request(Method::GET, "/only-get")).await).await,
            "other"
        );
        let response = dispatcher.dispatch(request(Method::POST, "/only-get")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_params_round_trip_through_reverse_lookup() {
        let echo = Handler::new(|req: Request| async move {
            req.extensions()
                .get::<RouteParams>()
                .and_then(|params| params.get("id"))
                .unwrap_or("-")
                .to_string()
        });
        let tree = sroute("/", text("home"), "home", [sroute("/users/{id}", echo, "user", []).into()]);
        let dispatcher = tree.build_new_router().unwrap();

        let url = dispatcher.url("user", &["a b/c"]).unwrap();
        assert_eq!(url, "/users/a%20b%2Fc");
        let response = dispatcher.dispatch(request(Method::GET, &url)).await;
        assert_eq!(body(response).await, "a b/c");

        // Invalid UTF-8 after decoding is passed through as sent
        let response = dispatcher.dispatch(request(Method::GET, "/users/%FF")).await;
        assert_eq!(body(response).await, "%FF");
    }

    #[tokio::test]
    async fn test_hooks_run_when_guard_rejects() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let visit = Hook::new(move |_, context| {
            counter.fetch_add(1, Ordering::SeqCst);
            context.insert(Visited);
        });
        let denied = Handler::new(|req: Request| async move {
            if req.extensions().get::<Visited>().is_some() {
                (StatusCode::FORBIDDEN, "denied after hook")
            } else {
                (StatusCode::FORBIDDEN, "denied")
            }
        });

        let tree = sroute(
            "/",
            text("home"),
            "home",
            [route(
                "/a",
                text("a"),
                "a",
                [visit],
                [Guard::new(|_, _| true, denied)],
                [],
            )
            .into()],
        );
        let dispatcher = tree.build_new_router().unwrap();

        let response = dispatcher.dispatch(request(Method::GET, "/a")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body(response).await, "denied after hook");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transformer_handler_on_scope_route_is_not_served() {
        let tree = sroute(
            "/",
            text("home"),
            "home",
            [sroute("/a", h(text("a")), "a", [sroute("/b", text("b"), "b", []).into()]).into()],
        );
        let mut engine = tree.build_engine().unwrap();
        let a = engine.get("a").unwrap();
        assert!(engine.configure(a).unwrap().handler().is_some());

        let dispatcher = engine.into_dispatcher().unwrap();
        assert_eq!(body(dispatcher.dispatch(request(Method::GET, "/a/b")).await).await, "b");
        let response = dispatcher.dispatch(request(Method::GET, "/a")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
