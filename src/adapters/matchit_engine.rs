//! `matchit` backed implementation of the [`RouteEngine`] port.
//!
//! Registration is hierarchical: every route belongs to a scope, and a scope
//! is opened by a route. When the engine is compiled each endpoint (a route
//! that did not open a scope) is flattened into the chain of routes leading
//! to it, so matching one endpoint evaluates the conditions of every enclosing
//! route first, outermost first. Endpoints are indexed by their full path
//! template in a `matchit` radix tree; several endpoints may share one
//! template (e.g. a GET and a POST variant) and are tried in registration
//! order. A route decorated with variants contributes one endpoint per
//! variant instead of itself.
use std::collections::HashMap;

use axum::http::Method;

use crate::{
    adapters::dispatcher::{CompiledRoute, Dispatcher},
    core::{
        builder::build_router,
        path::join_paths,
        report::{UrlFn, UrlMode, create_url_fn},
        route::Handler,
        tree::RouteTree,
    },
    ports::route_engine::{
        EngineError, EngineResult, Matcher, ReverseLookup, RouteConfigurator, RouteEngine,
    },
};

/// Scope handle issued by [`MatchitEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

/// Route handle issued by [`MatchitEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteId(usize);

#[derive(Debug)]
struct ScopeRecord {
    prefix: String,
    /// Routes whose conditions guard this scope, outermost first
    chain: Vec<RouteId>,
}

/// Decoration of a registered route or of one of its variants.
#[derive(Default)]
struct Target {
    name: String,
    matchers: Vec<Matcher>,
    methods: Option<Vec<Method>>,
    handler: Option<Handler>,
    variants: Vec<Target>,
}

impl Target {
    /// Collect the endpoints this target contributes, each with the
    /// conditions inherited from `matchers` and `methods`.
    fn endpoints(
        &self,
        mut matchers: Vec<Matcher>,
        mut methods: Vec<Vec<Method>>,
        include_self: bool,
        out: &mut Vec<(Vec<Matcher>, Vec<Vec<Method>>, Option<Handler>)>,
    ) {
        matchers.extend(self.matchers.iter().cloned());
        methods.extend(self.methods.clone());

        if self.variants.is_empty() {
            if include_self {
                out.push((matchers, methods, self.handler.clone()));
            }
            return;
        }
        for variant in &self.variants {
            variant.endpoints(matchers.clone(), methods.clone(), true, out);
        }
    }
}

impl RouteConfigurator for Target {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_handler(&mut self, handler: Handler) {
        self.handler = Some(handler);
    }

    fn set_methods(&mut self, methods: &[Method]) {
        self.methods = Some(methods.to_vec());
    }

    fn add_matcher(&mut self, matcher: Matcher) {
        self.matchers.push(matcher);
    }

    fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    fn add_variant(&mut self) -> &mut dyn RouteConfigurator {
        self.variants.push(Target {
            name: self.name.clone(),
            ..Target::default()
        });
        let last = self.variants.len() - 1;
        &mut self.variants[last]
    }
}

/// A registered route and everything attached to it so far.
pub struct EngineRoute {
    pattern: String,
    scope: ScopeId,
    target: Target,
    nested: Option<ScopeId>,
}

impl EngineRoute {
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Full path template
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_endpoint(&self) -> bool {
        self.nested.is_none()
    }

    /// Number of alternative endpoints registered at this route's template.
    pub fn variant_count(&self) -> usize {
        self.target.variants.len()
    }
}

/// Route registry compiled into a [`Dispatcher`].
pub struct MatchitEngine {
    routes: Vec<EngineRoute>,
    scopes: Vec<ScopeRecord>,
    names: HashMap<String, RouteId>,
    strict_slash: bool,
}

impl Default for MatchitEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchitEngine {
    /// Empty engine with strict slash handling enabled.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            scopes: vec![ScopeRecord {
                prefix: String::new(),
                chain: Vec::new(),
            }],
            names: HashMap::new(),
            strict_slash: true,
        }
    }

    /// When enabled, `/a/` matches the endpoint registered for `/a`.
    pub fn with_strict_slash(mut self, strict_slash: bool) -> Self {
        self.strict_slash = strict_slash;
        self
    }

    /// Handle of the route registered under `name`.
    pub fn get(&self, name: &str) -> Option<RouteId> {
        self.names.get(name).copied()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    fn scope_record(&self, scope: ScopeId) -> EngineResult<&ScopeRecord> {
        self.scopes
            .get(scope.0)
            .ok_or(EngineError::UnknownHandle(scope.0))
    }

    fn push_route(&mut self, scope: ScopeId, path: &str, name: &str) -> EngineResult<RouteId> {
        let record = self.scope_record(scope)?;
        let pattern = absolute(join_paths([record.prefix.as_str(), path]));
        let id = RouteId(self.routes.len());

        if !name.is_empty() {
            match self.names.get(name) {
                Some(existing) => tracing::warn!(
                    "duplicate route name '{}' at '{}'; keeping '{}'",
                    name,
                    pattern,
                    self.routes[existing.0].pattern
                ),
                None => {
                    self.names.insert(name.to_string(), id);
                }
            }
        }

        self.routes.push(EngineRoute {
            pattern,
            scope,
            target: Target {
                name: name.to_string(),
                ..Target::default()
            },
            nested: None,
        });
        Ok(id)
    }

    /// Flatten every endpoint and index it by template.
    pub fn into_dispatcher(self) -> EngineResult<Dispatcher> {
        let mut router = matchit::Router::new();
        let mut groups: Vec<Vec<CompiledRoute>> = Vec::new();
        let mut group_of: HashMap<String, usize> = HashMap::new();

        for (index, route) in self.routes.iter().enumerate() {
            let ancestors = &self.scopes[route.scope.0].chain;

            // Anonymous index endpoints report the route that opened their scope
            let name = ancestors
                .iter()
                .chain([&RouteId(index)])
                .rev()
                .map(|id| self.routes[id.0].name())
                .find(|name| !name.is_empty())
                .unwrap_or_default()
                .to_string();

            let mut endpoints = Vec::new();
            route.target.endpoints(
                ancestors
                    .iter()
                    .flat_map(|id| self.routes[id.0].target.matchers.iter().cloned())
                    .collect(),
                ancestors
                    .iter()
                    .filter_map(|id| self.routes[id.0].target.methods.clone())
                    .collect(),
                route.is_endpoint(),
                &mut endpoints,
            );

            for (matchers, methods, handler) in endpoints {
                let compiled = CompiledRoute {
                    name: name.clone(),
                    pattern: route.pattern.clone(),
                    matchers,
                    methods,
                    handler,
                };

                match group_of.get(&route.pattern) {
                    Some(&group) => groups[group].push(compiled),
                    None => {
                        let group = groups.len();
                        router
                            .insert(route.pattern.clone(), group)
                            .map_err(|e| EngineError::Conflict {
                                pattern: route.pattern.clone(),
                                reason: e.to_string(),
                            })?;
                        group_of.insert(route.pattern.clone(), group);
                        groups.push(vec![compiled]);
                    }
                }
            }
        }

        let names = self
            .names
            .iter()
            .map(|(name, id)| (name.clone(), self.routes[id.0].pattern.clone()))
            .collect();

        tracing::debug!(
            "compiled {} route(s) into {} template(s)",
            self.routes.len(),
            groups.len()
        );
        Ok(Dispatcher::new(router, groups, names, self.strict_slash))
    }
}

impl ReverseLookup for MatchitEngine {
    fn url(&self, name: &str, params: &[&str]) -> EngineResult<String> {
        let id = self
            .get(name)
            .ok_or_else(|| EngineError::UnknownRoute(name.to_string()))?;
        fill_template(name, &self.routes[id.0].pattern, params)
    }
}

impl RouteEngine for MatchitEngine {
    type Scope = ScopeId;
    type Route = RouteId;

    fn root_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    fn route(&mut self, scope: &ScopeId, path: &str, name: &str) -> EngineResult<RouteId> {
        self.push_route(*scope, path, name)
    }

    fn configure(&mut self, route: RouteId) -> EngineResult<&mut dyn RouteConfigurator> {
        self.routes
            .get_mut(route.0)
            .map(|route| &mut route.target as &mut dyn RouteConfigurator)
            .ok_or(EngineError::UnknownHandle(route.0))
    }

    fn subscope(&mut self, route: RouteId) -> EngineResult<ScopeId> {
        let record = self
            .routes
            .get(route.0)
            .ok_or(EngineError::UnknownHandle(route.0))?;
        if let Some(scope) = record.nested {
            return Ok(scope);
        }

        let prefix = record.pattern.clone();
        let mut chain = self.scope_record(record.scope)?.chain.clone();
        chain.push(route);
        let scope = ScopeId(self.scopes.len());
        self.scopes.push(ScopeRecord { prefix, chain });
        self.routes[route.0].nested = Some(scope);
        Ok(scope)
    }

    fn handle(&mut self, scope: &ScopeId, path: &str, handler: Handler) -> EngineResult<RouteId> {
        let id = self.push_route(*scope, path, "")?;
        self.routes[id.0].target.handler = Some(handler);
        Ok(id)
    }
}

fn absolute(pattern: String) -> String {
    if pattern.starts_with('/') {
        pattern
    } else {
        format!("/{pattern}")
    }
}

/// Substitute `params` positionally into the `{name}` / `{*name}`
/// placeholders of `pattern`. Plain parameters are percent-encoded; catch-all
/// values are inserted verbatim since they may span segments.
pub fn fill_template(route: &str, pattern: &str, params: &[&str]) -> EngineResult<String> {
    let mut url = String::with_capacity(pattern.len());
    let mut values = params.iter();
    let mut chars = pattern.chars();
    let mut used = 0;

    while let Some(ch) = chars.next() {
        if ch != '{' {
            url.push(ch);
            continue;
        }

        let placeholder: String = chars.by_ref().take_while(|&c| c != '}').collect();
        let (catch_all, param) = match placeholder.strip_prefix('*') {
            Some(param) => (true, param),
            None => (false, placeholder.as_str()),
        };
        let value = values.next().ok_or_else(|| EngineError::MissingParameter {
            route: route.to_string(),
            param: param.to_string(),
        })?;
        used += 1;

        if catch_all {
            url.push_str(value.trim_start_matches('/'));
        } else {
            url.push_str(&urlencoding::encode(value));
        }
    }

    if used < params.len() {
        return Err(EngineError::ExtraParameter {
            route: route.to_string(),
            expected: used,
            given: params.len(),
        });
    }
    Ok(url)
}

impl RouteTree {
    /// Register this tree in a fresh [`MatchitEngine`] and compile it.
    pub fn build_new_router(&self) -> EngineResult<Dispatcher> {
        self.build_engine()?.into_dispatcher()
    }

    /// Like [`build_new_router`](Self::build_new_router) with explicit
    /// trailing slash handling.
    pub fn build_new_router_with(&self, strict_slash: bool) -> EngineResult<Dispatcher> {
        let mut engine = MatchitEngine::new().with_strict_slash(strict_slash);
        let root = engine.root_scope();
        build_router(self, &mut engine, &root)?;
        engine.into_dispatcher()
    }

    /// Register this tree in a fresh [`MatchitEngine`] without compiling it.
    pub fn build_engine(&self) -> EngineResult<MatchitEngine> {
        let mut engine = MatchitEngine::new();
        let root = engine.root_scope();
        build_router(self, &mut engine, &root)?;
        Ok(engine)
    }

    /// Reverse lookup over this tree's routes.
    pub fn create_url_fn(&self, mode: UrlMode) -> EngineResult<UrlFn> {
        Ok(create_url_fn(self.build_engine()?, mode))
    }
}
