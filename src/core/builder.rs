//! Registration of a finished route tree against a [`RouteEngine`].
//!
//! The walk is pre-order: a node is registered before its children, and its
//! children are registered inside the nested scope the node opens. Everything
//! a node installs (hooks, guards, method constraints, transformer matchers)
//! therefore applies to every route reached through that scope.
use std::sync::Arc;

use axum::extract::Request;

use crate::{
    core::{
        route::{Guard, Hook},
        tree::{NodeRef, RouteTree},
    },
    ports::route_engine::{EngineResult, Matcher, RouteEngine, RouteMatch},
    tracing_setup::create_build_span,
};

/// Register `tree` in `scope` and return the scope.
pub fn build_router<E>(tree: &RouteTree, engine: &mut E, scope: &E::Scope) -> EngineResult<E::Scope>
where
    E: RouteEngine,
{
    let span = create_build_span(tree.name(), tree.len());
    let _enter = span.enter();

    build_node(tree.root(), engine, scope)?;
    Ok(scope.clone())
}

fn build_node<E>(node: NodeRef<'_>, engine: &mut E, scope: &E::Scope) -> EngineResult<()>
where
    E: RouteEngine,
{
    let route = node.route();
    let id = engine.route(scope, &route.path, &route.name)?;
    tracing::debug!("registered '{}' at '{}' in {:?}", route.name, route.path, scope);

    let target = engine.configure(id)?;
    for hook in &route.hooks {
        target.add_matcher(hook_matcher(hook.clone()));
    }
    if !route.guards.is_empty() {
        target.add_matcher(guard_matcher(route.guards.clone()));
    }
    if let Some(handler) = &route.handler {
        target.set_handler(handler.clone());
    }
    if let Some(methods) = &route.methods {
        target.set_methods(methods);
    }
    if let Some(transformer) = &route.transformer {
        transformer.transform(target);
    }
    let bound_by_transformer = route.handler.is_none() && target.handler().is_some();

    if node.has_children() {
        if bound_by_transformer {
            tracing::debug!(
                "'{}' opens a scope; its transformer-bound handler is not served at '{}'",
                route.name,
                route.path
            );
        }
        let nested = engine.subscope(id)?;
        // A node with subroutes stays reachable at its own path
        if let Some(handler) = &route.handler {
            engine.handle(&nested, "/", handler.clone())?;
        }
        for child in node.children() {
            build_node(child, engine, &nested)?;
        }
    }
    Ok(())
}

/// Matcher running `hook` and always accepting.
pub fn hook_matcher(hook: Hook) -> Matcher {
    Arc::new(move |req: &Request, m: &mut RouteMatch| {
        hook.run(req, m.context_mut());
        true
    })
}

/// Matcher evaluating `guards` left to right. The first rejecting guard
/// substitutes its fallback and ends the evaluation. Once any earlier matcher
/// of the same attempt has substituted a handler, no guard is evaluated.
pub fn guard_matcher(guards: Vec<Guard>) -> Matcher {
    Arc::new(move |req: &Request, m: &mut RouteMatch| {
        if m.is_substituted() {
            return true;
        }
        if let Some(guard) = guards.iter().find(|guard| guard.rejects(req, m.context())) {
            m.substitute(guard.fallback().clone());
        }
        true
    })
}
