//! Alias (re-route) expansion.
//!
//! A child list may mix finished subtrees with [`ReRoute`] placeholders. Each
//! placeholder is replaced, in place, by a renamed and re-prefixed deep copy of
//! the sibling subtree it names. Placeholders only see concrete siblings of the
//! same list, so aliases of aliases are never resolved.
use crate::core::{
    path::join_paths,
    route::{ReRoute, Subroute},
    tree::RouteTree,
};

/// Resolve every placeholder of `items` against its concrete siblings.
///
/// Placeholders whose destination is missing are logged and dropped; the rest
/// of the list is unaffected.
pub fn expand_aliases(items: Vec<Subroute>) -> Vec<RouteTree> {
    let aliases: Vec<Option<RouteTree>> = items
        .iter()
        .map(|item| match item {
            Subroute::Route(_) => None,
            Subroute::ReRoute(reroute) => resolve(reroute, &items),
        })
        .collect();

    items
        .into_iter()
        .zip(aliases)
        .filter_map(|(item, alias)| match item {
            Subroute::Route(tree) => Some(tree),
            Subroute::ReRoute(_) => alias,
        })
        .collect()
}

fn resolve(reroute: &ReRoute, siblings: &[Subroute]) -> Option<RouteTree> {
    let Some(destination) = siblings.iter().find_map(|item| match item {
        Subroute::Route(tree) if tree.name() == reroute.destination => Some(tree),
        _ => None,
    }) else {
        tracing::warn!(
            "route not found: '{}' (an alias must be at the same level as its destination)",
            reroute.destination
        );
        return None;
    };

    Some(alias_of(destination, reroute))
}

/// Copy `destination` under the alias' path and name prefixes.
pub fn alias_of(destination: &RouteTree, reroute: &ReRoute) -> RouteTree {
    let mut alias = destination.map(|mut route| {
        route.name = format!("{}-{}", reroute.name_prefix, route.name);
        route
    });

    let root = alias.root_mut();
    root.path = join_paths([reroute.path_prefix.as_str(), root.path.as_str()]);
    root.guards.extend(reroute.extra_guards.iter().cloned());
    root.hooks.extend(reroute.extra_hooks.iter().cloned());

    tracing::debug!(
        "aliased '{}' as '{}' at '{}'",
        reroute.destination,
        root.name,
        root.path
    );
    alias
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        route::{Guard, Handler, Hook, reroute},
        tree::{route, sroute},
    };

    fn ok() -> Handler {
        Handler::new(|_req| async { "ok" })
    }

    fn deny() -> Guard {
        Guard::new(|_, _| true, Handler::new(|_req| async { "denied" }))
    }

    #[test]
    fn test_alias_is_grafted_in_place() {
        let parent = sroute(
            "/parent",
            ok(),
            "parent",
            [
                sroute("/x", ok(), "x", [sroute("/y", ok(), "y", []).into()]).into(),
                reroute("x", "/p", "q", [], []),
                sroute("/z", ok(), "z", []).into(),
            ],
        );

        let names: Vec<&str> = parent.root().children().map(|c| c.name()).collect();
        assert_eq!(names, ["x", "q-x", "z"]);

        let alias = parent.search("q-x").unwrap();
        assert_eq!(alias.full_path(), "/parent/p/x");
        assert_eq!(parent.search("q-y").unwrap().full_path(), "/parent/p/x/y");

        let original = parent.search("x").unwrap();
        assert_eq!(original.full_path(), "/parent/x");
        assert_eq!(parent.search("y").unwrap().full_path(), "/parent/x/y");
    }

    #[test]
    fn test_missing_destination_is_dropped() {
        let parent = sroute(
            "/",
            ok(),
            "root",
            [
                reroute("nope", "/p", "q", [], []),
                sroute("/x", ok(), "x", []).into(),
            ],
        );
        let names: Vec<&str> = parent.root().children().map(|c| c.name()).collect();
        assert_eq!(names, ["x"]);
    }

    #[test]
    fn test_destination_must_be_a_sibling() {
        let inner = sroute("/x", ok(), "x", [sroute("/deep", ok(), "deep", []).into()]);
        let parent = sroute(
            "/",
            ok(),
            "root",
            [inner.into(), reroute("deep", "/p", "q", [], [])],
        );
        assert!(parent.search("q-deep").is_none());
        assert_eq!(parent.len(), 3);
    }

    #[test]
    fn test_placeholders_are_not_transitive() {
        let parent = sroute(
            "/",
            ok(),
            "root",
            [
                sroute("/x", ok(), "x", []).into(),
                reroute("x", "/p", "q", [], []),
                reroute("q-x", "/r", "s", [], []),
            ],
        );
        assert!(parent.search("q-x").is_some());
        assert!(parent.search("s-q-x").is_none());
    }

    #[test]
    fn test_extra_guards_and_hooks_are_appended() {
        let parent = sroute(
            "/",
            ok(),
            "root",
            [
                route("/x", ok(), "x", [Hook::new(|_, _| {})], [deny()], []).into(),
                reroute("x", "/admin", "admin", [deny(), deny()], [Hook::new(|_, _| {})]),
            ],
        );

        let original = parent.search("x").unwrap().route();
        assert_eq!(original.guards.len(), 1);
        assert_eq!(original.hooks.len(), 1);

        let alias = parent.search("admin-x").unwrap().route();
        assert_eq!(alias.guards.len(), 3);
        assert_eq!(alias.hooks.len(), 2);
    }

    #[test]
    fn test_alias_of_root_segment() {
        let destination = sroute("/", ok(), "home", []);
        let alias = alias_of(&destination, &ReRoute::new("home", "/mirror", "m"));
        assert_eq!(alias.root().path(), "/mirror");
        assert_eq!(alias.name(), "m-home");
    }
}
