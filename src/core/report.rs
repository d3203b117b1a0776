//! Diagnostics for a resolved route tree: a `{name, path, methods}` table, its
//! column-aligned rendering, and name based reverse lookup.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    core::{route::methods_label, tree::RouteTree},
    ports::route_engine::{EngineResult, ReverseLookup},
};

const MIN_NAME_WIDTH: usize = 15;

/// One row of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    /// Full path of the node
    pub path: String,
    /// Comma separated methods, or `ANY`
    pub methods: String,
}

impl Entry {
    pub fn new(name: impl Into<String>, path: impl Into<String>, methods: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            methods: methods.into(),
        }
    }
}

impl RouteTree {
    /// One entry per node, in pre-order.
    pub fn table(&self) -> Vec<Entry> {
        let mut table = Vec::with_capacity(self.len());
        self.iter(|node| {
            table.push(Entry::new(
                node.name(),
                node.full_path(),
                methods_label(node.methods()),
            ));
        });
        table
    }

    /// Write the rendered table to stdout.
    pub fn print(&self) {
        println!("{self}");
    }
}

impl fmt::Display for RouteTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_table(&self.table()))
    }
}

/// Render entries as aligned `name  path  methods` lines.
pub fn render_table(entries: &[Entry]) -> String {
    let name_width = entries
        .iter()
        .map(|entry| entry.name.len())
        .max()
        .unwrap_or(0)
        .max(MIN_NAME_WIDTH);
    let path_width = entries
        .iter()
        .map(|entry| entry.path.len())
        .max()
        .unwrap_or(0);

    entries
        .iter()
        .map(|entry| {
            format!(
                "{:<name_width$}  {:<path_width$}  {}",
                entry.name, entry.path, entry.methods
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// How a [`UrlFn`] reports unknown routes or bad parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlMode {
    /// Propagate the lookup error
    #[default]
    ReturnError,
    /// Return the query-escaped text `(<error>)` in place of the URL
    EmbedError,
}

/// Reverse lookup closure: route name and positional parameters to a path.
pub type UrlFn = Box<dyn Fn(&str, &[&str]) -> EngineResult<String> + Send + Sync>;

/// Wrap a reverse lookup in a [`UrlFn`] honouring `mode`.
pub fn create_url_fn<L>(lookup: L, mode: UrlMode) -> UrlFn
where
    L: ReverseLookup + Send + Sync + 'static,
{
    Box::new(move |name, params| match lookup.url(name, params) {
        Ok(url) => Ok(url),
        Err(err) if mode == UrlMode::EmbedError => {
            tracing::debug!("embedding url error for '{}': {}", name, err);
            Ok(query_escape(&format!("({err})")))
        }
        Err(err) => Err(err),
    })
}

/// Escape `text` for a query string: spaces become `+`, everything outside
/// the unreserved set is percent-encoded.
pub fn query_escape(text: &str) -> String {
    urlencoding::encode(text).replace("%20", "+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            route::{Handler, get, post},
            tree::sroute,
        },
        ports::route_engine::EngineError,
    };

    fn ok() -> Handler {
        Handler::new(|_req| async { "ok" })
    }

    fn sample() -> RouteTree {
        sroute(
            "/",
            ok(),
            "home-path",
            [
                sroute(get("/submit"), ok(), "submit-get", []).into(),
                sroute(post("/submit"), ok(), "submit-post", []).into(),
                sroute("/a", ok(), "a-path", [sroute("/b", ok(), "b-path", []).into()]).into(),
            ],
        )
    }

    #[test]
    fn test_table_matches_nodes() {
        let tree = sample();
        let table = tree.table();

        let mut visited = 0;
        tree.iter(|_| visited += 1);
        assert_eq!(table.len(), visited);

        assert_eq!(
            table,
            vec![
                Entry::new("home-path", "/", "ANY"),
                Entry::new("submit-get", "/submit", "GET"),
                Entry::new("submit-post", "/submit", "POST"),
                Entry::new("a-path", "/a", "ANY"),
                Entry::new("b-path", "/a/b", "ANY"),
            ]
        );
    }

    #[test]
    fn test_render_aligns_columns() {
        let rendered = sample().to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0].trim_end(),
            format!("{:<15}  {:<7}  ANY", "home-path", "/")
        );
        assert_eq!(lines[4], format!("{:<15}  {:<7}  ANY", "b-path", "/a/b"));
        let column = lines[1].find("/submit").unwrap();
        assert!(lines.iter().all(|line| line.chars().nth(column - 1) == Some(' ')));
    }

    #[test]
    fn test_render_widens_for_long_names() {
        let entries = vec![Entry::new("a-rather-long-route-name", "/x", "ANY")];
        assert_eq!(render_table(&entries), "a-rather-long-route-name  /x  ANY");
    }

    struct Fixed;

    impl ReverseLookup for Fixed {
        fn url(&self, name: &str, _params: &[&str]) -> EngineResult<String> {
            match name {
                "known" => Ok("/known".to_string()),
                other => Err(EngineError::UnknownRoute(other.to_string())),
            }
        }
    }

    #[test]
    fn test_url_fn_returns_errors() {
        let url_for = create_url_fn(Fixed, UrlMode::ReturnError);
        assert_eq!(url_for("known", &[]).unwrap(), "/known");
        assert_eq!(
            url_for("x-path", &[]),
            Err(EngineError::UnknownRoute("x-path".to_string()))
        );
    }

    #[test]
    fn test_url_fn_embeds_errors() {
        let url_for = create_url_fn(Fixed, UrlMode::EmbedError);
        assert_eq!(
            url_for("x-path", &[]).unwrap(),
            "%28invalid+route+name%3A+x-path%29"
        );
    }

    #[test]
    fn test_query_escape() {
        assert_eq!(query_escape("a b+c"), "a+b%2Bc");
        assert_eq!(query_escape("safe-_.~"), "safe-_.~");
    }
}
