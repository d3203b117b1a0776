//! Path template joining.
//!
//! Route segments are joined with `/` and the result is lexically cleaned:
//! repeated separators collapse, `.` elements vanish, `..` removes the
//! previous element and trailing separators are dropped (except for the bare
//! root). Placeholders such as `{id}` or `{*rest}` pass through untouched.

const SEPARATOR: char = '/';

/// Join path segments, skipping empty ones, and clean the result.
///
/// ```
/// use routedef::core::path::join_paths;
///
/// assert_eq!(join_paths(["/", "/a", "b/"]), "/a/b");
/// assert_eq!(join_paths(["/", "/"]), "/");
/// assert_eq!(join_paths(["/users", "{id}"]), "/users/{id}");
/// ```
pub fn join_paths<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = segments
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if joined.is_empty() {
        return String::new();
    }
    clean(&joined)
}

/// Lexically clean a single path.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with(SEPARATOR);
    let mut elements: Vec<&str> = Vec::new();

    for element in path.split(SEPARATOR) {
        match element {
            "" | "." => {}
            ".." => match elements.last() {
                Some(&last) if last != ".." => {
                    elements.pop();
                }
                // `..` cannot climb above the root
                _ if rooted => {}
                _ => elements.push(".."),
            },
            other => elements.push(other),
        }
    }

    match (rooted, elements.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", elements.join("/")),
        (false, true) => ".".to_string(),
        (false, false) => elements.join("/"),
    }
}
