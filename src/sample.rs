//! Demonstration route tree served by the `serve` command.
//!
//! Logging in sets a `username` cookie. Everything under `/a` requires that
//! cookie (checked first) and the admin flag that the root hook records for
//! every request (checked second). Rejections from inside `/a` carry the
//! `x-guarded-scope` header set from what the `/a` hook recorded. `/mirror/a`
//! is an alias of the `/a` subtree carrying the same guards and hooks.
//! `/submit` serves a form on GET and accepts a POST carrying `X: 123`.
use axum::{
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    response::IntoResponse,
};
use http::Extensions;

use crate::core::{
    route::{Guard, Handler, Hook, Transformer, h, reroute},
    tree::{RouteTree, route, sroute},
};

pub const SESSION_COOKIE: &str = "username";

/// Response header naming the guarded scope a rejection came from
pub const GUARDED_SCOPE_HEADER: &str = "x-guarded-scope";

/// Response body served by the named route.
pub fn message(name: &str) -> &'static str {
    match name {
        "home-path" => "This is the homepage",
        "login-path" => "You are now alive",
        "logout-path" => "You are now dead",
        "a-path" => "This is a path",
        "b-path" => "This is b path",
        "c-path" => "This is c path",
        "d-path" => "This is d path",
        "broke-path" => "You were born",
        "protected-path" => "login required",
        "admin-path" => "must be admin",
        "submit-form" => "POST to submit; Need header X=123",
        "submit-path" => "submission successful",
        _ => "",
    }
}

/// Recorded by the root hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminFlag;

/// Recorded by the `/a` hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsideA;

fn text(name: &'static str) -> Handler {
    Handler::new(move |_req| async move { message(name) })
}

fn unauthorized(name: &'static str) -> Handler {
    Handler::new(move |req: Request| async move {
        let mut response = (StatusCode::UNAUTHORIZED, message(name)).into_response();
        if req.extensions().get::<InsideA>().is_some() {
            response
                .headers_mut()
                .insert(GUARDED_SCOPE_HEADER, HeaderValue::from_static("a"));
        }
        response
    })
}

fn submit() -> Transformer {
    Transformer::alternatives([
        Transformer::methods([Method::GET]).then(h(text("submit-form"))),
        Transformer::group([
            Transformer::headers([("X", "123")]),
            Transformer::methods([Method::POST]),
            h(text("submit-path")),
        ]),
    ])
}

fn login() -> Handler {
    Handler::new(|_req| async {
        (
            [(header::SET_COOKIE, format!("{SESSION_COOKIE}=joe; Path=/"))],
            message("login-path"),
        )
    })
}

fn logout() -> Handler {
    Handler::new(|_req| async {
        (
            [(
                header::SET_COOKIE,
                format!("{SESSION_COOKIE}=; Path=/; Max-Age=0"),
            )],
            message("logout-path"),
        )
    })
}

fn broke() -> Handler {
    fn explode() -> &'static str {
        panic!("{}", message("broke-path"))
    }

    Handler::new(|_req| async { explode() }).catch_panic(|message| message.into_response())
}

/// Value of the session cookie, if the request carries a non-empty one.
pub fn session_user(req: &Request) -> Option<String> {
    req.headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn be_admin() -> Hook {
    Hook::new(|_req, context| {
        context.insert(AdminFlag);
    })
}

fn mark_inside_a() -> Hook {
    Hook::new(|_req, context| {
        context.insert(InsideA);
    })
}

pub fn require_login() -> Guard {
    Guard::new(
        |req: &Request, _: &Extensions| session_user(req).is_none(),
        unauthorized("protected-path"),
    )
}

pub fn require_admin() -> Guard {
    Guard::new(
        |_: &Request, context: &Extensions| context.get::<AdminFlag>().is_none(),
        unauthorized("admin-path"),
    )
}

/// The demonstration tree.
pub fn route_definition() -> RouteTree {
    route(
        "/",
        text("home-path"),
        "home-path",
        [be_admin()],
        [],
        [
            sroute("/login", login(), "login-path", []).into(),
            sroute("/logout", logout(), "logout-path", []).into(),
            sroute("/broke", broke(), "broke-path", []).into(),
            sroute("/submit", submit(), "submit-path", []).into(),
            route(
                "/a",
                text("a-path"),
                "a-path",
                [mark_inside_a()],
                [require_login(), require_admin()],
                [
                    sroute(
                        "/b",
                        text("b-path"),
                        "b-path",
                        [sroute("/c", text("c-path"), "c-path", []).into()],
                    )
                    .into(),
                    sroute("/d", text("d-path"), "d-path", []).into(),
                ],
            )
            .into(),
            reroute("a-path", "/mirror", "mirror", [], []),
        ],
    )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn request_with_cookie(cookie: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/a");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_session_user() {
        assert_eq!(session_user(&request_with_cookie(None)), None);
        assert_eq!(
            session_user(&request_with_cookie(Some("theme=dark; username=joe"))),
            Some("joe".to_string())
        );
        assert_eq!(session_user(&request_with_cookie(Some("username="))), None);
    }

    #[test]
    fn test_tree_layout() {
        let tree = route_definition();
        let names: Vec<String> = tree.table().into_iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            [
                "home-path",
                "login-path",
                "logout-path",
                "broke-path",
                "submit-path",
                "a-path",
                "b-path",
                "c-path",
                "d-path",
                "mirror-a-path",
                "mirror-b-path",
                "mirror-c-path",
                "mirror-d-path",
            ]
        );
        assert_eq!(tree.search("mirror-c-path").unwrap().full_path(), "/mirror/a/b/c");
        assert_eq!(tree.search("mirror-a-path").unwrap().route().guards.len(), 2);
    }

    #[test]
    fn test_guard_predicates() {
        let mut context = Extensions::new();
        assert!(require_login().rejects(&request_with_cookie(None), &context));
        assert!(!require_login().rejects(&request_with_cookie(Some("username=joe")), &context));

        assert!(require_admin().rejects(&request_with_cookie(None), &context));
        context.insert(AdminFlag);
        assert!(!require_admin().rejects(&request_with_cookie(None), &context));
    }
}
