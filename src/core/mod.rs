pub mod alias;
pub mod builder;
pub mod path;
pub mod report;
pub mod route;
pub mod tree;

pub use alias::expand_aliases;
pub use builder::build_router;
pub use report::{Entry, UrlFn, UrlMode, create_url_fn, render_table};
pub use route::{
    Action, Guard, Handler, Hook, ReRoute, Route, RoutePath, Subroute, Transformer, delete, get,
    h, head, methods, post, put, reroute, with,
};
pub use tree::{NodeId, NodeRef, RouteTree, route, sroute};
