pub mod route_engine;

pub use route_engine::{
    EngineError, EngineResult, Matcher, ReverseLookup, RouteConfigurator, RouteEngine, RouteMatch,
};
