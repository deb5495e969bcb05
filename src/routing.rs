//! Ordered route tables: regex-matched dispatch to a handler factory.

use crate::handler::Handler;
use regex::Regex;
use std::sync::Arc;

/// Builds a handler instance for a matched route. Stored as a closure so a
/// factory can close over configuration (the source's "keyword-bound handler
/// wrapper" collapses into an ordinary Rust closure here).
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn Handler> + Send + Sync>;

struct Route {
    pattern: Regex,
    factory: HandlerFactory,
}

/// An ordered list of `(anchored regex, handler factory)` pairs, matched
/// first-match-wins. Used both for the main route table (keyed by resource
/// path) and the error-route table (keyed by the stringified status code).
///
/// Immutable once built: entries are only ever appended during server
/// construction, in the exact order the caller registers them, because a
/// route ordered before a more specific one can shadow it.
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        RouteTable { routes: Vec::new() }
    }

    /// Registers a route. `pattern` is wrapped as `^pattern$` before
    /// compiling, so every match is anchored at both ends.
    pub fn add(&mut self, pattern: &str, factory: HandlerFactory) -> Result<(), regex::Error> {
        let anchored = format!("^{pattern}$");
        self.routes.push(Route {
            pattern: Regex::new(&anchored)?,
            factory,
        });
        Ok(())
    }

    /// Returns the first matching route's handler along with its named and
    /// positional capture groups. Positional indices whose value duplicates
    /// a named group's value are elided, since the handler can already reach
    /// that value by name.
    pub(crate) fn matched(&self, target: &str) -> Option<MatchedRoute> {
        for route in &self.routes {
            if let Some(captures) = route.pattern.captures(target) {
                let mut named = Vec::new();
                for name in route.pattern.capture_names().flatten() {
                    if let Some(m) = captures.name(name) {
                        named.push((name.to_string(), m.as_str().to_string()));
                    }
                }
                let mut positional = Vec::new();
                for m in captures.iter().skip(1).flatten() {
                    let value = m.as_str().to_string();
                    if !named.iter().any(|(_, v)| v == &value) {
                        positional.push(value);
                    }
                }
                return Some(MatchedRoute {
                    handler: (route.factory)(),
                    named,
                    positional,
                });
            }
        }
        None
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct MatchedRoute {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) named: Vec<(String, String)>,
    pub(crate) positional: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HttpError;
    use crate::http::request::Request;
    use crate::http::response::Response;

    struct Stub;
    impl Handler for Stub {
        fn methods(&self) -> &[&str] {
            &["GET"]
        }
        fn call(&self, _method: &str, _request: &Request) -> Result<Response, HttpError> {
            Ok(Response::new(200))
        }
    }

    fn factory() -> HandlerFactory {
        Arc::new(|| Arc::new(Stub) as Arc<dyn Handler>)
    }

    #[test]
    fn first_match_wins() {
        let mut table = RouteTable::new();
        table.add(r"/a/.*", factory()).unwrap();
        table.add(r"/a/b", factory()).unwrap();
        // Both match "/a/b"; since the wildcard route was registered first,
        // it wins even though the more specific route would also match.
        assert!(table.matched("/a/b").is_some());
        assert!(table.matched("/a/c").is_some());
        assert!(table.matched("/x").is_none());
    }

    #[test]
    fn patterns_are_anchored_at_both_ends() {
        let mut table = RouteTable::new();
        table.add(r"/a", factory()).unwrap();
        assert!(table.matched("/a").is_some());
        assert!(table.matched("/ab").is_none());
        assert!(table.matched("x/a").is_none());
    }

    #[test]
    fn named_capture_is_exposed_and_elides_duplicate_positional() {
        let mut table = RouteTable::new();
        table.add(r"/users/(?P<id>\d+)", factory()).unwrap();
        let matched = table.matched("/users/42").unwrap();
        assert_eq!(matched.named, vec![("id".to_string(), "42".to_string())]);
        assert!(matched.positional.is_empty());
    }
}
