//! The registration table mapping (method, path) pairs to handlers.
//!
//! Every routable method owns one table of exact paths plus one default
//! handler. Exact paths are first-registered-wins: a later registration for the
//! same key is ignored. The default is the exception and is replaced by every
//! registration for the wildcard path.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use log::debug;

use crate::parser::{Error as ParserError, HttpRequest, Method};
use crate::server::error::Error;
use crate::server::handler::{handler_fn, HandlerFn};
use crate::server::response::StatusCode;
use crate::server::writer::ResponseWriter;

/// The path (or method) that addresses the default handler.
pub const WILDCARD: &str = "*";

/// The method side of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMethod {
    /// Register for one method.
    Only(Method),
    /// Register for every routable method.
    Any,
}

impl RouteMethod {
    /// The methods this registration applies to.
    pub fn methods(&self) -> &[Method] {
        match self {
            RouteMethod::Only(method) => std::slice::from_ref(method),
            RouteMethod::Any => &Method::ALL,
        }
    }
}

impl From<Method> for RouteMethod {
    fn from(method: Method) -> Self {
        RouteMethod::Only(method)
    }
}

impl FromStr for RouteMethod {
    type Err = ParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == WILDCARD {
            Ok(RouteMethod::Any)
        } else {
            s.parse().map(RouteMethod::Only)
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::Only(method) => method.fmt(f),
            RouteMethod::Any => f.write_str(WILDCARD),
        }
    }
}

struct MethodTable {
    exact: HashMap<String, HandlerFn>,
    fallback: HandlerFn,
}

impl MethodTable {
    fn new() -> Self {
        Self {
            exact: HashMap::new(),
            fallback: not_found_handler(),
        }
    }
}

/// The default handler: 404 with `Cannot <METHOD> <path>`.
pub fn not_found_handler() -> HandlerFn {
    handler_fn(|req: HttpRequest, mut res: ResponseWriter| async move {
        res.status(StatusCode::NotFound)
            .header("Content-Type", "text/plain; charset=utf-8")
            .write(format!("Cannot {} {}", req.method, req.path));
        res.end();
        Ok(())
    })
}

/// Per-method routing table.
///
/// A `Router` never fails a lookup: every method always has a default
/// handler, initially [`not_found_handler`].
pub struct Router {
    tables: [MethodTable; Method::ALL.len()],
}

impl Router {
    /// Create a router holding only the default handlers.
    pub fn new() -> Self {
        Self {
            tables: std::array::from_fn(|_| MethodTable::new()),
        }
    }

    /// Register an already boxed handler.
    ///
    /// A [`WILDCARD`] path replaces the default handler of each addressed
    /// method. Any other path is stored only for methods that have no handler
    /// for it yet.
    ///
    /// # Returns
    ///
    /// `true` if at least one table changed, `false` if every addressed
    /// method already had a handler for `path`
    pub fn register_handler(
        &mut self,
        method: impl Into<RouteMethod>,
        path: impl Into<String>,
        handler: HandlerFn,
    ) -> bool {
        let method = method.into();
        let path = path.into();
        let mut changed = false;

        for &m in method.methods() {
            let table = &mut self.tables[m.index()];
            if path == WILDCARD {
                table.fallback = handler.clone();
                changed = true;
            } else if table.exact.contains_key(&path) {
                debug!("Ignoring duplicate registration for {m} {path}");
            } else {
                table.exact.insert(path.clone(), handler.clone());
                changed = true;
            }
        }

        changed
    }

    /// Register an async handler for `method` and `path`.
    ///
    /// See [`Router::register_handler`] for the collision rules.
    pub fn register<F, Fut>(&mut self, method: impl Into<RouteMethod>, path: impl Into<String>, handler: F) -> bool
    where
        F: Fn(HttpRequest, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.register_handler(method, path, handler_fn(handler))
    }

    /// Register a GET handler.
    pub fn get<F, Fut>(&mut self, path: impl Into<String>, handler: F) -> bool
    where
        F: Fn(HttpRequest, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.register(Method::GET, path, handler)
    }

    /// Register a POST handler.
    pub fn post<F, Fut>(&mut self, path: impl Into<String>, handler: F) -> bool
    where
        F: Fn(HttpRequest, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.register(Method::POST, path, handler)
    }

    /// Register a PUT handler.
    pub fn put<F, Fut>(&mut self, path: impl Into<String>, handler: F) -> bool
    where
        F: Fn(HttpRequest, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.register(Method::PUT, path, handler)
    }

    /// Register a PATCH handler.
    pub fn patch<F, Fut>(&mut self, path: impl Into<String>, handler: F) -> bool
    where
        F: Fn(HttpRequest, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.register(Method::PATCH, path, handler)
    }

    /// Register a DELETE handler.
    pub fn delete<F, Fut>(&mut self, path: impl Into<String>, handler: F) -> bool
    where
        F: Fn(HttpRequest, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.register(Method::DELETE, path, handler)
    }

    /// Resolve the handler for `method` and `path`.
    ///
    /// Returns the exact-match handler if one is registered, otherwise the
    /// method's default handler.
    pub fn lookup(&self, method: Method, path: &str) -> HandlerFn {
        let table = &self.tables[method.index()];
        table
            .exact
            .get(path)
            .unwrap_or(&table.fallback)
            .clone()
    }

    /// Returns true if an exact handler is registered for `method` and `path`.
    pub fn contains(&self, method: Method, path: &str) -> bool {
        self.tables[method.index()].exact.contains_key(path)
    }

    /// Iterate over the registered exact routes.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> + '_ {
        Method::ALL.iter().flat_map(move |&method| {
            self.tables[method.index()]
                .exact
                .keys()
                .map(move |path| (method, path.as_str()))
        })
    }

    /// Drop every exact route and reinstall the not-found default for every method.
    pub fn reset(&mut self) {
        for table in &mut self.tables {
            *table = MethodTable::new();
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
