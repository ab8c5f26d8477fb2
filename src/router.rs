//! Path-based routing on top of reactive blocks.
//!
//! A [`Router`] holds the current path in a signal. [`routes`] renders the
//! first matching entry of a [`Routes`] table inside a reactive block, so a
//! navigation refreshes that block and nothing else. Parameters extracted
//! from the path are provided to the routed view as [`Params`].
//!
//! ```ignore
//! let router = Router::new("/");
//! let table = Routes::new()
//!     .route("/", |s| s.text("home"))
//!     .route("/users/:id", |s| {
//!         let params = s.inject::<Params>()?.unwrap_or_default();
//!         s.text(format!("user {}", params.get("id").unwrap_or("?")))
//!     })
//!     .fallback(|s| s.text("not found"));
//! engine.mount_with(move |s| routes(s, router, table.clone()).map(drop))?;
//! router.navigate("/users/7");
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RenderError;
use crate::plugin::Plugin;
use crate::reactive::{create_signal, untrack, ReadSignal, WriteSignal};
use crate::request::{builder, Builder, Request, Response};
use crate::scope::Scope;
use crate::slot::Slot;

/// Tag claimed by [`RouterPlugin`].
pub const ROUTE_TAG: &str = "route";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// The current location. `Copy`: only stores signal ids.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    path: ReadSignal<String>,
    set_path: WriteSignal<String>,
}

impl Router {
    pub fn new(initial: impl Into<String>) -> Self {
        let (path, set_path) = create_signal(normalize(&initial.into()));
        Self { path, set_path }
    }

    /// Change the current path. Routed blocks showing it refresh on their
    /// engine's next flush. Navigating to the current path does nothing.
    pub fn navigate(&self, path: impl Into<String>) {
        let next = normalize(&path.into());
        if self.path.with_untracked(|current| *current == next) {
            return;
        }
        tracing::debug!(path = %next, "navigate");
        self.set_path.set(next);
    }

    /// The current path, subscribing the tracking block.
    pub fn path(&self) -> String {
        self.path.get()
    }

    /// The current path without subscribing.
    pub fn current(&self) -> String {
        self.path.get_untracked()
    }
}

/// Strip a trailing slash and make sure the path is absolute.
fn normalize(path: &str) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// Values captured by `:name` segments. A trailing `*` captures the rest of
/// the path under [`Params::WILDCARD`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub const WILDCARD: &'static str = "*";

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// The path remainder matched by a trailing `*`.
    pub fn rest(&self) -> Option<&str> {
        self.get(Self::WILDCARD)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    Wildcard,
}

/// A parsed route pattern such as `/users/:id` or `/files/*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a pattern. A `*` anywhere but the last segment is matched
    /// literally.
    pub fn parse(source: &str) -> Self {
        let parts: Vec<&str> = split(source).collect();
        let last = parts.len().saturating_sub(1);
        let segments = parts
            .into_iter()
            .enumerate()
            .map(|(index, segment)| {
                if segment == "*" && index == last {
                    Segment::Wildcard
                } else if let Some(name) = segment.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Static(segment.to_string())
                }
            })
            .collect();
        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match `path`, returning the captured parameters.
    ///
    /// A trailing `*` matches any remainder, including an empty one.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = split(path).collect();
        let mut params = Params::default();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard => {
                    params.insert(Params::WILDCARD, &parts.get(index..)?.join("/"));
                    return Some(params);
                }
                Segment::Static(expected) => {
                    if parts.get(index) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => params.insert(name, parts.get(index)?),
            }
        }
        (parts.len() == self.segments.len()).then_some(params)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// An ordered route table. The first matching pattern wins.
#[derive(Clone, Default)]
pub struct Routes {
    entries: Vec<(Pattern, Builder)>,
    fallback: Option<Builder>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        pattern: &str,
        view: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Self {
        self.entries.push((Pattern::parse(pattern), builder(view)));
        self
    }

    /// Rendered when no pattern matches. Without one, nothing renders.
    pub fn fallback(
        mut self,
        view: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Self {
        self.fallback = Some(builder(view));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The view for `path` and the parameters it captured.
    pub fn resolve(&self, path: &str) -> Option<(Builder, Params)> {
        self.entries
            .iter()
            .find_map(|(pattern, view)| pattern.matches(path).map(|p| (view.clone(), p)))
            .or_else(|| self.fallback.clone().map(|view| (view, Params::default())))
    }
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routes")
            .field(
                "patterns",
                &self.entries.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(),
            )
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

struct RouteRequest {
    router: Router,
    routes: Rc<Routes>,
}

/// Render the route matching `router`'s path. Returns the routed block's slot.
pub fn routes(scope: &mut Scope<'_>, router: Router, routes: Routes) -> Result<Slot, RenderError> {
    let response = scope.request(Request::custom(
        ROUTE_TAG,
        RouteRequest {
            router,
            routes: Rc::new(routes),
        },
    ))?;
    response.into_slot().ok_or_else(|| RenderError::UnexpectedResponse {
        tag: ROUTE_TAG.to_string(),
    })
}

/// Handles `route` requests by issuing a reactive block that tracks only the
/// router path. The routed view runs untracked, so its own reads do not
/// re-route; views that react to signals use nested blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct RouterPlugin;

impl Plugin for RouterPlugin {
    fn name(&self) -> &'static str {
        "router"
    }

    fn handles(&self) -> &[&'static str] {
        &[ROUTE_TAG]
    }

    fn dependencies(&self) -> &[&'static str] {
        &["reactive", "context"]
    }

    fn handle(&self, request: Request, scope: &mut Scope<'_>) -> Result<Response, RenderError> {
        let unsupported = |tag: &str| RenderError::UnsupportedRequest {
            plugin: self.name().to_string(),
            tag: tag.to_string(),
        };
        let Request::Custom { tag, payload } = request else {
            return Err(unsupported(request.tag()));
        };
        let route = payload
            .downcast::<RouteRequest>()
            .map_err(|_| unsupported(tag))?;
        let router = route.router;
        let table = route.routes.clone();

        scope.request(Request::Reactive(builder(move |s| {
            let path = router.path();
            let Some((view, params)) = table.resolve(&path) else {
                tracing::debug!(%path, "no route matched");
                return Ok(());
            };
            tracing::trace!(%path, params = params.len(), "route matched");
            s.provide(params)?;
            untrack(|| view(s))
        })))
    }
}
