//! Which routes require a verified API key.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    Info,
    KeyPage,
    GenerateKey,
    MusicSearch,
    MusicDownload,
    PhotoSearch,
    Weather,
    Chat,
}

impl RouteId {
    pub const ALL: [RouteId; 8] = [
        RouteId::Info,
        RouteId::KeyPage,
        RouteId::GenerateKey,
        RouteId::MusicSearch,
        RouteId::MusicDownload,
        RouteId::PhotoSearch,
        RouteId::Weather,
        RouteId::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteId::Info => "info",
            RouteId::KeyPage => "key-page",
            RouteId::GenerateKey => "generate-key",
            RouteId::MusicSearch => "music-search",
            RouteId::MusicDownload => "music-download",
            RouteId::PhotoSearch => "photo-search",
            RouteId::Weather => "weather",
            RouteId::Chat => "chat",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        RouteId::ALL.into_iter().find(|r| r.as_str() == s)
    }

    pub fn method(&self) -> &'static str {
        match self {
            RouteId::GenerateKey => "POST",
            _ => "GET",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            RouteId::Info => "/api",
            RouteId::KeyPage | RouteId::GenerateKey => "/api/generate-api-key",
            RouteId::MusicSearch => "/api/music",
            RouteId::MusicDownload => "/api/music/download",
            RouteId::PhotoSearch => "/api/photo-search",
            RouteId::Weather => "/api/weather",
            RouteId::Chat => "/api/tina/messages",
        }
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Gated,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatingError {
    #[error("unknown route {0:?} (expected one of: {names})", names = route_names())]
    UnknownRoute(String),

    #[error("the /api descriptor is always public")]
    InfoNotGateable,
}

fn route_names() -> String {
    RouteId::ALL
        .iter()
        .map(RouteId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Route → access table. Routes not listed are public.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatingTable {
    gated: HashSet<RouteId>,
}

impl GatingTable {
    /// Every route public.
    pub fn open() -> Self {
        Self::default()
    }

    /// The shipped policy: only the audio download needs a key.
    pub fn default_policy() -> Self {
        Self {
            gated: HashSet::from([RouteId::MusicDownload]),
        }
    }

    pub fn with_gated(routes: impl IntoIterator<Item = RouteId>) -> Result<Self, GatingError> {
        let gated: HashSet<RouteId> = routes.into_iter().collect();
        if gated.contains(&RouteId::Info) {
            return Err(GatingError::InfoNotGateable);
        }
        Ok(Self { gated })
    }

    /// Parse a comma-separated list of route names. An empty list or
    /// `none` yields an open table.
    pub fn parse_list(s: &str) -> Result<Self, GatingError> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::open());
        }
        let routes = s
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                RouteId::parse_str(name).ok_or_else(|| GatingError::UnknownRoute(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_gated(routes)
    }

    pub fn access(&self, route: RouteId) -> Access {
        if self.gated.contains(&route) {
            Access::Gated
        } else {
            Access::Public
        }
    }

    pub fn is_gated(&self, route: RouteId) -> bool {
        self.access(route) == Access::Gated
    }

    /// Gated routes in catalog order.
    pub fn gated_routes(&self) -> Vec<RouteId> {
        RouteId::ALL
            .into_iter()
            .filter(|r| self.gated.contains(r))
            .collect()
    }
}
