use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a site in the externally-managed directory.
///
/// Zero is reserved: a billing record carrying `SiteId::NONE` has no site
/// association, and the auto-mapper returns it when no candidate matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteId(pub i64);

impl SiteId {
    pub const NONE: SiteId = SiteId(0);

    pub fn is_mapped(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub i64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A managed site mirrored from the external directory. This system never
/// edits sites; it only reads them for mapping and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub url: String,
    pub client_id: ClientId,
}

/// A client grouping from the external directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
}

/// Reduces a site URL to its bare form: scheme and `www.` prefix dropped,
/// one trailing slash dropped. Any path component is kept, so
/// `https://www.acme.com/shop/` becomes `acme.com/shop`.
pub fn nice_url(url: &str) -> String {
    let mut bare = url.trim();
    bare = bare
        .strip_prefix("https://")
        .or_else(|| bare.strip_prefix("http://"))
        .unwrap_or(bare);
    bare = bare.strip_prefix("www.").unwrap_or(bare);
    bare.strip_suffix('/').unwrap_or(bare).to_string()
}
