use billmap_core::{nice_url, Site, SiteId};

/// Lookup table from lowercased site names and bare site URLs to site ids,
/// used to auto-map imported client names onto directory sites.
///
/// Entries keep their insertion order. Registering a key that already exists
/// overwrites the id in place, so the later site wins while the key stays at
/// its original position. The containment pass scans entries in that order,
/// which means a short or generic key registered early can claim a name that
/// a later, more specific key would also match. Existing mappings in the
/// field depend on that scan order, so it is part of the contract here.
#[derive(Debug, Clone, Default)]
pub struct SiteLookup {
    entries: Vec<(String, SiteId)>,
}

impl SiteLookup {
    /// Registers two keys per site: its display name and its URL reduced to
    /// the bare `nice_url` form, both lowercased.
    pub fn build(sites: &[Site]) -> Self {
        let mut lookup = SiteLookup::default();
        for site in sites {
            lookup.insert(site.name.to_lowercase(), site.id);
            lookup.insert(nice_url(&site.url).to_lowercase(), site.id);
        }
        lookup
    }

    fn insert(&mut self, key: String, id: SiteId) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = id,
            None => self.entries.push((key, id)),
        }
    }

    /// Resolves a client name to a site id.
    ///
    /// Pass one is an exact match against the lowercased name. Pass two
    /// returns the first key that contains the name or is contained by it,
    /// in insertion order. No match resolves to [`SiteId::NONE`].
    pub fn resolve(&self, client_name: &str) -> SiteId {
        let name = client_name.to_lowercase();

        if let Some((_, id)) = self.entries.iter().find(|(key, _)| *key == name) {
            return *id;
        }

        for (key, id) in &self.entries {
            if name.contains(key.as_str()) || key.contains(name.as_str()) {
                return *id;
            }
        }

        SiteId::NONE
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
