//! Immutable catalog snapshots and the universe document they serialize to.

use bodega_upstream::models::{Manifest, VersionDetail};
use serde::Serialize;
use std::collections::BTreeMap;

/// How a client should interpret [`VersionRecord::location_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// A direct URI to this proxy's download endpoint.
    Uri,
    /// A path relative to a Chef Server.
    ChefServer,
}

/// One cached cookbook version.
///
/// Serializes to the universe format:
///
/// ```json
/// {"location_path": "http://localhost:8080/cookbooks/apache2/3.2.0/download", "location_type": "uri", "dependencies": {}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub location_path: String,
    pub location_type: LocationKind,
    pub dependencies: BTreeMap<String, String>,
    /// Manifest as of the first time this version was seen. File URLs in it
    /// have long expired by the time anyone downloads; the assembler always
    /// re-resolves.
    #[serde(skip)]
    pub manifest: Manifest,
}

impl VersionRecord {
    /// Record pointing clients at this proxy's download endpoint.
    pub fn from_detail(detail: VersionDetail, public_base_url: &str) -> Self {
        Self {
            location_path: location_path(public_base_url, &detail.name, &detail.version),
            location_type: LocationKind::Uri,
            dependencies: detail.dependencies,
            manifest: detail.manifest,
        }
    }
}

/// `{base}/cookbooks/{name}/{version}/download`, without doubled slashes.
pub fn location_path(public_base_url: &str, name: &str, version: &str) -> String {
    format!("{}/cookbooks/{name}/{version}/download", public_base_url.trim_end_matches('/'))
}

/// A complete, immutable view of every cached cookbook version.
///
/// Snapshots are only ever built whole and then swapped in; see
/// [`Catalog`](crate::Catalog). Serializes (transparently) to the universe
/// document `{name: {version: VersionRecord}}`, sorted by name then version
/// string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    cookbooks: BTreeMap<String, BTreeMap<String, VersionRecord>>,
}

impl Snapshot {
    pub fn get(&self, name: &str, version: &str) -> Option<&VersionRecord> {
        self.cookbooks.get(name)?.get(version)
    }

    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.get(name, version).is_some()
    }

    /// Number of distinct cookbook names.
    pub fn cookbooks(&self) -> usize {
        self.cookbooks.len()
    }

    /// Number of cookbook versions across all names.
    pub fn versions(&self) -> usize {
        self.cookbooks.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cookbooks.is_empty()
    }

    /// Every `(name, version, record)`, sorted by name then version string.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &VersionRecord)> + '_ {
        self.cookbooks.iter().flat_map(|(name, versions)| {
            versions.iter().map(move |(version, record)| (name.as_str(), version.as_str(), record))
        })
    }

    pub(crate) fn insert(&mut self, name: String, version: String, record: VersionRecord) {
        self.cookbooks.entry(name).or_default().insert(version, record);
    }
}

impl FromIterator<(String, String, VersionRecord)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (String, String, VersionRecord)>>(iter: T) -> Self {
        let mut snapshot = Snapshot::default();
        for (name, version, record) in iter {
            snapshot.insert(name, version, record);
        }
        snapshot
    }
}
