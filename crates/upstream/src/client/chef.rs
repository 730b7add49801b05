//! Chef Server API client.
//!
//! Talks to the two endpoints the proxy needs:
//!
//! - `GET {server}/cookbooks?num_versions=all` for the full version listing,
//! - `GET {server}/cookbooks/{name}/{version}` for one version's manifest.
//!
//! Every request is signed by a [`Signer`]; see [`crate::sign`].

use crate::client::UpstreamClient;
use crate::error::{ErrorKind, Result};
use crate::models::{VersionDetail, VersionListing};
use crate::sign::Signer;
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, Response, StatusCode, Url};
use std::path::Path;
use tracing::instrument;

const USER_AGENT: &str = concat!("bodega/", env!("CARGO_PKG_VERSION"));

/// Signed HTTP client for a Chef Server (optionally scoped to an
/// organization, e.g. `https://chef.example.com/organizations/acme`).
///
/// # Examples
///
/// ```no_run
/// use bodega_upstream::ChefServer;
/// use std::path::Path;
///
/// # fn example() -> bodega_upstream::error::Result<()> {
/// let chef = ChefServer::from_key_file(
///     "https://chef.example.com/organizations/acme",
///     "bodega",
///     Path::new("/etc/bodega/client.pem"),
///     false,
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChefServer {
    name: String,
    base: Url,
    http: Client,
    signer: Signer,
}

impl ChefServer {
    /// Create a client for `server_url`, signing requests with `signer`.
    ///
    /// `skip_tls_verify` disables certificate validation for the API calls;
    /// self-signed Chef Servers are common enough that the option exists.
    pub fn new(server_url: &str, signer: Signer, skip_tls_verify: bool) -> Result<Self> {
        let base = Url::parse(server_url).or_raise(|| ErrorKind::InvalidUrl(server_url.to_string()))?;
        if base.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidUrl(server_url.to_string()));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(skip_tls_verify)
            .build()
            .or_raise(|| ErrorKind::Network("couldn't build HTTP client".to_string()))?;
        let name = base.host_str().unwrap_or("chef-server").to_string();
        Ok(Self { name, base, http, signer })
    }

    /// Like [`new`](Self::new), reading the client key from a PEM file.
    ///
    /// Uses blocking I/O; it happens once at startup and isn't worth making
    /// the constructor async.
    pub fn from_key_file(
        server_url: &str,
        client_name: impl Into<String>,
        key_path: &Path,
        skip_tls_verify: bool,
    ) -> Result<Self> {
        let pem = std::fs::read_to_string(key_path)
            .or_raise(|| ErrorKind::Credentials(format!("couldn't read key file {}", key_path.display())))?;
        Self::new(server_url, Signer::from_pem(client_name, &pem)?, skip_tls_verify)
    }

    /// Append path segments to the server URL. Segments are percent-encoded,
    /// so cookbook names can't smuggle in extra path components.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let Ok(mut path) = url.path_segments_mut() else {
                exn::bail!(ErrorKind::InvalidUrl(self.base.to_string()));
            };
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn get(&self, url: &Url) -> Result<Response> {
        let mut request = self.http.get(url.clone());
        for (name, value) in self.signer.sign("GET", url.path(), b"")? {
            request = request.header(name, value);
        }
        tracing::debug!(%url, "GET");
        request.send().await.or_raise(|| ErrorKind::Network(url.to_string()))
    }

    async fn decode<T: serde::de::DeserializeOwned>(url: &Url, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status { status: status.as_u16(), url: url.to_string() });
        }
        response.json::<T>().await.or_raise(|| ErrorKind::InvalidResponse(url.to_string()))
    }
}

#[async_trait]
impl UpstreamClient for ChefServer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(upstream = %self.name))]
    async fn list_all_versions(&self) -> Result<VersionListing> {
        let mut url = self.endpoint(&["cookbooks"])?;
        url.query_pairs_mut().append_pair("num_versions", "all");
        let response = self.get(&url).await?;
        let listing: wire::Listing = Self::decode(&url, response).await?;
        Ok(listing.into())
    }

    #[instrument(skip(self), fields(upstream = %self.name))]
    async fn version_detail(&self, name: &str, version: &str) -> Result<VersionDetail> {
        let url = self.endpoint(&["cookbooks", name, version])?;
        let response = self.get(&url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            exn::bail!(ErrorKind::NotFound(format!("{name}/{version}")));
        }
        let document: wire::CookbookVersion = Self::decode(&url, response).await?;
        Ok(document.into_detail(name, version))
    }
}

/// Chef Server JSON documents. Only the fields the proxy reads are modelled.
mod wire {
    use crate::models::{Category, Manifest, ManifestFile, VersionDetail, VersionListing};
    use serde::Deserialize;
    use std::collections::BTreeMap;

    /// `{ "apache2": { "url": "...", "versions": [{ "url": "...", "version": "3.2.0" }] } }`
    #[derive(Deserialize)]
    #[serde(transparent)]
    pub(super) struct Listing(BTreeMap<String, Cookbook>);

    #[derive(Deserialize)]
    struct Cookbook {
        #[serde(default)]
        versions: Vec<VersionRef>,
    }

    #[derive(Deserialize)]
    struct VersionRef {
        version: String,
    }

    impl From<Listing> for VersionListing {
        fn from(listing: Listing) -> Self {
            listing
                .0
                .into_iter()
                .map(|(name, cookbook)| (name, cookbook.versions.into_iter().map(|v| v.version).collect()))
                .collect()
        }
    }

    #[derive(Deserialize)]
    struct Item {
        path: String,
        url: String,
        #[serde(default)]
        checksum: Option<String>,
    }

    #[derive(Deserialize, Default)]
    struct Metadata {
        #[serde(default)]
        dependencies: BTreeMap<String, String>,
    }

    /// Cookbook version document, server API version 0 layout (files grouped by
    /// segment).
    #[derive(Deserialize)]
    pub(super) struct CookbookVersion {
        #[serde(default)]
        files: Vec<Item>,
        #[serde(default)]
        templates: Vec<Item>,
        #[serde(default)]
        recipes: Vec<Item>,
        #[serde(default)]
        attributes: Vec<Item>,
        #[serde(default)]
        definitions: Vec<Item>,
        #[serde(default)]
        libraries: Vec<Item>,
        #[serde(default)]
        providers: Vec<Item>,
        #[serde(default)]
        resources: Vec<Item>,
        #[serde(default)]
        root_files: Vec<Item>,
        #[serde(default)]
        metadata: Metadata,
    }

    impl CookbookVersion {
        pub(super) fn into_detail(self, name: &str, version: &str) -> VersionDetail {
            let segments = [
                (Category::Files, self.files),
                (Category::Templates, self.templates),
                (Category::Recipes, self.recipes),
                (Category::Attributes, self.attributes),
                (Category::Definitions, self.definitions),
                (Category::Libraries, self.libraries),
                (Category::Providers, self.providers),
                (Category::Resources, self.resources),
                (Category::RootFiles, self.root_files),
            ];
            let manifest: Manifest = segments
                .into_iter()
                .flat_map(|(category, items)| {
                    items.into_iter().map(move |item| ManifestFile {
                        category,
                        path: item.path,
                        url: item.url,
                        checksum: item.checksum,
                    })
                })
                .collect();
            VersionDetail {
                name: name.to_string(),
                version: version.to_string(),
                manifest,
                dependencies: self.metadata.dependencies,
            }
        }
    }
}
