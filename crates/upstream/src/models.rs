//! Cookbook models.
//!
//! Registry-agnostic representations of what upstream knows about a cookbook
//! version. Wire formats live with the client that speaks them.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Every cookbook name upstream knows about, mapped to all of its versions.
pub type VersionListing = BTreeMap<String, Vec<String>>;

/// One of the nine fixed file categories of a cookbook version.
///
/// Declaration order is the canonical manifest order; [`Ord`] follows it, so
/// anything keyed by `Category` in a [`BTreeMap`] iterates in manifest order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Files,
    Templates,
    Recipes,
    Attributes,
    Definitions,
    Libraries,
    Providers,
    Resources,
    RootFiles,
}
impl Category {
    /// All categories, in manifest order.
    pub const ALL: [Category; 9] = [
        Category::Files,
        Category::Templates,
        Category::Recipes,
        Category::Attributes,
        Category::Definitions,
        Category::Libraries,
        Category::Providers,
        Category::Resources,
        Category::RootFiles,
    ];

    /// Segment name as used by the Chef Server API.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Files => "files",
            Category::Templates => "templates",
            Category::Recipes => "recipes",
            Category::Attributes => "attributes",
            Category::Definitions => "definitions",
            Category::Libraries => "libraries",
            Category::Providers => "providers",
            Category::Resources => "resources",
            Category::RootFiles => "root_files",
        }
    }
}
impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// A single file belonging to a cookbook version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub category: Category,
    /// Path relative to the cookbook root (e.g. `recipes/default.rb`).
    pub path: String,
    /// Where to download the content from. Usually a pre-signed URL with a
    /// short expiry, so never worth caching for later downloads.
    pub url: String,
    /// Content checksum as reported by upstream, if any.
    pub checksum: Option<String>,
}
impl ManifestFile {
    pub fn new(category: Category, path: impl Into<String>, url: impl Into<String>) -> Self {
        Self { category, path: path.into(), url: url.into(), checksum: None }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}

/// The files of a cookbook version, grouped by [`Category`].
///
/// Iteration order is fixed: category order first, then the order upstream
/// listed files within each category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    segments: BTreeMap<Category, Vec<ManifestFile>>,
}
impl Manifest {
    /// Append a file to the end of its category.
    pub fn push(&mut self, file: ManifestFile) {
        self.segments.entry(file.category).or_default().push(file);
    }

    /// Files of a single category, in upstream order.
    pub fn segment(&self, category: Category) -> &[ManifestFile] {
        self.segments.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// All files in manifest order.
    pub fn files(&self) -> impl Iterator<Item = &ManifestFile> + '_ {
        self.segments.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.segments.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
impl FromIterator<ManifestFile> for Manifest {
    fn from_iter<T: IntoIterator<Item = ManifestFile>>(iter: T) -> Self {
        let mut manifest = Manifest::default();
        for file in iter {
            manifest.push(file);
        }
        manifest
    }
}
impl IntoIterator for Manifest {
    type Item = ManifestFile;
    type IntoIter = std::iter::Flatten<std::collections::btree_map::IntoValues<Category, Vec<ManifestFile>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_values().flatten()
    }
}

/// Everything upstream reports about one cookbook version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDetail {
    pub name: String,
    pub version: String,
    pub manifest: Manifest,
    /// Dependency name mapped to its version constraint (e.g. `>= 1.0.0`).
    pub dependencies: BTreeMap<String, String>,
}
impl VersionDetail {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            manifest: Manifest::default(),
            dependencies: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, category: Category, path: impl Into<String>, url: impl Into<String>) -> Self {
        self.manifest.push(ManifestFile::new(category, path, url));
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>, constraint: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), constraint.into());
        self
    }

    /// `name/version`, the form used in logs and error messages.
    pub fn id(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}
