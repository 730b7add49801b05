//! Entry path validation.
//!
//! Upstream supplies the relative path of every file, so nothing stops a
//! registry from handing us `../../etc/passwd`. Entries are normalized here
//! before they reach the tar header.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path};

/// Validates and normalizes an archive entry path.
///
/// Rejects absolute paths, null bytes and any `..` component. A `..` is
/// refused even when it stays inside the archive, since the caller joins a
/// directory prefix first and a parent step would climb out of it. Redundant
/// separators and `.` components are dropped. The result always uses `/` as
/// separator.
///
/// # Examples
///
/// ```
/// use bodega_archive::validate_entry_path;
/// assert_eq!(validate_entry_path("apache2/recipes/default.rb").unwrap(), "apache2/recipes/default.rb");
/// assert_eq!(validate_entry_path("apache2/./templates//x.erb").unwrap(), "apache2/templates/x.erb");
/// assert!(validate_entry_path("../etc/passwd").is_err());
/// assert!(validate_entry_path("/etc/passwd").is_err());
/// ```
pub fn validate(path: &str) -> Result<String> {
    let invalid = || ErrorKind::InvalidPath(path.to_string());
    let mut components: Vec<&str> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate
                // names in anything C-based that later unpacks the archive.
                let Some(s) = s.to_str().filter(|s| !s.contains('\0')) else {
                    exn::bail!(invalid());
                };
                components.push(s);
            },
            Component::CurDir => {},
            Component::RootDir | Component::Prefix(_) | Component::ParentDir => exn::bail!(invalid()),
        }
    }
    match components.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(components.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("metadata.rb", "metadata.rb")]
    #[case("apache2/recipes/default.rb", "apache2/recipes/default.rb")]
    #[case("apache2/./recipes/default.rb", "apache2/recipes/default.rb")]
    #[case("apache2//templates/default/x.erb", "apache2/templates/default/x.erb")]
    #[case("apache2/recipes/", "apache2/recipes")]
    fn test_valid(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("/etc/passwd")]
    #[case("../escape")]
    #[case("apache2/../../escape")]
    #[case("apache2/../nginx/recipes/default.rb")]
    #[case("apache2/recipes/../attributes/default.rb")]
    #[case("apache2/a\0b")]
    fn test_invalid(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(p) if p == input));
    }
}
