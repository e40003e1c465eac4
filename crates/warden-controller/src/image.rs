//! Container image reference matching.
//!
//! A reference matches a repository when it starts with the repository
//! (optionally qualified by one of the default registries, e.g.
//! `docker.io/acme/app`) and the next character is end-of-string, `:`
//! (tag) or `@` (digest). `acme/app` therefore matches `acme/app:1.2` and
//! `docker.io/acme/app@sha256:..` but not `acme/application`.

use warden_core::{CurrentDigest, ImageDigest, Repository};

/// A reference that matched a repository, split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMatch<'a> {
    /// The matched name as written, including any registry qualifier.
    pub name: &'a str,
    /// Tag after `:`, if any.
    pub tag: Option<&'a str>,
    /// Raw text after `@`, if any. Not validated.
    pub digest: Option<&'a str>,
}

impl ImageMatch<'_> {
    /// Classify the reference for compliance analysis.
    ///
    /// A digest-qualified reference whose digest is malformed yields
    /// [`CurrentDigest::Unknown`].
    pub fn current_digest(&self) -> CurrentDigest {
        match self.digest {
            Some(raw) => ImageDigest::parse(raw)
                .map(CurrentDigest::Digest)
                .unwrap_or(CurrentDigest::Unknown),
            None => CurrentDigest::TagBased,
        }
    }

    /// The reference rewritten to `<name>@<digest>`, keeping the registry
    /// qualifier style and dropping any tag.
    pub fn pinned(&self, digest: &ImageDigest) -> String {
        format!("{}@{}", self.name, digest)
    }
}

/// Match `image` against `repository` and its registry-qualified forms.
pub fn match_repository<'a>(
    image: &'a str,
    repository: &Repository,
    default_registries: &[String],
) -> Option<ImageMatch<'a>> {
    let repo = repository.as_str();
    if image.starts_with(repo) {
        if let Some(m) = split_at_boundary(image, repo.len()) {
            return Some(m);
        }
    }
    default_registries.iter().find_map(|registry| {
        let rest = image.strip_prefix(registry.as_str())?.strip_prefix('/')?;
        if !rest.starts_with(repo) {
            return None;
        }
        split_at_boundary(image, image.len() - rest.len() + repo.len())
    })
}

fn split_at_boundary(image: &str, name_end: usize) -> Option<ImageMatch<'_>> {
    let (name, rest) = image.split_at(name_end);
    let (tag, digest) = match rest.chars().next() {
        None => (None, None),
        Some('@') => (None, Some(&rest[1..])),
        Some(':') => match rest[1..].split_once('@') {
            Some((tag, digest)) => (Some(tag), Some(digest)),
            None => (Some(&rest[1..]), None),
        },
        Some(_) => return None,
    };
    Some(ImageMatch { name, tag, digest })
}
