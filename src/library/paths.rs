//! Locating completed content on this host.
//!
//! Clients report paths from their own point of view (often another container
//! or machine). Resolution tries an ordered list of deterministic rewrites and
//! keeps the first candidate the injected `exists` predicate accepts.

use std::path::{Path, PathBuf};

/// Staging folders clients download into, paired with where they move
/// finished content.
const STAGING_SWAPS: &[(&str, &str)] = &[
    ("incomplete", "complete"),
    ("incomplete", "completed"),
    ("downloading", "completed"),
    ("downloading", "complete"),
    ("intermediate", "complete"),
    ("temp", "complete"),
];

/// Completed-content folders commonly used under a downloads root.
const COMPLETE_DIRS: &[&str] = &["complete", "completed"];

/// What is known about one completed download's location.
#[derive(Debug, Clone, Default)]
pub struct PathQuery {
    /// Content or save path reported by the client.
    pub reported: Option<String>,
    /// Remote item name; usually the top-level file or folder name.
    pub name: String,
    pub category: Option<String>,
    /// Parent folder of the content: the client-reported save path, else the
    /// one recorded at grab time.
    pub save_path: Option<String>,
    /// Directory the client is configured to drop this media type into.
    pub client_directory: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    mappings: Vec<(String, String)>,
    downloads_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("content not found on this host; tried: {}", format_attempts(.attempted))]
pub struct Unresolved {
    pub attempted: Vec<PathBuf>,
}

fn format_attempts(attempted: &[PathBuf]) -> String {
    if attempted.is_empty() {
        return "(no candidate paths)".to_string();
    }
    attempted
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rewrites `path` through the first `(remote_prefix, local_prefix)` pair that
/// matches on a component boundary.
#[must_use]
pub fn apply_remote_mappings(path: &str, mappings: &[(String, String)]) -> Option<String> {
    mappings.iter().find_map(|(remote, local)| {
        let remote = remote.trim_end_matches(['/', '\\']);
        if remote.is_empty() {
            return None;
        }
        let rest = path.strip_prefix(remote)?;
        if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\')) {
            return None;
        }
        Some(format!("{}{rest}", local.trim_end_matches(['/', '\\'])))
    })
}

/// Replaces one staging component of `path` with its completed counterpart,
/// or with the category folder when one is known.
fn staging_swaps(path: &Path, category: Option<&str>) -> Vec<PathBuf> {
    let components: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let mut out = Vec::new();
    for (idx, component) in components.iter().enumerate() {
        let lower = component.to_lowercase();
        let replacements = STAGING_SWAPS
            .iter()
            .filter(|(staging, _)| *staging == lower)
            .map(|(_, done)| (*done).to_string())
            .chain(
                STAGING_SWAPS
                    .iter()
                    .any(|(staging, _)| *staging == lower)
                    .then(|| category.map(str::to_string))
                    .flatten(),
            );

        for replacement in replacements {
            let mut rebuilt = PathBuf::new();
            for (i, part) in components.iter().enumerate() {
                rebuilt.push(if i == idx { replacement.as_str() } else { part.as_str() });
            }
            out.push(rebuilt);
        }
    }
    out
}

impl PathResolver {
    #[must_use]
    pub fn new(mappings: Vec<(String, String)>, downloads_root: Option<PathBuf>) -> Self {
        Self {
            mappings,
            downloads_root,
        }
    }

    /// Every candidate in evaluation order, without duplicates: the reported
    /// path, its remote mapping, staging swaps of both, downloads-root
    /// conventions and finally the client's configured directory.
    #[must_use]
    pub fn candidates(&self, query: &PathQuery) -> Vec<PathBuf> {
        let mut list: Vec<PathBuf> = Vec::new();
        let category = query.category.as_deref().filter(|c| !c.trim().is_empty());
        let name = query.name.trim();

        let mut direct = Vec::new();
        if let Some(raw) = query.reported.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            direct.push(PathBuf::from(raw));
            if let Some(mapped) = apply_remote_mappings(raw, &self.mappings) {
                direct.push(PathBuf::from(mapped));
            }
        }

        // A save path is a parent folder; the content sits under the item name.
        if let Some(save) = query.save_path.as_deref().map(str::trim).filter(|p| !p.is_empty())
            && !name.is_empty()
        {
            let joined = Path::new(save).join(name);
            direct.push(joined.clone());
            if let Some(mapped) = apply_remote_mappings(&joined.to_string_lossy(), &self.mappings) {
                direct.push(PathBuf::from(mapped));
            }
        }

        list.extend(direct.iter().cloned());
        for path in &direct {
            list.extend(staging_swaps(path, category));
        }

        if let Some(root) = &self.downloads_root
            && !name.is_empty()
        {
            list.push(root.join(name));
            for dir in COMPLETE_DIRS {
                list.push(root.join(dir).join(name));
                if let Some(category) = category {
                    list.push(root.join(dir).join(category).join(name));
                }
            }
            if let Some(category) = category {
                list.push(root.join(category).join(name));
            }
        }

        if let Some(dir) = query
            .client_directory
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            && !name.is_empty()
        {
            list.push(Path::new(dir).join(name));
        }

        let mut seen = std::collections::HashSet::new();
        list.retain(|p| seen.insert(p.clone()));
        list
    }

    /// First candidate accepted by `exists`.
    pub fn resolve(
        &self,
        query: &PathQuery,
        exists: impl Fn(&Path) -> bool,
    ) -> Result<PathBuf, Unresolved> {
        let candidates = self.candidates(query);
        candidates
            .iter()
            .find(|p| exists(p))
            .cloned()
            .ok_or(Unresolved {
                attempted: candidates,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn resolver() -> PathResolver {
        PathResolver::new(
            vec![("/data/torrents".to_string(), "/mnt/nas/torrents".to_string())],
            Some(PathBuf::from("/downloads")),
        )
    }

    fn existing(paths: &[&str]) -> impl Fn(&Path) -> bool {
        let set: HashSet<PathBuf> = paths.iter().map(PathBuf::from).collect();
        move |p: &Path| set.contains(p)
    }

    #[test]
    fn test_apply_remote_mappings_respects_boundaries() {
        let mappings = vec![("/data/torrents/".to_string(), "/mnt/t".to_string())];
        assert_eq!(
            apply_remote_mappings("/data/torrents/movies/x.mkv", &mappings).as_deref(),
            Some("/mnt/t/movies/x.mkv")
        );
        assert_eq!(apply_remote_mappings("/data/torrents2/x", &mappings), None);
        assert_eq!(
            apply_remote_mappings("/data/torrents", &mappings).as_deref(),
            Some("/mnt/t")
        );
    }

    #[test]
    fn test_reported_path_wins_when_present() {
        let query = PathQuery {
            reported: Some("/data/torrents/movies/Movie.2020".to_string()),
            name: "Movie.2020".to_string(),
            ..Default::default()
        };
        let found = resolver()
            .resolve(
                &query,
                existing(&["/data/torrents/movies/Movie.2020", "/downloads/Movie.2020"]),
            )
            .unwrap();
        assert_eq!(found, PathBuf::from("/data/torrents/movies/Movie.2020"));
    }

    #[test]
    fn test_mapped_path_is_second() {
        let query = PathQuery {
            reported: Some("/data/torrents/movies/Movie.2020".to_string()),
            name: "Movie.2020".to_string(),
            ..Default::default()
        };
        let candidates = resolver().candidates(&query);
        assert_eq!(candidates[1], PathBuf::from("/mnt/nas/torrents/movies/Movie.2020"));
    }

    #[test]
    fn test_staging_folder_swapped_for_category() {
        let query = PathQuery {
            reported: Some("/usenet/incomplete/Show.S01E01".to_string()),
            name: "Show.S01E01".to_string(),
            category: Some("tv".to_string()),
            ..Default::default()
        };
        let found = resolver()
            .resolve(&query, existing(&["/usenet/tv/Show.S01E01"]))
            .unwrap();
        assert_eq!(found, PathBuf::from("/usenet/tv/Show.S01E01"));
    }

    #[test]
    fn test_downloads_root_conventions_and_client_dir() {
        let query = PathQuery {
            reported: None,
            name: "Movie.2020".to_string(),
            category: Some("movies".to_string()),
            save_path: None,
            client_directory: Some("/srv/movies".to_string()),
        };
        let r = resolver();
        assert_eq!(
            r.resolve(&query, existing(&["/downloads/complete/movies/Movie.2020"]))
                .unwrap(),
            PathBuf::from("/downloads/complete/movies/Movie.2020")
        );
        assert_eq!(
            r.resolve(&query, existing(&["/srv/movies/Movie.2020"])).unwrap(),
            PathBuf::from("/srv/movies/Movie.2020")
        );
    }

    #[test]
    fn test_save_path_is_only_a_parent() {
        let query = PathQuery {
            name: "Movie.2020".to_string(),
            save_path: Some("/data/torrents/movies".to_string()),
            ..Default::default()
        };
        let candidates = resolver().candidates(&query);
        assert!(!candidates.contains(&PathBuf::from("/data/torrents/movies")));
        assert_eq!(candidates[0], PathBuf::from("/data/torrents/movies/Movie.2020"));
        assert_eq!(
            candidates[1],
            PathBuf::from("/mnt/nas/torrents/movies/Movie.2020")
        );
    }

    #[test]
    fn test_unresolved_lists_every_attempt() {
        let query = PathQuery {
            reported: Some("/nowhere/Movie".to_string()),
            name: "Movie".to_string(),
            ..Default::default()
        };
        let err = resolver().resolve(&query, |_| false).unwrap_err();
        assert!(err.attempted.contains(&PathBuf::from("/nowhere/Movie")));
        assert!(err.attempted.contains(&PathBuf::from("/downloads/Movie")));
        assert!(err.to_string().contains("/nowhere/Movie"));

        let unique: HashSet<_> = err.attempted.iter().collect();
        assert_eq!(unique.len(), err.attempted.len());
    }
}
