// Preview library - ordered, in-memory list of produced clips
//
// Callers address entries by position. Positions shift down by one after a
// removal, so indices must be re-read after every mutation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use uuid::Uuid;

use super::errors::PreviewError;
use super::models::{ArtifactId, PreviewArtifact};
use super::utils::sanitize_file_name;

const HANDLE_SCHEME: &str = "preview://";

#[derive(Default)]
struct LibraryInner {
    entries: Vec<PreviewArtifact>,
    /// Playable-URL handles issued per artifact
    handles: HashMap<ArtifactId, String>,
}

#[derive(Default)]
pub struct PreviewLibrary {
    inner: Mutex<LibraryInner>,
}

impl PreviewLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, artifact: PreviewArtifact) {
        tracing::info!("[Library] + {} '{}'", artifact.id, artifact.title);
        self.inner.lock().entries.push(artifact);
    }

    /// Remove the entry at `index`. Out of range returns `false` and changes
    /// nothing. Any playable handle for the entry is released.
    pub fn remove_at(&self, index: usize) -> bool {
        let mut inner = self.inner.lock();
        if index >= inner.entries.len() {
            tracing::warn!(
                "[Library] remove_at({}) out of range (len {})",
                index,
                inner.entries.len()
            );
            return false;
        }

        let removed = inner.entries.remove(index);
        if let Some(handle) = inner.handles.remove(&removed.id) {
            tracing::debug!("[Library] Released {}", handle);
        }
        tracing::info!("[Library] - {} '{}'", removed.id, removed.title);
        true
    }

    pub fn get(&self, index: usize) -> Option<PreviewArtifact> {
        self.inner.lock().entries.get(index).cloned()
    }

    /// Read-only snapshot in display order
    pub fn all(&self) -> Vec<PreviewArtifact> {
        self.inner.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn index_of(&self, id: ArtifactId) -> Option<usize> {
        self.inner.lock().entries.iter().position(|a| a.id == id)
    }

    /// Playable-URL handle for the entry at `index`, issued once per entry
    pub fn playable_url(&self, index: usize) -> Option<String> {
        let mut inner = self.inner.lock();
        let id = inner.entries.get(index)?.id;
        let handle = inner
            .handles
            .entry(id)
            .or_insert_with(|| format!("{}{}", HANDLE_SCHEME, Uuid::new_v4()));
        Some(handle.clone())
    }

    /// Whether `url` still refers to an entry in the library
    pub fn is_live(&self, url: &str) -> bool {
        self.inner.lock().handles.values().any(|h| h == url)
    }

    /// Save the entry's bytes as `<dir>/<title>.mp3`
    pub fn export(&self, index: usize, dir: &Path) -> Result<PathBuf, PreviewError> {
        let artifact = self.get(index).ok_or_else(|| {
            PreviewError::Selection(format!("No library entry at position {}", index + 1))
        })?;

        std::fs::create_dir_all(dir)?;
        let path = dir.join(sanitize_file_name(&artifact.file_name()));
        std::fs::write(&path, &artifact.audio.bytes)?;
        tracing::info!("[Library] Saved {} to {}", artifact.id, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::models::AudioBlob;

    fn artifact(title: &str) -> PreviewArtifact {
        PreviewArtifact {
            id: ArtifactId::next(),
            title: title.to_string(),
            artist: "A".to_string(),
            thumbnail: String::new(),
            audio: AudioBlob::mp3(title.as_bytes().to_vec()),
        }
    }

    fn titles(library: &PreviewLibrary) -> Vec<String> {
        library.all().into_iter().map(|a| a.title).collect()
    }

    #[test]
    fn test_append_keeps_insertion_order() {
        let library = PreviewLibrary::new();
        library.append(artifact("one"));
        library.append(artifact("two"));
        assert_eq!(titles(&library), vec!["one", "two"]);
        assert_eq!(library.get(1).unwrap().title, "two");
        assert!(library.get(2).is_none());
    }

    #[test]
    fn test_remove_out_of_range_leaves_library_unchanged() {
        let library = PreviewLibrary::new();
        library.append(artifact("one"));
        assert!(!library.remove_at(1));
        assert!(!library.remove_at(usize::MAX));
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_remove_shifts_following_indices() {
        let library = PreviewLibrary::new();
        for t in ["a", "b", "c"] {
            library.append(artifact(t));
        }
        assert!(library.remove_at(0));
        assert_eq!(library.len(), 2);
        assert_eq!(library.get(0).unwrap().title, "b");
        assert_eq!(library.get(1).unwrap().title, "c");
    }

    #[test]
    fn test_remove_releases_handle() {
        let library = PreviewLibrary::new();
        library.append(artifact("a"));
        library.append(artifact("b"));

        let url = library.playable_url(0).unwrap();
        assert!(url.starts_with("preview://"));
        assert_eq!(library.playable_url(0).unwrap(), url);
        assert!(library.is_live(&url));

        let other = library.playable_url(1).unwrap();
        library.remove_at(0);
        assert!(!library.is_live(&url));
        assert!(library.is_live(&other));
        assert_eq!(library.playable_url(0).unwrap(), other);
    }

    #[test]
    fn test_export_writes_title_mp3() {
        let dir = tempfile::tempdir().unwrap();
        let library = PreviewLibrary::new();
        library.append(artifact("My/Song"));

        let path = library.export(0, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "My_Song.mp3");
        assert_eq!(std::fs::read(&path).unwrap(), b"My/Song");
        assert!(library.export(5, dir.path()).is_err());
    }
}
