use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;

use super::capabilities::MediaProbe;
use super::error::PipelineError;
use super::model::MediaHandle;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg", "flac"];

/// Eligible background tracks of one library directory, sorted by path so
/// a seeded pick is reproducible.
#[derive(Debug, Clone)]
pub struct AudioLibrary {
    dir: PathBuf,
    tracks: Vec<PathBuf>,
}

impl AudioLibrary {
    /// List eligible files. A missing directory is an empty library.
    pub fn scan(dir: &Path) -> Result<Self, PipelineError> {
        let mut tracks = Vec::new();
        if dir.is_dir() {
            let entries = std::fs::read_dir(dir).map_err(|e| {
                PipelineError::Input(format!(
                    "cannot read audio library {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() && is_audio_file(&path) {
                    tracks.push(path);
                }
            }
        }
        tracks.sort();
        Ok(Self {
            dir: dir.to_path_buf(),
            tracks,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[cfg(test)]
    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn ensure_not_empty(&self) -> Result<(), PipelineError> {
        if self.tracks.is_empty() {
            return Err(PipelineError::EmptyLibrary(self.dir.display().to_string()));
        }
        Ok(())
    }

    /// Uniform choice among the eligible tracks.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&Path, PipelineError> {
        self.tracks
            .choose(rng)
            .map(PathBuf::as_path)
            .ok_or_else(|| PipelineError::EmptyLibrary(self.dir.display().to_string()))
    }

    pub async fn select<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        probe: &dyn MediaProbe,
    ) -> Result<MediaHandle, PipelineError> {
        let path = self.pick(rng)?.to_path_buf();
        let handle = probe.probe(&path).await?;
        if !handle.has_audio {
            return Err(PipelineError::Input(format!(
                "background track {} has no audio stream",
                path.display()
            )));
        }
        Ok(handle)
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::fs;

    #[test]
    fn scan_filters_by_extension_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.WAV", "notes.txt", "c.flac"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.mp3")).unwrap();

        let library = AudioLibrary::scan(dir.path()).unwrap();
        let names: Vec<_> = library
            .tracks()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.WAV", "b.mp3", "c.flac"]);
    }

    #[test]
    fn missing_directory_is_an_empty_library() {
        let dir = tempfile::tempdir().unwrap();
        let library = AudioLibrary::scan(&dir.path().join("absent")).unwrap();
        assert!(library.is_empty());
        assert!(matches!(
            library.ensure_not_empty(),
            Err(PipelineError::EmptyLibrary(_))
        ));
    }

    #[test]
    fn seeded_pick_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..8 {
            fs::write(dir.path().join(format!("track{i}.mp3")), b"x").unwrap();
        }
        let library = AudioLibrary::scan(dir.path()).unwrap();
        let first = library
            .pick(&mut StdRng::seed_from_u64(42))
            .unwrap()
            .to_path_buf();
        let second = library
            .pick(&mut StdRng::seed_from_u64(42))
            .unwrap()
            .to_path_buf();
        assert_eq!(first, second);
    }
}
