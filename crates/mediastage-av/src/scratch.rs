//! Scratch directory and staged file lifecycle.
//!
//! A [`ScratchDir`] hands out collision-free paths under a single root and
//! refuses to delete anything that is not a strict descendant of that root.
//! Every path it allocates is wrapped in a [`StagedFile`], which removes the
//! file exactly once: on [`StagedFile::release`] or, failing that, on drop.

use std::path::{Component, Path, PathBuf};

use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{Error, Result};

/// Attempts at finding an unused name before giving up.
const MAX_ALLOCATION_ATTEMPTS: usize = 8;

/// Process-owned scratch directory.
///
/// Construct one at startup and share it (behind an `Arc`) with every
/// pipeline invocation. The directory is created lazily on first use and
/// is never cleared, since other instances may be using it concurrently.
///
/// # Example
///
/// ```no_run
/// use mediastage_av::ScratchDir;
///
/// # async fn example() -> mediastage_av::Result<()> {
/// let scratch = ScratchDir::new(std::env::temp_dir().join("mediastage"));
/// let staged = scratch.write("input.mov", b"...").await?;
/// println!("staged at {}", staged.path().display());
/// staged.release();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScratchDir {
    configured: PathBuf,
    root: OnceCell<PathBuf>,
}

impl ScratchDir {
    /// Create a handle for the given directory. Nothing is touched on disk.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            configured: dir.into(),
            root: OnceCell::new(),
        }
    }

    /// The directory as configured (before canonicalization).
    pub fn configured_path(&self) -> &Path {
        &self.configured
    }

    /// The scratch root, creating it on first call.
    pub async fn root(&self) -> Result<&Path> {
        let root = self
            .root
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.configured).await?;
                let canonical = tokio::fs::canonicalize(&self.configured).await?;
                tracing::debug!("Scratch directory ready at {}", canonical.display());
                Ok::<_, Error>(canonical)
            })
            .await?;
        Ok(root.as_path())
    }

    /// Allocate a fresh path whose file name ends with `suffix_hint`.
    ///
    /// The file itself is not created; the caller (or the external tool)
    /// writes to it. `suffix_hint` must be a plain file name such as
    /// `output.mp4`; anything with a path separator is rejected.
    pub async fn allocate(&self, suffix_hint: &str) -> Result<StagedFile> {
        validate_suffix(suffix_hint)?;
        let root = self.root().await?;

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let path = root.join(unique_name(suffix_hint));
            if !tokio::fs::try_exists(&path).await? {
                tracing::trace!("Allocated scratch path {}", path.display());
                return Ok(StagedFile::new(path, root.to_path_buf()));
            }
        }

        Err(Error::InvalidInput(format!(
            "could not allocate a unique scratch path for {suffix_hint:?}"
        )))
    }

    /// Allocate a path and write `data` to it.
    pub async fn write(&self, suffix_hint: &str, data: &[u8]) -> Result<StagedFile> {
        let staged = self.allocate(suffix_hint).await?;
        // On failure the staged file is dropped, which removes any partial write.
        tokio::fs::write(staged.path(), data).await?;
        Ok(staged)
    }

    /// Release a staged file allocated by this scratch directory.
    pub fn release(&self, file: StagedFile) {
        if !self.contains(file.path()) {
            tracing::error!(
                "Refusing to release {}: not under scratch directory {}",
                file.path().display(),
                self.configured.display()
            );
            let _ = file.keep();
            return;
        }
        file.release();
    }

    /// Delete a scratch path by name.
    ///
    /// Paths outside the scratch directory are never deleted; the attempt
    /// is logged and reported as [`Error::OutsideScratch`]. A missing file
    /// is not an error.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        if !self.contains(path) {
            tracing::error!(
                "Refusing to delete {}: not under scratch directory {}",
                path.display(),
                self.configured.display()
            );
            return Err(Error::outside_scratch(path));
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::trace!("Removed scratch path {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `path` is a strict descendant of the scratch directory.
    pub fn contains(&self, path: &Path) -> bool {
        if let Some(root) = self.root.get() {
            if is_descendant(root, path) {
                return true;
            }
        }
        is_descendant(&self.configured, path)
    }
}

/// A file path owned by exactly one invocation.
///
/// The file is removed when the value is released or dropped. Removal
/// failures are logged and never surface as errors.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    scope: PathBuf,
    released: bool,
}

impl StagedFile {
    fn new(path: PathBuf, scope: PathBuf) -> Self {
        Self {
            path,
            scope,
            released: false,
        }
    }

    /// Path of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the file is scoped to.
    pub fn scope(&self) -> &Path {
        &self.scope
    }

    /// Remove the file now.
    pub fn release(mut self) {
        self.remove_now();
    }

    /// Detach the file from this guard and return its path.
    ///
    /// The file will no longer be removed automatically; whoever holds the
    /// path is responsible for deleting it (see [`ScratchDir::remove`]).
    pub fn keep(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.path)
    }

    fn remove_now(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if !is_descendant(&self.scope, &self.path) {
            tracing::error!(
                "Refusing to delete {}: not under scratch directory {}",
                self.path.display(),
                self.scope.display()
            );
            return;
        }

        // Blocking on purpose: this also runs from `Drop`, where nothing can
        // be awaited, and a single unlink does not stall the worker.
        let removed = match std::fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&self.path),
            _ => std::fs::remove_file(&self.path),
        };
        match removed {
            Ok(()) => tracing::trace!("Removed staged file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove staged file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.remove_now();
    }
}

fn unique_name(suffix_hint: &str) -> String {
    let token = Uuid::new_v4().simple();
    if suffix_hint.is_empty() {
        token.to_string()
    } else {
        format!("{token}-{suffix_hint}")
    }
}

fn validate_suffix(suffix_hint: &str) -> Result<()> {
    if suffix_hint.is_empty() {
        return Ok(());
    }

    let mut components = Path::new(suffix_hint).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !suffix_hint.contains(['/', '\\']);

    if plain {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "scratch file suffix must be a plain file name, got {suffix_hint:?}"
        )))
    }
}

fn is_descendant(root: &Path, path: &Path) -> bool {
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
    {
        return false;
    }
    path != root && path.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn root_created_lazily() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("scratch");
        let scratch = ScratchDir::new(&dir);
        assert!(!dir.exists());

        scratch.root().await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn existing_files_survive_startup() {
        let tmp = tempfile::tempdir().unwrap();
        let unrelated = tmp.path().join("other-instance.bin");
        std::fs::write(&unrelated, b"keep me").unwrap();

        let scratch = ScratchDir::new(tmp.path());
        let staged = scratch.allocate("out.bin").await.unwrap();
        staged.release();

        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn allocate_under_root_with_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path());
        let staged = scratch.allocate("output.mp4").await.unwrap();

        let root = scratch.root().await.unwrap();
        assert!(staged.path().starts_with(root));
        let name = staged.path().file_name().unwrap().to_string_lossy();
        assert!(name.ends_with("-output.mp4"), "unexpected name {name}");
        assert!(!staged.path().exists());
    }

    #[tokio::test]
    async fn allocate_rejects_path_like_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path());

        for bad in ["../escape.bin", "nested/out.bin", "..", "/etc/passwd"] {
            let result = scratch.allocate(bad).await;
            assert!(
                matches!(result, Err(Error::InvalidInput(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_are_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = Arc::new(ScratchDir::new(tmp.path()));

        let handles: Vec<_> = (0..256)
            .map(|_| {
                let scratch = Arc::clone(&scratch);
                tokio::spawn(async move { scratch.allocate("out.bin").await.unwrap().keep() })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }
        assert_eq!(seen.len(), 256);
    }

    #[tokio::test]
    async fn write_then_release_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path());
        let staged = scratch.write("in.bin", b"abc").await.unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");

        scratch.release(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path());
        let path = {
            let staged = scratch.write("in.bin", b"abc").await.unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn release_of_never_created_file_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path());
        let staged = scratch.allocate("never.bin").await.unwrap();
        staged.release();
    }

    #[tokio::test]
    async fn release_refuses_file_from_other_scratch() {
        let tmp = tempfile::tempdir().unwrap();
        let a = ScratchDir::new(tmp.path().join("a"));
        let b = ScratchDir::new(tmp.path().join("b"));
        b.root().await.unwrap();

        let staged = a.write("foreign.bin", b"abc").await.unwrap();
        let path = staged.path().to_path_buf();

        b.release(staged);
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn release_removes_directory_left_at_path() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path());
        let staged = scratch.allocate("out.bin").await.unwrap();
        let path = staged.path().to_path_buf();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("segment.ts"), b"x").unwrap();

        scratch.release(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn keep_detaches_file() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path());
        let path = scratch.write("kept.bin", b"x").await.unwrap().keep();
        assert!(path.exists());

        scratch.remove(&path).await.unwrap();
        assert!(!path.exists());
        // Second removal is a no-op.
        scratch.remove(&path).await.unwrap();
    }

    #[tokio::test]
    async fn remove_refuses_outside_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch_dir = tmp.path().join("scratch");
        let outside = tmp.path().join("precious.txt");
        std::fs::write(&outside, b"do not delete").unwrap();

        let scratch = ScratchDir::new(&scratch_dir);
        scratch.root().await.unwrap();

        let result = scratch.remove(&outside).await;
        assert!(matches!(result, Err(Error::OutsideScratch { .. })));
        assert!(outside.exists());

        let sneaky = scratch_dir.join("..").join("precious.txt");
        let result = scratch.remove(&sneaky).await;
        assert!(matches!(result, Err(Error::OutsideScratch { .. })));
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn remove_refuses_root_itself() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path());
        let root = scratch.root().await.unwrap().to_path_buf();

        assert!(scratch.remove(&root).await.is_err());
        assert!(root.is_dir());
    }

    #[test]
    fn descendant_check() {
        let root = Path::new("/tmp/scratch");
        assert!(is_descendant(root, Path::new("/tmp/scratch/a.bin")));
        assert!(!is_descendant(root, Path::new("/tmp/scratch")));
        assert!(!is_descendant(root, Path::new("/tmp/scratch-other/a.bin")));
        assert!(!is_descendant(root, Path::new("/tmp/scratch/../a.bin")));
        assert!(!is_descendant(root, Path::new("/etc/passwd")));
    }
}
