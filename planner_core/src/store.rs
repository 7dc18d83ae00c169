//! Plan storage with transactional writes and file locking.
//!
//! A store hands out a `MemoryRepository` for reading or for a
//! load-modify-save transaction. Changes are committed only when the
//! closure returns `Ok`, so a failed operation leaves nothing behind.

use crate::repository::MemoryRepository;
use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Read and transactional access to the plan repository
pub trait UnitOfWork {
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&MemoryRepository) -> Result<T>;

    /// Run `f` against a working copy; commit it only if `f` succeeds
    fn transact<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut MemoryRepository) -> Result<T>;
}

/// In-process store, mostly for tests and embedding
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    repo: MemoryRepository,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository(&self) -> &MemoryRepository {
        &self.repo
    }
}

impl UnitOfWork for MemoryStore {
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&MemoryRepository) -> Result<T>,
    {
        f(&self.repo)
    }

    fn transact<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut MemoryRepository) -> Result<T>,
    {
        let mut working = self.repo.clone();
        let value = f(&mut working)?;
        self.repo = working;
        Ok(value)
    }
}

/// JSON file store
///
/// Writers hold an exclusive lock on `<path>.lock` across the whole
/// load-modify-save cycle; readers take a shared lock on the same file.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn open_lock(&self) -> Result<File> {
        self.ensure_parent_dir()?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.lock_path())?;
        Ok(file)
    }

    /// Load the repository without taking the lock
    ///
    /// A missing file is an empty repository. A file that does not parse is
    /// an error: silently starting over would drop every plan on the next
    /// save.
    fn load_unlocked(&self) -> Result<MemoryRepository> {
        if !self.path.exists() {
            tracing::info!("No plan store at {:?}, starting empty", self.path);
            return Ok(MemoryRepository::new());
        }

        let mut contents = String::new();
        File::open(&self.path)?.read_to_string(&mut contents)?;
        if contents.trim().is_empty() {
            return Ok(MemoryRepository::new());
        }

        match serde_json::from_str::<MemoryRepository>(&contents) {
            Ok(repo) => {
                tracing::debug!(
                    "Loaded {} entities from {:?}",
                    repo.entity_count(),
                    self.path
                );
                Ok(repo)
            }
            Err(e) => {
                tracing::warn!("Plan store {:?} is corrupted: {}", self.path, e);
                Err(Error::Internal(format!(
                    "Plan store {} is corrupted: {}",
                    self.path.display(),
                    e
                )))
            }
        }
    }

    /// Write atomically: temp file in the same directory, fsync, rename
    fn save_unlocked(&self, repo: &MemoryRepository) -> Result<()> {
        self.ensure_parent_dir()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = NamedTempFile::new_in(dir)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(repo)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} entities to {:?}", repo.entity_count(), self.path);
        Ok(())
    }
}

impl UnitOfWork for FileStore {
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&MemoryRepository) -> Result<T>,
    {
        let lock = self.open_lock()?;
        lock.lock_shared()?;
        let loaded = self.load_unlocked();
        lock.unlock()?;
        f(&loaded?)
    }

    fn transact<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut MemoryRepository) -> Result<T>,
    {
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;

        let outcome = self.load_unlocked().and_then(|mut repo| {
            let value = f(&mut repo)?;
            self.save_unlocked(&repo)?;
            Ok(value)
        });

        lock.unlock()?;
        outcome
    }
}
