//! A filesystem backed roster store.
//!
//! The [`DirectoryStore`] keeps one YAML file per record under a root
//! directory:
//!
//! ```text
//! root/
//!   config.toml
//!   children/1111111.yaml
//!   drivers/5555555.yaml
//!   vehicles/ABC123.yaml
//! ```
//!
//! The whole directory is loaded into [`Tables`] on open. Commits are written
//! through to disk before the in-memory tables are updated. If any file of a
//! commit cannot be written, the files already written are restored.

use std::{
    ffi::OsStr,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use walkdir::WalkDir;

use crate::{
    domain::{
        Change, Changeset, Config, ConfigError, Conflict, DuplicateId, DuplicateKey, Entity,
        EntityKey, Kind, Tables,
    },
    storage::{Store, StoreError, record},
};

/// A roster persisted as a directory of YAML files.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    config: Config,
    tables: Tables,
}

/// Errors opening or initializing a roster directory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Files that could not be parsed as records, while
    /// `allow_unrecognised` is off.
    UnrecognisedFiles(Vec<PathBuf>),

    /// Two files resolve to the same business key.
    DuplicateKey(#[from] DuplicateKey),

    /// Two files of the same kind carry the same id.
    DuplicateId(#[from] DuplicateId),

    /// The directory already contains a roster.
    AlreadyInitialized(PathBuf),

    /// The directory layout could not be created.
    Io(#[from] io::Error),

    /// The configuration could not be written.
    Config(#[from] ConfigError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognisedFiles(paths) => {
                write!(f, "Unrecognised files: ")?;
                for (i, path) in paths.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", path.display())?;
                }
                Ok(())
            }
            Self::DuplicateKey(err) => write!(f, "duplicate record: {err}"),
            Self::DuplicateId(err) => write!(f, "duplicate record id: {err}"),
            Self::AlreadyInitialized(root) => {
                write!(f, "roster already initialized in {}", root.display())
            }
            Self::Io(err) => write!(f, "failed to create roster directory: {err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl From<Conflict> for LoadError {
    fn from(err: Conflict) -> Self {
        match err {
            Conflict::DuplicateKey(err) => err.into(),
            Conflict::DuplicateId(err) => err.into(),
        }
    }
}

impl DirectoryStore {
    /// Opens the roster stored at `root`, loading every record.
    ///
    /// A missing or invalid `config.toml` falls back to the default
    /// configuration. A missing root is treated as an empty roster.
    ///
    /// # Errors
    ///
    /// If `allow_unrecognised` is `false` (the default), any YAML file that
    /// cannot be parsed as a record is an error. If it is `true`, such files
    /// are skipped. Two files resolving to the same key, or two files of the
    /// same kind carrying the same id, are always an error.
    pub fn open(root: PathBuf) -> Result<Self, LoadError> {
        let config = load_config(&root);
        let paths = collect_record_paths(&root);

        let (entities, unrecognised): (Vec<_>, Vec<_>) = paths
            .par_iter()
            .map(|(kind, path)| try_load_record(*kind, path))
            .partition(Result::is_ok);

        let entities: Vec<Entity> = entities.into_iter().filter_map(Result::ok).collect();
        let unrecognised: Vec<PathBuf> = unrecognised.into_iter().filter_map(Result::err).collect();

        if !config.allow_unrecognised && !unrecognised.is_empty() {
            return Err(LoadError::UnrecognisedFiles(unrecognised));
        }

        let mut changes = Changeset::new();
        for entity in entities {
            changes.insert(entity);
        }
        let mut tables = Tables::default();
        tables.apply(changes)?;

        tracing::debug!("Loaded {} records from {}", tables.len(), root.display());

        Ok(Self {
            root,
            config,
            tables,
        })
    }

    /// Creates the directory layout and a default `config.toml` at `root`.
    ///
    /// # Errors
    ///
    /// Fails if `root` already holds a `config.toml`, or if the directories
    /// or configuration cannot be written.
    pub fn init(root: &Path) -> Result<(), LoadError> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(LoadError::AlreadyInitialized(root.to_path_buf()));
        }

        for kind in Kind::ALL {
            fs::create_dir_all(root.join(kind_dir(kind)))?;
        }
        Config::default().save(&config_path)?;

        tracing::info!("Initialized roster in {}", root.display());
        Ok(())
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The file a record with `key` is stored in.
    #[must_use]
    pub fn path_for(&self, key: &EntityKey) -> PathBuf {
        record_path(&self.root, key)
    }

    /// Writes every change to a temporary sibling file, in order.
    ///
    /// On failure, any temporary files already written are removed.
    fn stage(&self, changes: &Changeset) -> Result<Vec<Step>, StoreError> {
        let mut steps = Vec::with_capacity(changes.len());

        for change in changes {
            match self.stage_one(change) {
                Ok(step) => steps.push(step),
                Err(e) => {
                    steps.into_iter().for_each(Step::discard);
                    return Err(e);
                }
            }
        }

        Ok(steps)
    }

    fn stage_one(&self, change: &Change) -> Result<Step, StoreError> {
        match change {
            Change::Insert(entity) | Change::Put(entity) => {
                let key = entity.key();
                let path = self.path_for(&key);
                let content =
                    record::encode(entity).map_err(|source| StoreError::Serialize { key, source })?;
                let staged = staging_path(&path);
                write_file(&staged, &content)?;
                Ok(Step::Replace { staged, path })
            }
            Change::Delete(key) => Ok(Step::Remove(self.path_for(key))),
        }
    }
}

impl Store for DirectoryStore {
    fn tables(&self) -> &Tables {
        &self.tables
    }

    fn commit(&mut self, changes: Changeset) -> Result<(), StoreError> {
        self.tables.check(&changes)?;

        let mut steps = self.stage(&changes)?.into_iter();
        let mut done = Vec::with_capacity(changes.len());
        while let Some(step) = steps.next() {
            match step.perform() {
                Ok(undo) => done.push(undo),
                Err(e) => {
                    tracing::warn!("Rolling back {} applied file changes: {e}", done.len());
                    steps.for_each(Step::discard);
                    done.into_iter().rev().for_each(Undo::revert);
                    return Err(e);
                }
            }
        }

        tracing::debug!("Committed {} changes to {}", changes.len(), self.root.display());
        self.tables.apply_unchecked(changes);
        Ok(())
    }
}

/// A staged filesystem operation.
enum Step {
    Replace { staged: PathBuf, path: PathBuf },
    Remove(PathBuf),
}

impl Step {
    /// Carries out the operation, returning how to reverse it.
    ///
    /// On failure the target is untouched and the staged file is removed.
    fn perform(self) -> Result<Undo, StoreError> {
        match self {
            Self::Replace { staged, path } => {
                let result = backup(&path).and_then(|undo| {
                    fs::rename(&staged, &path)
                        .map(|()| undo)
                        .map_err(|source| StoreError::Io {
                            path: path.clone(),
                            source,
                        })
                });
                if result.is_err() {
                    let _ = fs::remove_file(&staged);
                }
                result
            }
            Self::Remove(path) => {
                let undo = backup(&path)?;
                match fs::remove_file(&path) {
                    Err(source) if source.kind() != io::ErrorKind::NotFound => {
                        Err(StoreError::Io { path, source })
                    }
                    _ => Ok(undo),
                }
            }
        }
    }

    /// Drops the operation without touching its target.
    fn discard(self) {
        if let Self::Replace { staged, .. } = self {
            let _ = fs::remove_file(staged);
        }
    }
}

/// The reverse of a performed [`Step`].
enum Undo {
    /// Write back the content the file held before.
    Restore { path: PathBuf, content: Vec<u8> },
    /// Remove a file that did not exist before.
    Remove(PathBuf),
}

impl Undo {
    fn revert(self) {
        let (path, result) = match self {
            Self::Restore { path, content } => {
                let result = fs::write(&path, content);
                (path, result)
            }
            Self::Remove(path) => {
                let result = fs::remove_file(&path);
                (path, result)
            }
        };
        match result {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                tracing::error!("Failed to restore {}: {e}", path.display());
            }
            _ => {}
        }
    }
}

fn backup(path: &Path) -> Result<Undo, StoreError> {
    match fs::read(path) {
        Ok(content) => Ok(Undo::Restore {
            path: path.to_path_buf(),
            content,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Undo::Remove(path.to_path_buf())),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

const CONFIG_FILE: &str = "config.toml";
const RECORD_EXTENSION: &str = "yaml";

const fn kind_dir(kind: Kind) -> &'static str {
    match kind {
        Kind::Child => "children",
        Kind::Driver => "drivers",
        Kind::Vehicle => "vehicles",
    }
}

fn kind_from_dir(name: &OsStr) -> Option<Kind> {
    Kind::ALL
        .into_iter()
        .find(|kind| OsStr::new(kind_dir(*kind)) == name)
}

fn record_path(root: &Path, key: &EntityKey) -> PathBuf {
    root.join(kind_dir(key.kind()))
        .join(format!("{}.{RECORD_EXTENSION}", key.as_str()))
}

fn staging_path(path: &Path) -> PathBuf {
    path.with_extension(format!("{RECORD_EXTENSION}.tmp"))
}

fn write_file(path: &Path, content: &str) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, content).map_err(io_err)
}

fn load_config(root: &Path) -> Config {
    let path = root.join(CONFIG_FILE);
    Config::load(&path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {e}");
        Config::default()
    })
}

fn collect_record_paths(root: &Path) -> Vec<(Kind, PathBuf)> {
    WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension() == Some(OsStr::new(RECORD_EXTENSION)))
        .filter_map(|entry| {
            let kind = entry.path().parent()?.file_name().and_then(kind_from_dir)?;
            Some((kind, entry.into_path()))
        })
        .collect()
}

fn try_load_record(kind: Kind, path: &Path) -> Result<Entity, PathBuf> {
    let Some(stem) = path.file_stem().and_then(OsStr::to_str) else {
        return Err(path.to_path_buf());
    };

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("Failed to read {}: {e}", path.display());
            return Err(path.to_path_buf());
        }
    };

    match record::decode(kind, stem, &content) {
        Ok(entity) if entity.key().as_str() == stem => Ok(entity),
        Ok(entity) => {
            tracing::debug!(
                "Skipping {}: file name does not match normalized key {}",
                path.display(),
                entity.key()
            );
            Err(path.to_path_buf())
        }
        Err(e) => {
            tracing::debug!("Failed to load {} from {}: {e}", kind, path.display());
            Err(path.to_path_buf())
        }
    }
}
