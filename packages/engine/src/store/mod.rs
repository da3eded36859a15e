//! On-disk certificate/key pair storage
//!
//! Pairs are only ever replaced together: both files are staged next to their
//! targets, the live pair is backed up, a journal marks the swap as in flight,
//! and the two renames happen last. A failed second rename rolls the first one
//! back. Writers hold an exclusive lock on a sibling lock file for the whole
//! replacement. A journal found by a reader that can take the lock means a
//! writer died mid-swap, and the backed up pair is restored before anything is
//! read. A reader that cannot take the lock leaves everything in place and
//! reads the backed up pair instead.

pub mod fs;

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

pub use self::fs::{OsFs, StoreFs, StoreLock};
use crate::error::{CertError, Result};
use crate::types::KeyMaterial;

/// Certificate file mode, world readable
pub const CERT_FILE_MODE: u32 = 0o644;
/// Private key file mode, owner read/write only
pub const KEY_FILE_MODE: u32 = 0o600;

const TEMP_MARKER: &str = ".tmp-";
const BACKUP_SUFFIX: &str = ".bak";
const JOURNAL_SUFFIX: &str = ".txn";
const LOCK_SUFFIX: &str = ".lock";

/// Locations of a certificate and its private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl CertificatePaths {
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
        }
    }

    /// `<base_dir>/<stem>.crt` and `<base_dir>/<stem>.key`
    pub fn from_stem(base_dir: impl AsRef<Path>, stem: &str) -> Self {
        let base = base_dir.as_ref();
        Self {
            cert: base.join(format!("{stem}.crt")),
            key: base.join(format!("{stem}.key")),
        }
    }

    /// Lock file guarding replacement of this pair
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        hidden_sibling(&self.cert, LOCK_SUFFIX)
    }

    fn journal(&self) -> PathBuf {
        hidden_sibling(&self.cert, JOURNAL_SUFFIX)
    }
}

/// Raw bytes of a stored pair; either side may be absent
#[derive(Default)]
pub struct StoredPair {
    pub cert: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
}

impl std::fmt::Debug for StoredPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredPair")
            .field("cert_bytes", &self.cert.as_ref().map(Vec::len))
            .field("key_bytes", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// What [`CertificateStore::recover`] found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No interrupted swap
    Clean,
    /// An interrupted swap was rolled back to the previous pair
    RolledBack,
    /// Another writer holds the pair; nothing was touched
    Busy,
}

/// Owns path conventions, permissions and atomic pair replacement
#[derive(Debug, Clone, Default)]
pub struct CertificateStore<F: StoreFs = OsFs> {
    fs: F,
}

impl CertificateStore<OsFs> {
    #[must_use]
    pub fn new() -> Self {
        Self { fs: OsFs }
    }
}

impl<F: StoreFs> CertificateStore<F> {
    pub fn with_fs(fs: F) -> Self {
        Self { fs }
    }

    pub fn into_fs(self) -> F {
        self.fs
    }

    /// Read one file
    ///
    /// Absence is `Ok(None)`. Directories, empty files and non-text content are
    /// [`CertError::InvalidFormat`]; unreadable files are
    /// [`CertError::PermissionDenied`].
    pub fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let metadata = match self.fs.metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CertError::from_io(path, e)),
        };
        if metadata.is_dir() {
            return Err(CertError::InvalidFormat(format!(
                "{} is a directory",
                path.display()
            )));
        }

        let bytes = match self.fs.read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CertError::from_io(path, e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(CertError::InvalidFormat(format!("{} is empty", path.display())));
        }
        if std::str::from_utf8(&bytes).is_err() {
            return Err(CertError::InvalidFormat(format!(
                "{} is not PEM text",
                path.display()
            )));
        }
        Ok(Some(bytes))
    }

    /// Recover from any interrupted swap, then read both files
    ///
    /// While another writer holds the pair nothing is modified and the pair
    /// that was live when its swap began is returned.
    pub fn read_pair(&self, paths: &CertificatePaths) -> Result<StoredPair> {
        match self.fs.try_lock(&paths.lock_file()) {
            Ok(Some(_lock)) => {
                if let Err(e) = self.recover_locked(paths) {
                    warn!("could not recover interrupted certificate swap: {e}");
                }
                self.read_live(paths)
            }
            Ok(None) => {
                debug!(cert = %paths.cert.display(), "pair is being replaced, reading previous pair");
                self.read_previous(paths)
            }
            Err(e) => {
                debug!("cannot lock {}: {e}", paths.lock_file().display());
                self.read_previous(paths)
            }
        }
    }

    fn read_live(&self, paths: &CertificatePaths) -> Result<StoredPair> {
        Ok(StoredPair {
            cert: self.read(&paths.cert)?,
            key: self.read(&paths.key)?,
        })
    }

    /// Read the backups named by an in-flight journal without touching anything
    ///
    /// Falls back to the live files when there is no journal, or when a backup
    /// vanished because the swap completed in the meantime.
    fn read_previous(&self, paths: &CertificatePaths) -> Result<StoredPair> {
        let journal = paths.journal();
        let backups = match self.fs.read(&journal) {
            Ok(bytes) => Backups::parse(&String::from_utf8_lossy(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self.read_live(paths),
            Err(e) => return Err(CertError::from_io(&journal, e)),
        };

        let mut pair = StoredPair::default();
        for (live, had_backup, slot) in [
            (&paths.cert, backups.cert, &mut pair.cert),
            (&paths.key, backups.key, &mut pair.key),
        ] {
            if had_backup {
                match self.read(&hidden_sibling(live, BACKUP_SUFFIX))? {
                    Some(bytes) => *slot = Some(bytes),
                    // Swap completed in the meantime
                    None => return self.read_live(paths),
                }
            }
        }
        Ok(pair)
    }

    /// Atomically replace the pair at `paths`
    pub fn write(&self, paths: &CertificatePaths, cert_pem: &[u8], key: &KeyMaterial) -> Result<()> {
        for dir in [parent_dir(&paths.cert), parent_dir(&paths.key)] {
            self.fs
                .create_dir_all(&dir)
                .map_err(|e| CertError::from_io(&dir, e))?;
        }
        let lock_file = paths.lock_file();
        let _lock = self
            .fs
            .lock(&lock_file)
            .map_err(|e| CertError::from_io(&lock_file, e))?;
        // Undo an earlier interrupted swap before starting a new one
        self.recover_locked(paths)?;

        let tmp_cert = temp_sibling(&paths.cert);
        let tmp_key = temp_sibling(&paths.key);
        let staged = self
            .fs
            .write_new(&tmp_cert, cert_pem, CERT_FILE_MODE)
            .map_err(|e| CertError::from_io(&tmp_cert, e))
            .and_then(|()| {
                self.fs
                    .write_new(&tmp_key, key.pem_bytes(), KEY_FILE_MODE)
                    .map_err(|e| CertError::from_io(&tmp_key, e))
            });
        if let Err(e) = staged {
            self.remove_quietly(&[&tmp_cert, &tmp_key]);
            return Err(e);
        }

        let journal = paths.journal();
        let backups = match self.begin_swap(paths, &journal) {
            Ok(backups) => backups,
            Err(e) => {
                self.remove_quietly(&[&tmp_cert, &tmp_key, &journal]);
                return Err(e);
            }
        };

        if let Err(e) = self.fs.rename(&tmp_cert, &paths.cert) {
            self.remove_quietly(&[&tmp_cert, &tmp_key]);
            self.finish_swap(paths, &journal);
            return Err(CertError::from_io(&paths.cert, e));
        }

        if let Err(e) = self.fs.rename(&tmp_key, &paths.key) {
            warn!(
                cert = %paths.cert.display(),
                "key rename failed after certificate rename, rolling back"
            );
            self.remove_quietly(&[&tmp_key]);
            match self.restore(&paths.cert, backups.cert) {
                Ok(()) => self.finish_swap(paths, &journal),
                // Journal stays so the next read completes the rollback
                Err(rollback) => warn!("rollback of {} failed: {rollback}", paths.cert.display()),
            }
            return Err(CertError::from_io(&paths.key, e));
        }

        for dir in [parent_dir(&paths.cert), parent_dir(&paths.key)] {
            if let Err(e) = self.fs.sync_dir(&dir) {
                debug!("directory sync of {} failed: {e}", dir.display());
            }
        }
        self.finish_swap(paths, &journal);
        info!(
            cert = %paths.cert.display(),
            key = %paths.key.display(),
            fingerprint = %key.public_key_fingerprint(),
            "stored certificate pair"
        );
        Ok(())
    }

    /// Roll back a swap interrupted before its journal was removed
    ///
    /// Returns [`Recovery::Busy`] without modifying anything while another
    /// writer holds the pair.
    pub fn recover(&self, paths: &CertificatePaths) -> Result<Recovery> {
        let lock_file = paths.lock_file();
        match self.fs.try_lock(&lock_file) {
            Ok(Some(_lock)) => self.recover_locked(paths),
            Ok(None) => Ok(Recovery::Busy),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Recovery::Clean),
            Err(e) => Err(CertError::from_io(&lock_file, e)),
        }
    }

    /// Caller holds the pair lock
    fn recover_locked(&self, paths: &CertificatePaths) -> Result<Recovery> {
        let journal = paths.journal();
        let contents = match self.fs.read(&journal) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Recovery::Clean),
            Err(e) => return Err(CertError::from_io(&journal, e)),
        };
        let backups = Backups::parse(&contents);
        warn!(
            cert = %paths.cert.display(),
            "found interrupted certificate swap, restoring previous pair"
        );

        self.restore(&paths.cert, backups.cert)
            .map_err(|e| CertError::from_io(&paths.cert, e))?;
        self.restore(&paths.key, backups.key)
            .map_err(|e| CertError::from_io(&paths.key, e))?;
        self.fs
            .remove(&journal)
            .map_err(|e| CertError::from_io(&journal, e))?;
        Ok(Recovery::RolledBack)
    }

    /// Remove staging files older than `older_than` left by interrupted writers
    pub fn sweep_orphans(&self, paths: &CertificatePaths, older_than: Duration) -> Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(UNIX_EPOCH);
        let mut removed = 0;

        for target in [&paths.cert, &paths.key] {
            let dir = parent_dir(target);
            let prefix = format!(".{}{TEMP_MARKER}", file_name(target));
            let entries = match self.fs.list_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CertError::from_io(&dir, e)),
            };
            for entry in entries {
                let is_orphan = entry
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix));
                let is_stale = self
                    .fs
                    .metadata(&entry)
                    .and_then(|m| m.modified())
                    .is_ok_and(|modified| modified <= cutoff);
                if is_orphan && is_stale && self.fs.remove(&entry).is_ok() {
                    debug!("removed orphaned staging file {}", entry.display());
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn begin_swap(&self, paths: &CertificatePaths, journal: &Path) -> Result<Backups> {
        let mut backups = Backups::default();
        for (live, flag) in [(&paths.cert, &mut backups.cert), (&paths.key, &mut backups.key)] {
            if self.fs.metadata(live).is_ok() {
                let backup = hidden_sibling(live, BACKUP_SUFFIX);
                self.fs
                    .link_or_copy(live, &backup)
                    .map_err(|e| CertError::from_io(&backup, e))?;
                *flag = true;
            }
        }
        self.fs
            .write_new(journal, backups.render().as_bytes(), KEY_FILE_MODE)
            .map_err(|e| CertError::from_io(journal, e))?;
        Ok(backups)
    }

    /// Put the backed up file back, or remove the live file when there was none
    fn restore(&self, live: &Path, had_backup: bool) -> io::Result<()> {
        if had_backup {
            let backup = hidden_sibling(live, BACKUP_SUFFIX);
            match self.fs.rename(&backup, live) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                other => other?,
            }
            // Renaming a hard link onto the same inode leaves both names behind
            match self.fs.remove(&backup) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        } else {
            match self.fs.remove(live) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        }
    }

    fn finish_swap(&self, paths: &CertificatePaths, journal: &Path) {
        self.remove_quietly(&[
            journal,
            &hidden_sibling(&paths.cert, BACKUP_SUFFIX),
            &hidden_sibling(&paths.key, BACKUP_SUFFIX),
        ]);
    }

    fn remove_quietly(&self, paths: &[&Path]) {
        for path in paths {
            match self.fs.remove(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!("could not remove {}: {e}", path.display()),
            }
        }
    }
}

/// Which live files existed, and were backed up, when a swap began
#[derive(Debug, Default, Clone, Copy)]
struct Backups {
    cert: bool,
    key: bool,
}

impl Backups {
    fn render(self) -> String {
        format!("cert_backup={}\nkey_backup={}\n", self.cert, self.key)
    }

    fn parse(contents: &str) -> Self {
        let mut backups = Self::default();
        for line in contents.lines() {
            match line.trim().split_once('=') {
                Some(("cert_backup", value)) => backups.cert = value == "true",
                Some(("key_backup", value)) => backups.key = value == "true",
                _ => {}
            }
        }
        backups
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn hidden_sibling(path: &Path, suffix: &str) -> PathBuf {
    parent_dir(path).join(format!(".{}{suffix}", file_name(path)))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    hidden_sibling(
        path,
        &format!("{TEMP_MARKER}{}-{nanos}", std::process::id()),
    )
}
