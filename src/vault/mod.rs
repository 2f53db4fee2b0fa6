//! Encrypted credential store.
//!
//! Secrets referenced by `SENDPASS:` directives live in a single file
//! protected by a master passphrase:
//!
//! ```text
//! salt (32 bytes) || nonce (12) || AES-256-GCM( JSON entry array )
//! ```
//!
//! The key is PBKDF2-HMAC-SHA256 of the passphrase over the salt (100 000
//! rounds). Inside the JSON array each entry's secret is sealed a second
//! time under the same key and base64 encoded, so secrets are wrapped twice.
//! Both layers are part of the file format and must be kept.
//!
//! The salt is created with the store and reused by every save until the
//! master passphrase changes, which re-encrypts everything under a new salt.
//!
//! # Example
//!
//! ```no_run
//! use sshhop::CredentialStore;
//!
//! # fn example() -> Result<(), sshhop::StoreError> {
//! let mut store = CredentialStore::new("/tmp/passwords.enc");
//! store.initialize("master passphrase")?;
//! store.add("db", "production database", "hunter2")?;
//! store.save("master passphrase", None)?;
//!
//! let mut reopened = CredentialStore::new("/tmp/passwords.enc");
//! reopened.load("master passphrase")?;
//! assert_eq!(reopened.get("db")?, "hunter2");
//! # Ok(())
//! # }
//! ```

mod crypto;
mod error;

pub use crypto::{Salt, PBKDF2_ROUNDS, SALT_LEN};
pub use error::StoreError;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crypto::{generate_salt, StoreKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// Placeholder shown instead of a secret by [`CredentialStore::list`].
pub const MASKED_SECRET: &str = "***";

/// One stored credential.
///
/// `Debug` output never includes the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    /// Caller-chosen unique identifier (what `SENDPASS:` refers to).
    pub id: String,
    /// Free-form description.
    pub description: String,
    /// The secret, or [`MASKED_SECRET`] in listings.
    pub secret: Zeroizing<String>,
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("secret", &MASKED_SECRET)
            .finish()
    }
}

/// On-disk shape of an entry; `password` holds base64(nonce || ciphertext).
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    id: String,
    description: String,
    password: String,
}

/// Encrypted mapping from credential ID to secret.
///
/// The in-memory map and the file correspond one to one; entry order is
/// not significant anywhere.
pub struct CredentialStore {
    path: PathBuf,
    entries: HashMap<String, CredentialEntry>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl CredentialStore {
    /// An empty, unloaded store backed by `path`. Nothing is read yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: HashMap::new(),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create a new, empty store file under a fresh salt.
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if the file is already there.
    pub fn initialize(&mut self, passphrase: &str) -> Result<(), StoreError> {
        if self.exists() {
            return Err(StoreError::AlreadyExists(self.path.clone()));
        }
        self.entries.clear();
        self.save(passphrase, Some(&generate_salt()))?;
        debug!(path = %self.path.display(), "credential store initialized");
        Ok(())
    }

    /// Read and decrypt the store file.
    ///
    /// A missing file yields an empty store (first use). On any error the
    /// in-memory entries are left untouched and no plaintext is returned.
    ///
    /// # Errors
    ///
    /// [`StoreError::Format`] if the file is shorter than the salt,
    /// [`StoreError::Decryption`] for a wrong passphrase or corrupted data,
    /// [`StoreError::InvalidSecret`] if a secret is not UTF-8 text.
    pub fn load(&mut self, passphrase: &str) -> Result<(), StoreError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.entries.clear();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let (key, json) = open_blob(&data, passphrase)?;
        self.entries = decode_entries(&json, &key)?;
        debug!(entries = self.entries.len(), "credential store loaded");
        Ok(())
    }

    /// Encrypt and write the store.
    ///
    /// With `salt == None` the salt of the existing file is reused, or a new
    /// one is generated if there is no usable file. Every encryption uses a
    /// fresh nonce. The file is replaced atomically and is readable and
    /// writable by its owner only.
    pub fn save(&self, passphrase: &str, salt: Option<&Salt>) -> Result<(), StoreError> {
        let salt = match salt {
            Some(salt) => *salt,
            None => self.existing_salt().unwrap_or_else(generate_salt),
        };
        let key = StoreKey::derive(passphrase, &salt);

        let stored = self
            .entries
            .values()
            .map(|entry| -> Result<StoredEntry, StoreError> {
                Ok(StoredEntry {
                    id: entry.id.clone(),
                    description: entry.description.clone(),
                    password: STANDARD.encode(key.seal(entry.secret.as_bytes())?),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let json = Zeroizing::new(serde_json::to_vec_pretty(&stored)?);
        let sealed = key.seal(&json)?;

        let mut blob = Vec::with_capacity(salt.len() + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&sealed);
        write_private(&self.path, &blob)?;

        debug!(entries = stored.len(), "credential store saved");
        Ok(())
    }

    /// Add a credential.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] if `id` is already present.
    pub fn add(&mut self, id: &str, description: &str, secret: &str) -> Result<(), StoreError> {
        if self.entries.contains_key(id) {
            return Err(StoreError::Duplicate(id.to_string()));
        }
        self.entries.insert(
            id.to_string(),
            CredentialEntry {
                id: id.to_string(),
                description: description.to_string(),
                secret: Zeroizing::new(secret.to_string()),
            },
        );
        Ok(())
    }

    /// The secret stored under `id`.
    pub fn get(&self, id: &str) -> Result<&str, StoreError> {
        self.get_entry(id).map(|entry| entry.secret.as_str())
    }

    /// The full entry stored under `id`.
    pub fn get_entry(&self, id: &str) -> Result<&CredentialEntry, StoreError> {
        self.entries
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Remove the credential stored under `id`.
    pub fn remove(&mut self, id: &str) -> Result<(), StoreError> {
        self.entries
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// All entries with their secrets replaced by [`MASKED_SECRET`], sorted
    /// by ID.
    pub fn list(&self) -> Vec<CredentialEntry> {
        let mut listed: Vec<_> = self
            .entries
            .values()
            .map(|entry| CredentialEntry {
                id: entry.id.clone(),
                description: entry.description.clone(),
                secret: Zeroizing::new(MASKED_SECRET.to_string()),
            })
            .collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        listed
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no credentials.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-encrypt the whole store under a new passphrase and a new salt.
    ///
    /// The file is fully decrypted with `old` first; the in-memory entries
    /// are replaced by what the file holds, so unsaved changes are dropped.
    ///
    /// # Errors
    ///
    /// [`StoreError::IncorrectOldPassphrase`] if `old` does not decrypt the
    /// file, [`StoreError::NotInitialized`] if there is no file.
    pub fn change_master_passphrase(&mut self, old: &str, new: &str) -> Result<(), StoreError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotInitialized(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let (key, json) = open_blob(&data, old).map_err(|e| match e {
            StoreError::Decryption => StoreError::IncorrectOldPassphrase,
            other => other,
        })?;
        self.entries = decode_entries(&json, &key)?;

        self.save(new, Some(&generate_salt()))?;
        debug!("master passphrase changed");
        Ok(())
    }

    fn existing_salt(&self) -> Option<Salt> {
        let data = fs::read(&self.path).ok()?;
        data.get(..SALT_LEN)?.try_into().ok()
    }
}

/// Split `salt || sealed`, derive the key and open the outer layer.
fn open_blob(data: &[u8], passphrase: &str) -> Result<(StoreKey, Zeroizing<Vec<u8>>), StoreError> {
    if data.len() < SALT_LEN {
        return Err(StoreError::Format);
    }
    let (salt, sealed) = data.split_at(SALT_LEN);
    let salt: Salt = salt.try_into().map_err(|_| StoreError::Format)?;
    let key = StoreKey::derive(passphrase, &salt);
    let json = key.open(sealed)?;
    Ok((key, json))
}

/// Parse the entry array and open each entry's inner layer.
fn decode_entries(
    json: &[u8],
    key: &StoreKey,
) -> Result<HashMap<String, CredentialEntry>, StoreError> {
    let stored: Vec<StoredEntry> = serde_json::from_slice(json)?;

    let mut entries = HashMap::with_capacity(stored.len());
    for record in stored {
        let sealed = STANDARD.decode(&record.password)?;
        let plain = key.open(&sealed)?;
        let secret = String::from_utf8(plain.to_vec())
            .map_err(|_| StoreError::InvalidSecret(record.id.clone()))?;
        entries.insert(
            record.id.clone(),
            CredentialEntry {
                id: record.id,
                description: record.description,
                secret: Zeroizing::new(secret),
            },
        );
    }
    Ok(entries)
}

/// Replace `path` with `data` via a temp file in the same directory, owner
/// read/write only.
fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(0o600))?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
