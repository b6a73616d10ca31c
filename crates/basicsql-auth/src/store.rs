//! Persisted username/salted-hash records (spec §4.6).
//!
//! Each record is `username`, a 16-byte random salt, and an Argon2 hash of
//! `salt || password`. `verify` recomputes the hash for the given password
//! and compares it to the stored one in constant time.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use argon2::Argon2;
use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::info;

use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"BSQU";
const VERSION: u16 = 1;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, Clone)]
struct UserRecord {
    username: String,
    salt: [u8; SALT_LEN],
    hash: [u8; HASH_LEN],
    created_at: DateTime<Utc>,
}

/// Persisted user store at `<root>/users.bin` (spec §6).
pub struct AuthStore {
    path: PathBuf,
    users: RwLock<HashMap<String, UserRecord>>,
}

impl AuthStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let path = root.as_ref().join("users.bin");
        let users = if path.exists() {
            decode_store(&fs::read(&path)?)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    /// Create a user record. Out-of-band administrative action only; there
    /// is no in-protocol account creation (spec §4.6).
    pub fn create_user(&self, username: &str, password: &str) -> Result<()> {
        let mut users = self.users.write().unwrap();
        if users.contains_key(username) {
            return Err(Error::AlreadyExists(username.to_string()));
        }
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let hash = derive_hash(password, &salt);
        users.insert(
            username.to_string(),
            UserRecord {
                username: username.to_string(),
                salt,
                hash,
                created_at: Utc::now(),
            },
        );
        persist(&self.path, &users)?;
        info!(username, "user created");
        Ok(())
    }

    /// Check `username`/`password` against the stored record, using a
    /// constant-time comparison of the derived hash bytes (spec §4.6).
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let users = self.users.read().unwrap();
        let Some(record) = users.get(username) else {
            return false;
        };
        let candidate = derive_hash(password, &record.salt);
        record.hash.ct_eq(&candidate).into()
    }

    pub fn user_count(&self) -> usize {
        self.users.read().unwrap().len()
    }
}

fn derive_hash(password: &str, salt: &[u8; SALT_LEN]) -> [u8; HASH_LEN] {
    let argon2 = Argon2::default();
    let mut output = [0u8; HASH_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut output)
        .expect("argon2 output buffer has a valid length");
    output
}

fn persist(path: &Path, users: &HashMap<String, UserRecord>) -> Result<()> {
    let tmp_path = path.with_extension("bin.tmp");
    fs::write(&tmp_path, encode_store(users))?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn encode_store(users: &HashMap<String, UserRecord>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&(users.len() as u32).to_le_bytes());

    let mut records: Vec<&UserRecord> = users.values().collect();
    records.sort_by(|a, b| a.username.cmp(&b.username));
    for record in records {
        let name_bytes = record.username.as_bytes();
        buf.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(name_bytes);
        buf.extend_from_slice(&record.created_at.timestamp().to_le_bytes());
        buf.extend_from_slice(&record.salt);
        buf.extend_from_slice(&record.hash);
    }
    buf
}

fn decode_store(bytes: &[u8]) -> Result<HashMap<String, UserRecord>> {
    if bytes.len() < 10 || &bytes[0..4] != MAGIC {
        return Err(Error::Corruption("bad magic in users.bin".into()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(Error::Corruption(format!("unsupported users.bin version {version}")));
    }
    let count = u32::from_le_bytes(bytes[6..10].try_into().unwrap()) as usize;

    let mut users = HashMap::new();
    let mut cursor = 10usize;
    for _ in 0..count {
        let name_len = read_u16(bytes, &mut cursor)?;
        let username = read_str(bytes, &mut cursor, name_len)?;
        let created_secs = read_i64(bytes, &mut cursor)?;
        let created_at = Utc
            .timestamp_opt(created_secs, 0)
            .single()
            .ok_or_else(|| Error::Corruption("invalid timestamp in users.bin".into()))?;
        let salt = read_array::<SALT_LEN>(bytes, &mut cursor)?;
        let hash = read_array::<HASH_LEN>(bytes, &mut cursor)?;
        users.insert(
            username.clone(),
            UserRecord { username, salt, hash, created_at },
        );
    }
    Ok(users)
}

fn read_u16(bytes: &[u8], cursor: &mut usize) -> Result<usize> {
    let end = *cursor + 2;
    let slice = bytes.get(*cursor..end).ok_or_else(|| Error::Corruption("truncated users.bin".into()))?;
    *cursor = end;
    Ok(u16::from_le_bytes(slice.try_into().unwrap()) as usize)
}

fn read_i64(bytes: &[u8], cursor: &mut usize) -> Result<i64> {
    let end = *cursor + 8;
    let slice = bytes.get(*cursor..end).ok_or_else(|| Error::Corruption("truncated users.bin".into()))?;
    *cursor = end;
    Ok(i64::from_le_bytes(slice.try_into().unwrap()))
}

fn read_str(bytes: &[u8], cursor: &mut usize, len: usize) -> Result<String> {
    let end = *cursor + len;
    let slice = bytes.get(*cursor..end).ok_or_else(|| Error::Corruption("truncated users.bin".into()))?;
    *cursor = end;
    String::from_utf8(slice.to_vec()).map_err(|_| Error::Corruption("non-UTF-8 username in users.bin".into()))
}

fn read_array<const N: usize>(bytes: &[u8], cursor: &mut usize) -> Result<[u8; N]> {
    let end = *cursor + N;
    let slice = bytes.get(*cursor..end).ok_or_else(|| Error::Corruption("truncated users.bin".into()))?;
    *cursor = end;
    Ok(slice.try_into().unwrap())
}
