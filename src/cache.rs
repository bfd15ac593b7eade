//! Persistent cache of parsed class definitions.
//!
//! Uses LMDB (via heed). Each archive is stored once, as JSON, under the
//! SHA-256 of its bytes, so an unchanged jar is never parsed twice and a
//! rebuilt jar at the same path never hits a stale entry.

use anyhow::{Context, Result};
use heed::types::Str;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::classfile::ClassDefinition;
use crate::index::IndexWarning;

pub const PARSED_JARS_DB: &str = "parsed_jars";
pub const JAR_PATHS_DB: &str = "jar_paths";

const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;
const DEFAULT_MAX_DBS: u32 = 8;

type StrDb = Database<Str, Str>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedJar {
    pub classes: Vec<ClassDefinition>,
    pub warnings: Vec<IndexWarning>,
}

#[derive(Debug)]
pub struct ClassCache {
    env: Arc<Env>,
    db_path: PathBuf,
    parsed_jars: StrDb,
    jar_paths: StrDb,
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub db_path: String,
    pub cached_jars: u64,
    pub known_paths: u64,
}

pub fn hash_content(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl ClassCache {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let env = Arc::new(open_env(&db_path)?);
        let mut wtxn = env.write_txn()?;
        let parsed_jars = env.create_database::<Str, Str>(&mut wtxn, Some(PARSED_JARS_DB))?;
        let jar_paths = env.create_database::<Str, Str>(&mut wtxn, Some(JAR_PATHS_DB))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            db_path,
            parsed_jars,
            jar_paths,
        })
    }

    pub fn get(&self, hash: &str) -> Result<Option<CachedJar>> {
        let rtxn = self.env.read_txn()?;
        let Some(raw) = self.parsed_jars.get(&rtxn, hash)? else {
            return Ok(None);
        };
        let jar = serde_json::from_str(raw)
            .with_context(|| format!("Failed to parse cached classes for jar: {}", hash))?;
        Ok(Some(jar))
    }

    pub fn put(&self, hash: &str, source: &Path, jar: &CachedJar) -> Result<()> {
        let json = serde_json::to_string(jar)?;
        let mut wtxn = self.env.write_txn()?;
        self.parsed_jars.put(&mut wtxn, hash, json.as_str())?;
        self.jar_paths
            .put(&mut wtxn, &*source.to_string_lossy(), hash)?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn clear(&self) -> Result<u64> {
        let mut wtxn = self.env.write_txn()?;
        let removed = self.parsed_jars.len(&wtxn)?;
        self.parsed_jars.clear(&mut wtxn)?;
        self.jar_paths.clear(&mut wtxn)?;
        wtxn.commit()?;
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let rtxn = self.env.read_txn()?;
        Ok(CacheStats {
            db_path: self.db_path.to_string_lossy().to_string(),
            cached_jars: table_len(&self.parsed_jars, &rtxn)?,
            known_paths: table_len(&self.jar_paths, &rtxn)?,
        })
    }
}

fn open_env(db_path: &Path) -> Result<Env> {
    let mut options = EnvOpenOptions::new();
    options.map_size(DEFAULT_MAP_SIZE);
    options.max_dbs(DEFAULT_MAX_DBS);
    // SAFETY: We do not use NO_LOCK and keep default LMDB locking guarantees.
    // NO_SUB_DIR keeps the cache a single file at the configured path.
    unsafe {
        options.flags(EnvFlags::NO_SUB_DIR);
        options
            .open(db_path)
            .with_context(|| format!("Failed to create/open cache env: {}", db_path.display()))
    }
}

fn table_len(db: &StrDb, rtxn: &RoTxn<'_>) -> Result<u64> {
    let mut count = 0u64;
    for item in db.iter(rtxn)? {
        let _ = item?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "jar_mapper_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    fn sample_jar() -> CachedJar {
        CachedJar {
            classes: vec![ClassDefinition {
                name: "a/B".to_string(),
                access: 1,
                signature: None,
                super_name: Some("java/lang/Object".to_string()),
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                inner_classes: Vec::new(),
            }],
            warnings: vec![IndexWarning {
                class: "broken.class".to_string(),
                message: "bad magic number".to_string(),
            }],
        }
    }

    #[test]
    fn cache_round_trips_parsed_classes() -> Result<()> {
        let db_path = temp_path("cache.lmdb");
        let cache = ClassCache::open(db_path.clone())?;
        let hash = hash_content(b"jar bytes");
        assert!(cache.get(&hash)?.is_none());

        cache.put(&hash, Path::new("/tmp/in.jar"), &sample_jar())?;
        assert_eq!(cache.get(&hash)?, Some(sample_jar()));

        let stats = cache.stats()?;
        assert_eq!(stats.cached_jars, 1);
        assert_eq!(stats.known_paths, 1);

        assert_eq!(cache.clear()?, 1);
        assert!(cache.get(&hash)?.is_none());

        drop(cache);
        let _ = std::fs::remove_file(&db_path);
        let mut lock = db_path.into_os_string();
        lock.push("-lock");
        let _ = std::fs::remove_file(PathBuf::from(lock));
        Ok(())
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        let hash = hash_content(b"");
        assert_eq!(hash.len(), 64);
        assert!(hash.starts_with("e3b0c442"));
        assert_ne!(hash, hash_content(b"x"));
    }
}
