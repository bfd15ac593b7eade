use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::store::MappingSaveParameters;

pub const PROFILE_ENV: &str = "JAR_MAPPER_PROFILE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProfile {
    pub id: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub services: BTreeMap<String, ServiceProfile>,
    pub mapping_save_parameters: MappingSaveParameters,
}

impl Profile {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse profile")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {}", path.display()))?;
        Self::parse(&json).with_context(|| format!("Invalid profile: {}", path.display()))
    }
}

pub fn resolve_profile(cli: &Cli) -> Result<Profile> {
    if let Some(p) = cli.profile.as_deref() {
        return Profile::load(p);
    }

    if let Ok(p) = env::var(PROFILE_ENV) {
        return Profile::load(Path::new(&p));
    }

    if let Some(default_path) = default_profile_path().filter(|p| p.exists()) {
        debug!("using profile {}", default_path.display());
        return Profile::load(&default_path);
    }

    Ok(Profile::default())
}

fn default_profile_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jar-mapper").join("profile.json"))
}

pub fn resolve_cache_path(cli: &Cli) -> Result<Option<PathBuf>> {
    if cli.no_cache {
        return Ok(None);
    }
    if let Some(p) = cli.cache.clone() {
        return Ok(Some(p));
    }
    Ok(Some(jar_mapper_home()?.join("classes.lmdb")))
}

pub fn clear_cache(cache_path: &Path) -> Result<()> {
    remove_file_if_exists(cache_path, "cache")?;
    remove_file_if_exists(&lmdb_lock_path(cache_path), "cache lock")?;
    Ok(())
}

fn jar_mapper_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("jar-mapper"))
}

fn lmdb_lock_path(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_os_string();
    os.push("-lock");
    PathBuf::from(os)
}

fn remove_file_if_exists(path: &Path, kind: &str) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {kind} file: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MappingFileNameFormat;
    use clap::Parser;

    #[test]
    fn empty_profile_uses_defaults() -> Result<()> {
        let profile = Profile::parse("{}")?;
        assert_eq!(profile, Profile::default());
        assert_eq!(
            profile.mapping_save_parameters.file_name_format,
            MappingFileNameFormat::ByDeobf
        );
        Ok(())
    }

    #[test]
    fn profile_reads_services_and_save_parameters() -> Result<()> {
        let profile = Profile::parse(
            r#"{
                "services": {
                    "name_proposal": { "id": "example:proposer", "args": { "depth": "2" } },
                    "jar_indexer": { "id": "example:indexer" }
                },
                "mapping_save_parameters": { "file_name_format": "by_obf" }
            }"#,
        )?;
        assert_eq!(
            profile.mapping_save_parameters.file_name_format,
            MappingFileNameFormat::ByObf
        );
        let proposer = &profile.services["name_proposal"];
        assert_eq!(proposer.id, "example:proposer");
        assert_eq!(proposer.args.get("depth").map(String::as_str), Some("2"));
        assert!(profile.services["jar_indexer"].args.is_empty());
        assert!(!profile.services.contains_key("missing"));

        assert!(Profile::parse(r#"{"mapping_save_parameters": {"file_name_format": "sideways"}}"#).is_err());
        Ok(())
    }

    #[test]
    fn cache_path_respects_flags() -> Result<()> {
        let cli = Cli::parse_from(["jar-mapper", "--no-cache", "stats"]);
        assert_eq!(resolve_cache_path(&cli)?, None);

        let cli = Cli::parse_from(["jar-mapper", "--cache", "/tmp/x.lmdb", "stats"]);
        assert_eq!(resolve_cache_path(&cli)?, Some(PathBuf::from("/tmp/x.lmdb")));
        Ok(())
    }

    #[test]
    fn lock_path_sits_next_to_cache() {
        assert_eq!(
            lmdb_lock_path(Path::new("/tmp/classes.lmdb")),
            PathBuf::from("/tmp/classes.lmdb-lock")
        );
    }
}
