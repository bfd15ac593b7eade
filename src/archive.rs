use anyhow::{Context, Result};
use log::{debug, info, warn};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::cache::{CachedJar, ClassCache, hash_content};
use crate::classfile::{ClassDefinition, read_class};
use crate::index::{IndexWarning, JarIndex};

#[derive(Debug)]
pub struct ParsedJar {
    pub path: PathBuf,
    pub hash: String,
    pub classes: Vec<ClassDefinition>,
    pub warnings: Vec<IndexWarning>,
}

struct RawClass {
    name: String,
    bytes: Vec<u8>,
}

impl ParsedJar {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_cached(path, None)
    }

    pub fn open_cached(path: &Path, cache: Option<&ClassCache>) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open jar: {}", path.display()))?;
        // SAFETY: The file is opened read-only and remains valid for the lifetime of the mmap.
        // The mmap is dropped before the file, ensuring memory safety.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to mmap jar: {}", path.display()))?;
        let hash = hash_content(&mmap);

        if let Some(cache) = cache {
            match cache.get(&hash) {
                Ok(Some(cached)) => {
                    debug!("cache hit for {} ({})", path.display(), hash);
                    return Ok(Self {
                        path: path.to_path_buf(),
                        hash,
                        classes: cached.classes,
                        warnings: cached.warnings,
                    });
                }
                Ok(None) => {}
                Err(err) => warn!("ignoring class cache: {err:#}"),
            }
        }

        let raw = read_class_entries(&mmap, path)?;
        let parsed: Vec<Result<ClassDefinition, IndexWarning>> = raw
            .par_iter()
            .map(|entry| {
                read_class(&entry.bytes).map_err(|err| IndexWarning {
                    class: entry.name.clone(),
                    message: err.to_string(),
                })
            })
            .collect();

        let mut classes = Vec::with_capacity(parsed.len());
        let mut warnings = Vec::new();
        for result in parsed {
            match result {
                Ok(class) => classes.push(class),
                Err(warning) => {
                    warn!("unreadable class {}: {}", warning.class, warning.message);
                    warnings.push(warning);
                }
            }
        }
        info!(
            "parsed {} classes from {} ({} unreadable)",
            classes.len(),
            path.display(),
            warnings.len()
        );

        let jar = Self {
            path: path.to_path_buf(),
            hash,
            classes,
            warnings,
        };
        if let Some(cache) = cache {
            let cached = CachedJar {
                classes: jar.classes.clone(),
                warnings: jar.warnings.clone(),
            };
            if let Err(err) = cache.put(&jar.hash, path, &cached) {
                warn!("failed to cache {}: {err:#}", path.display());
            }
        }
        Ok(jar)
    }

    pub fn into_index(self) -> JarIndex {
        JarIndex::build_with_warnings(self.classes, self.warnings)
    }
}

fn read_class_entries(bytes: &[u8], path: &Path) -> Result<Vec<RawClass>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .with_context(|| format!("Failed to read zip(jar): {}", path.display()))?;

    let mut classes = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read entry {} of {}", i, path.display()))?;
        if entry.is_dir() || !entry.name().ends_with(".class") {
            continue;
        }
        let name = entry.name().to_string();
        // the header's size is not trusted for allocation
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("Failed to inflate {} in {}", name, path.display()))?;
        classes.push(RawClass { name, bytes });
    }
    Ok(classes)
}

pub fn index_jar(path: &Path, cache: Option<&ClassCache>) -> Result<JarIndex> {
    Ok(ParsedJar::open_cached(path, cache)?.into_index())
}

pub fn index_pair(
    left: &Path,
    right: &Path,
    cache: Option<&ClassCache>,
) -> Result<(JarIndex, JarIndex)> {
    let (left_index, right_index) =
        rayon::join(|| index_jar(left, cache), || index_jar(right, cache));
    let left_index = left_index.with_context(|| format!("Failed to index {}", left.display()))?;
    let right_index =
        right_index.with_context(|| format!("Failed to index {}", right.display()))?;
    Ok((left_index, right_index))
}
