use anyhow::{Context, Result, bail};
use ignore::WalkBuilder;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::format::{MappingParseError, parse_classes, read_tree, write_class, write_tree};
use crate::mapping::{MappingNode, MappingTree};

pub const MAPPING_EXTENSION: &str = "mapping";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingFileNameFormat {
    #[default]
    ByDeobf,
    ByObf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingSaveParameters {
    pub file_name_format: MappingFileNameFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFormat {
    File,
    Directory,
}

impl MappingFormat {
    pub fn detect(path: &Path) -> Self {
        if path.is_dir() {
            MappingFormat::Directory
        } else if path.is_file() || path.extension().is_some() {
            MappingFormat::File
        } else {
            MappingFormat::Directory
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SaveReport {
    pub written: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

fn read_text(path: &Path) -> Result<String, MappingParseError> {
    fs::read_to_string(path).map_err(|source| MappingParseError::Io {
        location: path.display().to_string(),
        source,
    })
}

pub fn read_mappings(path: &Path) -> Result<MappingTree> {
    if path.is_dir() {
        return read_directory(path);
    }
    let text = read_text(path)?;
    let tree = read_tree(&text, &path.display().to_string())?;
    info!(
        "loaded {} classes from {}",
        tree.classes().count(),
        path.display()
    );
    Ok(tree)
}

fn mapping_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|e| e == MAPPING_EXTENSION))
        .collect();
    files.sort();
    files
}

fn read_directory(root: &Path) -> Result<MappingTree> {
    let mut tree = MappingTree::new();
    let mut origins: BTreeMap<String, PathBuf> = BTreeMap::new();
    let files = mapping_files(root);

    for file in &files {
        let text = read_text(file)?;
        let classes = parse_classes(&text, &file.display().to_string())?;
        for class in classes {
            let obf = class.key().obf_name();
            if let Some(first) = origins.get(&obf) {
                bail!(
                    "class {} is mapped in both {} and {}",
                    obf,
                    first.display(),
                    file.display()
                );
            }
            origins.insert(obf, file.clone());
            tree.insert_class(class);
        }
    }

    tree.mark_saved();
    info!(
        "loaded {} classes from {} files under {}",
        tree.classes().count(),
        files.len(),
        root.display()
    );
    Ok(tree)
}

pub fn write_file(tree: &mut MappingTree, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create mapping file: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_tree(&mut out, tree)
        .and_then(|_| out.flush())
        .with_context(|| format!("Failed to write mapping file: {}", path.display()))?;
    tree.mark_saved();
    Ok(())
}

fn class_file(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{name}.{MAPPING_EXTENSION}"))
}

fn saved_files(
    root: &Path,
    obf: &str,
    deobf: Option<&str>,
    params: MappingSaveParameters,
) -> Vec<PathBuf> {
    match (params.file_name_format, deobf) {
        (MappingFileNameFormat::ByDeobf, Some(deobf)) => {
            vec![class_file(root, deobf), class_file(root, obf)]
        }
        _ => vec![class_file(root, obf)],
    }
}

// Deletions run before writes and skip any file written by the same save.
pub fn write_directory(
    tree: &mut MappingTree,
    root: &Path,
    params: MappingSaveParameters,
) -> Result<SaveReport> {
    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create mapping directory: {}", root.display()))?;

    let mut writes: Vec<(PathBuf, &MappingNode)> = Vec::new();
    let mut deletes: BTreeSet<PathBuf> = BTreeSet::new();

    for class in tree.classes() {
        let obf = class.key().obf_name();
        if !tree.needs_write(&obf) {
            continue;
        }
        let deobf = class.deobf_name();
        let target = match (params.file_name_format, deobf) {
            (MappingFileNameFormat::ByDeobf, Some(deobf)) => class_file(root, deobf),
            _ => class_file(root, &obf),
        };

        if params.file_name_format == MappingFileNameFormat::ByDeobf {
            let previous = tree.previous_class(&obf).and_then(MappingNode::deobf_name);
            match (deobf, previous) {
                (Some(now), Some(before)) if now != before => {
                    deletes.insert(class_file(root, before));
                }
                (None, Some(before)) => {
                    deletes.insert(class_file(root, before));
                }
                (Some(_), None) => {
                    deletes.insert(class_file(root, &obf));
                }
                _ => {}
            }
        }
        writes.push((target, class));
    }

    for dropped in tree.dropped_classes() {
        let obf = dropped.key().obf_name();
        deletes.extend(saved_files(root, &obf, dropped.deobf_name(), params));
    }

    for (target, _) in &writes {
        deletes.remove(target);
    }

    let mut report = SaveReport::default();
    for path in deletes {
        if !path.is_file() {
            continue;
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete mapping file: {}", path.display()))?;
        debug!("deleted {}", path.display());
        report.deleted.push(path);
    }

    for (target, class) in writes {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = File::create(&target)
            .with_context(|| format!("Failed to create mapping file: {}", target.display()))?;
        let mut out = BufWriter::new(file);
        write_class(&mut out, class)
            .and_then(|_| out.flush())
            .with_context(|| format!("Failed to write mapping file: {}", target.display()))?;
        debug!("wrote {}", target.display());
        report.written.push(target);
    }

    tree.mark_saved();
    info!(
        "saved mappings to {}: {} written, {} deleted",
        root.display(),
        report.written.len(),
        report.deleted.len()
    );
    Ok(report)
}

pub fn save_mappings(
    tree: &mut MappingTree,
    path: &Path,
    params: MappingSaveParameters,
) -> Result<SaveReport> {
    match MappingFormat::detect(path) {
        MappingFormat::Directory => write_directory(tree, path, params),
        MappingFormat::File => {
            write_file(tree, path)?;
            Ok(SaveReport {
                written: vec![path.to_path_buf()],
                deleted: Vec::new(),
            })
        }
    }
}
