use anyhow::{Context, Result, bail};
use clap::Parser;
use jar_mapper::archive::{index_jar, index_pair};
use jar_mapper::cache::ClassCache;
use jar_mapper::checker::{DroppedSummary, MappingChecker};
use jar_mapper::cli::{Cli, Commands, OutputFormat};
use jar_mapper::config::{clear_cache, resolve_cache_path, resolve_profile};
use jar_mapper::editor::MappingEditor;
use jar_mapper::entry::{ClassEntry, Entry};
use jar_mapper::format::tree_to_string;
use jar_mapper::mapping::MappingTree;
use jar_mapper::index::{IndexStats, IndexWarning, JarIndex, ReferenceKind};
use jar_mapper::store::{SaveReport, read_mappings, save_mappings};
use jar_mapper::translate::Translator;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command.clone() {
        Commands::Clear => {
            if let Some(cache_path) = resolve_cache_path(&cli)? {
                clear_cache(&cache_path)?;
                info!("cleared {}", cache_path.display());
            }
        }
        Commands::Stats => {
            let Some(cache_path) = resolve_cache_path(&cli)? else {
                bail!("the class cache is disabled (--no-cache)");
            };
            let cache = ClassCache::open(cache_path)?;
            print_json(&cache.stats()?)?;
        }
        Commands::Index { jar, format } => {
            let cache = open_cache(&cli)?;
            let index = index_jar(&jar, cache.as_ref())?;
            let summary = IndexSummary {
                jar: jar.clone(),
                stats: index.stats(),
                warnings: index.warnings().to_vec(),
            };
            match format {
                OutputFormat::Json => print_json(&summary)?,
                OutputFormat::Text => {
                    println!(
                        "{}: {} classes, {} fields, {} methods, {} references",
                        jar.display(),
                        summary.stats.classes,
                        summary.stats.fields,
                        summary.stats.methods,
                        summary.stats.references
                    );
                    for warning in &summary.warnings {
                        println!("warning: {}: {}", warning.class, warning.message);
                    }
                }
            }
        }
        Commands::Refs {
            jar,
            entry,
            mappings,
            format,
        } => {
            let entry: Entry = entry
                .parse()
                .with_context(|| format!("Invalid entry: {entry}"))?;
            let cache = open_cache(&cli)?;
            let index = index_jar(&jar, cache.as_ref())?;
            let tree = mappings.as_deref().map(read_mappings).transpose()?;
            let rows = reference_rows(&index, &entry, tree.as_ref());
            match format {
                OutputFormat::Json => print_json(&rows)?,
                OutputFormat::Text => {
                    for row in &rows {
                        println!("{} {} {}", row.context, kind_label(row.kind), row.entry);
                    }
                }
            }
        }
        Commands::Check {
            jar,
            mappings,
            write,
        } => {
            let profile = resolve_profile(&cli)?;
            let cache = open_cache(&cli)?;
            let index = index_jar(&jar, cache.as_ref())?;
            let mut tree = read_mappings(&mappings)?;
            let dropped = MappingChecker::new(&index).drop_broken_mappings(&mut tree);
            let saved = if write && !dropped.is_empty() {
                Some(save_mappings(
                    &mut tree,
                    &mappings,
                    profile.mapping_save_parameters,
                )?)
            } else {
                None
            };
            print_json(&CheckReport {
                dropped: dropped.summary(),
                saved,
            })?;
        }
        Commands::Convert { input, output } => {
            let profile = resolve_profile(&cli)?;
            let mut tree = read_mappings(&input)?;
            // the target starts empty, so every class is written
            tree.clear_previous();
            let report = save_mappings(&mut tree, &output, profile.mapping_save_parameters)?;
            print_json(&report)?;
        }
        Commands::Rename {
            jar,
            mappings,
            entry,
            name,
            clear,
            access,
        } => {
            let profile = resolve_profile(&cli)?;
            let entry: Entry = entry
                .parse()
                .with_context(|| format!("Invalid entry: {entry}"))?;
            let cache = open_cache(&cli)?;
            let index = index_jar(&jar, cache.as_ref())?;
            let mut tree = if mappings.exists() {
                read_mappings(&mappings)?
            } else {
                MappingTree::new()
            };

            let mut editor = MappingEditor::new(&index, &mut tree);
            let mut changed = Vec::new();
            if name.is_some() || clear {
                changed = editor.rename(&entry, name.as_deref())?;
            }
            if let Some(access) = access
                && editor.set_modifier(&entry, access)?
                && !changed.contains(&entry)
            {
                changed.push(entry.clone());
            }

            let saved = save_mappings(&mut tree, &mappings, profile.mapping_save_parameters)?;
            print_json(&RenameReport {
                changed: changed.iter().map(ToString::to_string).collect(),
                saved,
            })?;
        }
        Commands::Port {
            source,
            dest,
            mappings,
            output,
        } => {
            let profile = resolve_profile(&cli)?;
            let cache = open_cache(&cli)?;
            let (source_index, dest_index) = index_pair(&source, &dest, cache.as_ref())?;
            let mut tree = read_mappings(&mappings)?;
            let unknown_in_source = tree
                .classes()
                .filter(|class| {
                    ClassEntry::new(&class.key().obf_name())
                        .map_or(true, |entry| source_index.class_def(&entry).is_none())
                })
                .count();
            if unknown_in_source > 0 {
                warn!(
                    "{unknown_in_source} mapped classes are not defined in {}",
                    source.display()
                );
            }

            let dropped = MappingChecker::new(&dest_index).drop_broken_mappings(&mut tree);
            match output {
                Some(output) => {
                    tree.clear_previous();
                    let saved =
                        save_mappings(&mut tree, &output, profile.mapping_save_parameters)?;
                    print_json(&CheckReport {
                        dropped: dropped.summary(),
                        saved: Some(saved),
                    })?;
                }
                None => {
                    info!("dropped {} mappings while porting", dropped.len());
                    print!("{}", tree_to_string(&tree));
                }
            }
        }
        Commands::Compare { left, right } => {
            let cache = open_cache(&cli)?;
            let (left_index, right_index) = index_pair(&left, &right, cache.as_ref())?;
            print_json(&compare(&left_index, &right_index))?;
        }
    }

    Ok(())
}

fn open_cache(cli: &Cli) -> Result<Option<ClassCache>> {
    let Some(cache_path) = resolve_cache_path(cli)? else {
        return Ok(None);
    };
    match ClassCache::open(cache_path.clone()) {
        Ok(cache) => Ok(Some(cache)),
        Err(err) => {
            warn!(
                "class cache unavailable at {}: {err:#}",
                cache_path.display()
            );
            Ok(None)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct IndexSummary {
    jar: PathBuf,
    stats: IndexStats,
    warnings: Vec<IndexWarning>,
}

#[derive(Debug, Serialize)]
struct ReferenceRow {
    entry: String,
    context: String,
    kind: ReferenceKind,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    dropped: DroppedSummary,
    saved: Option<SaveReport>,
}

#[derive(Debug, Serialize)]
struct RenameReport {
    changed: Vec<String>,
    saved: SaveReport,
}

#[derive(Debug, Serialize)]
struct Comparison {
    common: usize,
    only_left: Vec<String>,
    only_right: Vec<String>,
}

fn reference_rows(
    index: &JarIndex,
    entry: &Entry,
    mappings: Option<&MappingTree>,
) -> Vec<ReferenceRow> {
    let mut references = index.references_to(entry).to_vec();
    if let Some(mappings) = mappings {
        let translator = Translator::new(mappings);
        references = references.iter().map(|r| translator.translate(r)).collect();
    }
    references.sort();
    references
        .into_iter()
        .map(|r| ReferenceRow {
            entry: r.entry.to_string(),
            context: r.context.to_string(),
            kind: r.kind,
        })
        .collect()
}

fn kind_label(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::MethodCall => "calls",
        ReferenceKind::FieldRead => "reads",
        ReferenceKind::FieldWrite => "writes",
        ReferenceKind::Instantiation => "instantiates",
    }
}

fn class_names(index: &JarIndex) -> BTreeSet<String> {
    index.classes().map(|def| def.entry.full_name()).collect()
}

fn compare(left: &JarIndex, right: &JarIndex) -> Comparison {
    let left = class_names(left);
    let right = class_names(right);
    Comparison {
        common: left.intersection(&right).count(),
        only_left: left.difference(&right).cloned().collect(),
        only_right: right.difference(&left).cloned().collect(),
    }
}
