//! # jar-mapper
//!
//! Indexes obfuscated Java archives and maintains the deobfuscation mappings
//! made against them.
//!
//! ## Architecture
//!
//! - **entry**: Typed class, field, method and argument identifiers
//! - **descriptor**: JVM type and method descriptors, and generic signatures
//! - **access**: Access flags and visibility overrides
//! - **pool**: Interning of class entries shared by the index
//! - **classfile**: Class-file reader producing serializable definitions
//! - **archive**: Jar loading, in parallel and through the class cache
//! - **cache**: Persistent cache of parsed jars using LMDB (heed)
//! - **index**: Inheritance, member, reference and bridge indexes over a jar
//! - **mapping**: The mapping tree and its dirty tracking
//! - **format**: Text format of mapping files
//! - **store**: Reading and saving mappings as one file or a directory tree
//! - **translate**: Applying mappings to entries and descriptors
//! - **checker**: Dropping mappings whose targets no longer exist
//! - **editor**: Checked renames against an index

pub mod access;
pub mod archive;
pub mod cache;
pub mod checker;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod editor;
pub mod entry;
pub mod format;
pub mod index;
pub mod mapping;
pub mod pool;
pub mod store;
pub mod translate;
