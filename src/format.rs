//! Flat text form of a mapping tree.
//!
//! ```text
//! CLASS a com/example/Foo
//! 	CLASS a$b Inner ACC:PUBLIC
//! 	FIELD c count I
//! 	METHOD d run (I)V
//! 		ARG 1 times
//! ```
//!
//! One node per line, indented with one tab per nesting level. Inner classes
//! are written with their full obfuscated name; the reader also accepts the
//! bare inner name.

use std::io::{self, Write};

use thiserror::Error;

use crate::access::AccessModifier;
use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::entry::{ClassEntry, FieldEntry, MethodEntry};
use crate::mapping::{MappingKey, MappingNode, MappingTree};

#[derive(Debug, Error)]
pub enum MappingParseError {
    #[error("{location}:{line}: {message}: '{text}'")]
    Syntax {
        location: String,
        line: usize,
        message: String,
        text: String,
    },

    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: io::Error,
    },
}

impl MappingParseError {
    pub fn line(&self) -> Option<usize> {
        match self {
            MappingParseError::Syntax { line, .. } => Some(*line),
            MappingParseError::Io { .. } => None,
        }
    }
}

pub fn write_tree(out: &mut impl Write, tree: &MappingTree) -> io::Result<()> {
    for class in tree.classes() {
        write_class(out, class)?;
    }
    Ok(())
}

pub fn write_class(out: &mut impl Write, class: &MappingNode) -> io::Result<()> {
    write_node(out, class, None, 0)
}

pub fn tree_to_string(tree: &MappingTree) -> String {
    let mut buf = Vec::new();
    // writing into a Vec cannot fail
    let _ = write_tree(&mut buf, tree);
    String::from_utf8_lossy(&buf).into_owned()
}

fn write_node(
    out: &mut impl Write,
    node: &MappingNode,
    owner: Option<&str>,
    depth: usize,
) -> io::Result<()> {
    let indent = "\t".repeat(depth);
    let name = node.deobf_name().map(|n| format!(" {n}")).unwrap_or_default();
    let suffix = node.modifier().formatted_suffix();
    match node.key() {
        MappingKey::Class(obf) => {
            let full = match owner {
                Some(owner) => format!("{owner}${obf}"),
                None => obf.clone(),
            };
            writeln!(out, "{indent}CLASS {full}{name}{suffix}")?;
            for child in node.children() {
                write_node(out, child, Some(&full), depth + 1)?;
            }
        }
        MappingKey::Field { name: obf, desc } => {
            writeln!(out, "{indent}FIELD {obf}{name} {desc}{suffix}")?;
        }
        MappingKey::Method { name: obf, desc } => {
            writeln!(out, "{indent}METHOD {obf}{name} {desc}{suffix}")?;
            for child in node.children() {
                write_node(out, child, owner, depth + 1)?;
            }
        }
        MappingKey::Argument(index) => {
            if let Some(arg) = node.deobf_name() {
                writeln!(out, "{indent}ARG {index} {arg}")?;
            }
        }
    }
    Ok(())
}

pub fn read_tree(text: &str, location: &str) -> Result<MappingTree, MappingParseError> {
    let mut tree = MappingTree::new();
    for class in parse_classes(text, location)? {
        tree.insert_class(class);
    }
    tree.mark_saved();
    Ok(tree)
}

struct Frame {
    node: MappingNode,
    class_name: Option<String>,
}

pub fn parse_classes(text: &str, location: &str) -> Result<Vec<MappingNode>, MappingParseError> {
    let mut classes = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let error = |message: &str| MappingParseError::Syntax {
            location: location.to_string(),
            line: line_no,
            message: message.to_string(),
            text: raw.trim_end().to_string(),
        };

        let content = raw.split('#').next().unwrap_or("");
        if content.trim().is_empty() {
            continue;
        }
        let depth = content.chars().take_while(|c| *c == '\t').count();
        if depth > stack.len() {
            return Err(error("unexpected indentation"));
        }
        while stack.len() > depth {
            close_frame(&mut stack, &mut classes);
        }

        let mut tokens: Vec<&str> = content.split_whitespace().collect();
        let modifier = match tokens.last().and_then(|t| t.strip_prefix("ACC:")) {
            Some(raw_modifier) => {
                let modifier = raw_modifier
                    .parse::<AccessModifier>()
                    .map_err(|message| error(&message))?;
                tokens.pop();
                modifier
            }
            None => AccessModifier::Unchanged,
        };
        let (kind, args) = tokens
            .split_first()
            .ok_or_else(|| error("missing line kind"))?;
        let parent = stack.last();

        let frame = match *kind {
            "CLASS" => {
                let (obf, deobf) = match args {
                    [obf] => (*obf, None),
                    [obf, deobf] => (*obf, Some(*deobf)),
                    _ => return Err(error("expected CLASS <obf> [<deobf>]")),
                };
                let (key, full) = match parent {
                    None => {
                        let class = ClassEntry::new(obf).map_err(|e| error(&e.to_string()))?;
                        if let Some(deobf) = deobf {
                            ClassEntry::new(deobf).map_err(|e| error(&e.to_string()))?;
                        }
                        (MappingKey::Class(obf.to_string()), class.full_name())
                    }
                    Some(Frame {
                        class_name: Some(outer),
                        ..
                    }) => {
                        let inner = obf
                            .strip_prefix(outer.as_str())
                            .and_then(|rest| rest.strip_prefix('$'))
                            .unwrap_or(obf);
                        let outer_entry = ClassEntry::new(outer).map_err(|e| error(&e.to_string()))?;
                        let class = ClassEntry::inner(&outer_entry, inner)
                            .map_err(|e| error(&e.to_string()))?;
                        if let Some(deobf) = deobf {
                            ClassEntry::inner(&outer_entry, deobf)
                                .map_err(|e| error(&e.to_string()))?;
                        }
                        (MappingKey::Class(inner.to_string()), class.full_name())
                    }
                    Some(_) => return Err(error("CLASS must be top-level or inside a CLASS")),
                };
                let mut node = MappingNode::new(key);
                node.set_deobf_name(deobf.map(str::to_string));
                node.set_modifier(modifier);
                Frame {
                    node,
                    class_name: Some(full),
                }
            }
            "FIELD" | "METHOD" => {
                let Some(Frame {
                    class_name: Some(owner),
                    ..
                }) = parent
                else {
                    return Err(error("members must be inside a CLASS"));
                };
                let (obf, deobf, desc) = match args {
                    [obf, desc] => (*obf, None, *desc),
                    [obf, deobf, desc] => (*obf, Some(*deobf), *desc),
                    _ => return Err(error("expected <obf> [<deobf>] <descriptor>")),
                };
                let owner = ClassEntry::new(owner).map_err(|e| error(&e.to_string()))?;
                let key = if *kind == "FIELD" {
                    FieldEntry::new(owner.clone(), obf, desc).map_err(|e| error(&e.to_string()))?;
                    if let Some(deobf) = deobf {
                        FieldEntry::new(owner, deobf, desc).map_err(|e| error(&e.to_string()))?;
                    }
                    MappingKey::Field {
                        name: obf.to_string(),
                        desc: TypeDescriptor::parse(desc)
                            .map_err(|e| error(&e.to_string()))?
                            .to_string(),
                    }
                } else {
                    MethodEntry::new(owner.clone(), obf, desc).map_err(|e| error(&e.to_string()))?;
                    if let Some(deobf) = deobf {
                        MethodEntry::new(owner, deobf, desc).map_err(|e| error(&e.to_string()))?;
                    }
                    MappingKey::Method {
                        name: obf.to_string(),
                        desc: MethodDescriptor::parse(desc)
                            .map_err(|e| error(&e.to_string()))?
                            .to_string(),
                    }
                };
                let mut node = MappingNode::new(key);
                node.set_deobf_name(deobf.map(str::to_string));
                node.set_modifier(modifier);
                Frame {
                    node,
                    class_name: None,
                }
            }
            "ARG" => {
                if !matches!(parent.map(|f| f.node.key()), Some(MappingKey::Method { .. })) {
                    return Err(error("ARG must be inside a METHOD"));
                }
                let [index, name] = args else {
                    return Err(error("expected ARG <index> <name>"));
                };
                let index: u32 = index.parse().map_err(|_| error("invalid argument index"))?;
                let mut node = MappingNode::new(MappingKey::Argument(index));
                node.set_deobf_name(Some(name.to_string()));
                Frame {
                    node,
                    class_name: None,
                }
            }
            _ => return Err(error("unknown line kind")),
        };
        stack.push(frame);
    }

    while !stack.is_empty() {
        close_frame(&mut stack, &mut classes);
    }
    Ok(classes)
}

fn close_frame(stack: &mut Vec<Frame>, classes: &mut Vec<MappingNode>) {
    let Some(frame) = stack.pop() else {
        return;
    };
    match stack.last_mut() {
        Some(parent) => parent.node.insert_child(frame.node),
        None => classes.push(frame.node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;

    const SAMPLE: &str = "\
CLASS a com/example/Foo
\tCLASS a$b Inner ACC:PUBLIC
\t\tFIELD c I
\tFIELD c count I
\tMETHOD d run (I)V
\t\tARG 1 times
CLASS e
\tMETHOD f (J)V ACC:PRIVATE
";

    #[test]
    fn flat_text_round_trips() {
        let tree = read_tree(SAMPLE, "sample.mapping").unwrap();
        assert_eq!(tree_to_string(&tree), SAMPLE);
        assert!(!tree.needs_write("a"));

        let entry = |spec: &str| spec.parse::<Entry>().unwrap();
        assert_eq!(tree.deobf_name(&entry("a$b")), Some("Inner"));
        assert_eq!(tree.deobf_name(&entry("a.d(I)V@1")), Some("times"));
        assert_eq!(tree.modifier(&entry("e.f(J)V")), AccessModifier::Private);
    }

    #[test]
    fn reader_accepts_bare_inner_names_and_comments() {
        let text = "# header\nCLASS a Outer\n\tCLASS b Inner # trailing\n\n";
        let tree = read_tree(text, "x").unwrap();
        assert_eq!(tree.deobf_name(&"a$b".parse().unwrap()), Some("Inner"));
        assert_eq!(tree_to_string(&tree), "CLASS a Outer\n\tCLASS a$b Inner\n");
    }

    #[test]
    fn cleared_argument_names_leave_no_node() {
        let entry = |spec: &str| spec.parse::<Entry>().unwrap();
        let mut tree = MappingTree::new();
        tree.set_deobf_name(&entry("a.m(I)V@1"), Some("x"));
        tree.set_deobf_name(&entry("a.m(I)V"), Some("run"));
        assert!(tree.set_deobf_name(&entry("a.m(I)V@1"), None));
        assert!(tree.get(&entry("a.m(I)V@1")).is_none());
        assert!(!tree.set_modifier(&entry("a.m(I)V@1"), AccessModifier::Public));

        let text = tree_to_string(&tree);
        assert_eq!(text, "CLASS a\n\tMETHOD m run (I)V\n");
        let reread = read_tree(&text, "x").unwrap();
        assert!(reread.same_content(&tree));
    }

    #[test]
    fn nested_inner_classes_need_one_level_per_line() {
        let err = read_tree("CLASS a\n\tCLASS b$c Deep\n", "x").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(read_tree("CLASS a\n\tCLASS a$b$c Deep\n", "x").is_err());

        let text = "CLASS a\n\tCLASS a$b\n\t\tCLASS a$b$c Deep\n";
        let tree = read_tree(text, "x").unwrap();
        assert_eq!(tree.deobf_name(&"a$b$c".parse().unwrap()), Some("Deep"));
        assert_eq!(tree_to_string(&tree), text);
        assert!(read_tree(&tree_to_string(&tree), "x").unwrap().same_content(&tree));
    }

    #[test]
    fn errors_name_the_location_and_line() {
        let cases = [
            ("CLASS a\n\t\tFIELD b I\n", 2),
            ("FIELD b I\n", 1),
            ("CLASS a\n\tARG 1 x\n", 2),
            ("CLASS a\n\tMETHOD b (Q)V\n", 2),
            ("CLASS a\n\tFIELD b I ACC:FRIENDLY\n", 2),
            ("CLASS a b c d\n", 1),
            ("CLASS a\n\tBOGUS x\n", 2),
        ];
        for (text, line) in cases {
            let err = read_tree(text, "broken.mapping").unwrap_err();
            assert_eq!(err.line(), Some(line), "{text:?}");
            assert!(err.to_string().starts_with("broken.mapping:"));
        }
    }
}
