mod common;

use common::{ACC_PUBLIC, ClassBuilder, Code, Op, temp_dir, write_classes};
use serde_json::Value;
use std::path::Path;
use std::process::Command;

const OBJECT: &str = "java/lang/Object";

fn run(args: &[&str]) -> anyhow::Result<Vec<u8>> {
    let out = Command::new(env!("CARGO_BIN_EXE_jar-mapper"))
        .args(args)
        .env_remove("JAR_MAPPER_PROFILE")
        .output()?;
    if !out.status.success() {
        return Err(anyhow::anyhow!(
            "command failed: status={:?}, stderr={}",
            out.status.code(),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(out.stdout)
}

fn run_json(args: &[&str]) -> anyhow::Result<Value> {
    Ok(serde_json::from_slice(&run(args)?)?)
}

fn path(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

fn args<'a>(prefix: &[&'a str], rest: &[&'a str]) -> Vec<&'a str> {
    prefix.iter().chain(rest).copied().collect()
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn app_classes(with_caller: bool) -> Vec<ClassBuilder> {
    let empty = || Code::default().push(Op::Return);
    let mut classes = vec![
        ClassBuilder::new("a", OBJECT)
            .constructor("()V", OBJECT, "()V")
            .method(ACC_PUBLIC, "m", "()V", empty()),
        ClassBuilder::new("d", "a")
            .constructor("()V", "a", "()V")
            .method(ACC_PUBLIC, "m", "()V", empty()),
    ];
    if with_caller {
        classes.push(
            ClassBuilder::new("b", OBJECT)
                .constructor("()V", OBJECT, "()V")
                .instantiating("c", "d", "()V"),
        );
    }
    classes
}

#[test]
fn rename_then_translate_references() -> anyhow::Result<()> {
    let base = temp_dir("cli_rename");
    let jar = base.join("app.jar");
    write_classes(&jar, app_classes(true))?;
    let mappings = base.join("mappings");
    let profile = base.join("profile.json");
    std::fs::write(&profile, r#"{"mapping_save_parameters": {"file_name_format": "by_obf"}}"#)?;

    let (jar_s, mappings_s, profile_s) = (path(&jar), path(&mappings), path(&profile));
    let (jar_s, mappings_s) = (jar_s.as_str(), mappings_s.as_str());
    let common = ["--no-cache", "--profile", profile_s.as_str()];

    let renamed = run_json(
        &args(&common, &["rename", jar_s, mappings_s, "d", "pkg/Derived"]),
    )?;
    assert_eq!(strings(&renamed["changed"]), ["d"]);
    assert!(mappings.join("d.mapping").is_file());

    let overridden = run_json(
        &args(&common, &["rename", jar_s, mappings_s, "d.m()V", "run"]),
    )?;
    assert_eq!(strings(&overridden["changed"]), ["a.m()V", "d.m()V"]);
    assert_eq!(overridden["saved"]["written"].as_array().map(Vec::len), Some(2));

    let refs = run_json(
        &args(&common, &["refs", jar_s, "d.<init>()V", "-m", mappings_s]),
    )?;
    assert_eq!(refs[0]["entry"], "pkg/Derived.<init>()V");
    assert_eq!(refs[0]["context"], "b.c()V");
    assert_eq!(refs[0]["kind"], "instantiation");

    let text = String::from_utf8(run(
        &args(&common, &["refs", jar_s, "a.<init>()V", "-f", "text"]),
    )?)?;
    assert_eq!(text.trim(), "d.<init>()V instantiates a.<init>()V");

    let conflict = run(
        &args(&common, &["rename", jar_s, mappings_s, "a", "pkg/Derived"]),
    );
    assert!(conflict.is_err());

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn check_and_port_drop_missing_classes() -> anyhow::Result<()> {
    let base = temp_dir("cli_check");
    let old_jar = base.join("old.jar");
    let new_jar = base.join("new.jar");
    write_classes(&old_jar, app_classes(true))?;
    write_classes(&new_jar, app_classes(false))?;
    let mappings = base.join("names.mapping");
    std::fs::write(
        &mappings,
        "CLASS a Base\n\tMETHOD m run ()V\nCLASS b Caller\n\tMETHOD c make ()V\n",
    )?;

    let (old_s, new_s, mappings_s) = (path(&old_jar), path(&new_jar), path(&mappings));
    let (old_s, new_s, mappings_s) = (old_s.as_str(), new_s.as_str(), mappings_s.as_str());

    let compared = run_json(&["--no-cache", "compare", old_s, new_s])?;
    assert_eq!(compared["common"], 2);
    assert_eq!(strings(&compared["only_left"]), ["b"]);
    assert!(strings(&compared["only_right"]).is_empty());

    let ported = String::from_utf8(run(&["--no-cache", "port", old_s, new_s, mappings_s])?)?;
    assert_eq!(ported, "CLASS a Base\n\tMETHOD m run ()V\n");

    let clean = run_json(&["--no-cache", "check", old_s, mappings_s])?;
    assert!(strings(&clean["dropped"]["classes"]).is_empty());
    assert!(clean["saved"].is_null());

    let checked = run_json(&["--no-cache", "check", new_s, mappings_s, "--write"])?;
    assert_eq!(strings(&checked["dropped"]["classes"]), ["b -> Caller"]);
    assert_eq!(
        std::fs::read_to_string(&mappings)?,
        "CLASS a Base\n\tMETHOD m run ()V\n"
    );

    let converted = base.join("converted");
    let converted_s = path(&converted);
    let report = run_json(&["--no-cache", "convert", mappings_s, converted_s.as_str()])?;
    assert_eq!(report["written"].as_array().map(Vec::len), Some(1));
    assert!(converted.join("Base.mapping").is_file());

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn cache_is_filled_reported_and_cleared() -> anyhow::Result<()> {
    let base = temp_dir("cli_cache");
    let jar = base.join("app.jar");
    write_classes(&jar, app_classes(true))?;
    let (db, jar_s) = (path(&base.join("cache").join("classes.lmdb")), path(&jar));
    let (db, jar_s) = (db.as_str(), jar_s.as_str());

    let first = run_json(&["--cache", db, "index", jar_s])?;
    let second = run_json(&["--cache", db, "index", jar_s])?;
    assert_eq!(first["stats"], second["stats"]);
    assert_eq!(first["stats"]["classes"], 3);

    let stats = run_json(&["--cache", db, "stats"])?;
    assert_eq!(stats["cached_jars"], 1);
    assert_eq!(stats["known_paths"], 1);

    run(&["--cache", db, "clear"])?;
    let stats = run_json(&["--cache", db, "stats"])?;
    assert_eq!(stats["cached_jars"], 0);

    assert!(run(&["--no-cache", "stats"]).is_err());
    std::fs::remove_dir_all(base)?;
    Ok(())
}
