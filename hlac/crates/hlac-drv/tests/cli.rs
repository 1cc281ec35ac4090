//! Command-line integration tests for the hlac binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn hlac() -> Command {
    Command::cargo_bin("hlac").expect("binary built")
}

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn clean_source_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(&dir, "prog.hlasm", "         LR    1,2\n         END\n");
    hlac().arg(&input).assert().success().stdout("");
}

#[test]
fn diagnostics_do_not_change_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(&dir, "prog.hlasm", "         NOSUCH 1\n");
    hlac()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("E049"));
}

#[test]
fn missing_input_exits_one() {
    hlac()
        .arg("does-not-exist.hlasm")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn malformed_config_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(&dir, "prog.hlasm", "         END\n");
    let conf = write_file(&dir, "proc_grps.json", "{ not json");
    hlac()
        .arg(&input)
        .arg("--proc-grps")
        .arg(&conf)
        .assert()
        .code(1);
}

#[test]
fn invalid_option_combination_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(&dir, "prog.hlasm", "         END\n");
    hlac()
        .arg(&input)
        .args(["--machine", "BOGUS-MACHINE"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid assembler options"));
}

#[test]
fn macro_library_resolved_from_lib_dir() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(&dir, "prog.hlasm", "         MYMAC\n");
    write_file(
        &dir,
        "MYMAC",
        "         MACRO\n\
         \x20        MYMAC\n\
         \x20        MNOTE 'FROM LIB'\n\
         \x20        MEND\n",
    );
    hlac()
        .arg(&input)
        .arg("--lib")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("FROM LIB"))
        .stdout(predicate::str::contains("E049").not());
}

#[test]
fn processor_group_config_supplies_libs_and_options() {
    let dir = tempfile::tempdir().unwrap();
    let libdir = dir.path().join("maclib");
    std::fs::create_dir(&libdir).unwrap();
    let mut f = std::fs::File::create(libdir.join("CPY")).unwrap();
    f.write_all(b"         MNOTE 'COPIED'\n").unwrap();

    let input = write_file(&dir, "prog.hlasm", "         COPY  CPY\n");
    let grps = write_file(
        &dir,
        "proc_grps.json",
        &format!(
            r#"{{"pgroups":[{{"name":"G1","libs":["{}"],"asm_options":{{"SYSPARM":"X"}}}}]}}"#,
            libdir.display().to_string().replace('\\', "/")
        ),
    );

    hlac()
        .arg(&input)
        .arg("--proc-grps")
        .arg(&grps)
        .args(["--pgroup", "G1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("COPIED"));
}

#[test]
fn max_diagnostics_caps_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(
        &dir,
        "prog.hlasm",
        "         NOSUCH1 1\n         NOSUCH2 1\n         NOSUCH3 1\n",
    );
    hlac()
        .arg(&input)
        .args(["--max-diagnostics", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 diagnostics suppressed"));
}
