use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn matchstack(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("matchstack").expect("binary exists");
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("MATCHSTACK_COMPILER")
        .env_remove("MATCHSTACK_THEME")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_displays_usage() {
    let dir = tempdir().expect("tempdir");
    matchstack(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("<TARGET_ID>"));
}

#[test]
fn non_numeric_target_is_rejected() {
    let dir = tempdir().expect("tempdir");
    matchstack(dir.path())
        .args(["song.dta", "abc"])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("not a node id"));
}

#[test]
fn missing_input_fails_in_staging() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.dta");
    matchstack(dir.path())
        .arg(&missing)
        .arg("42")
        .arg("--compiler")
        .arg(dir.path().join("no-such-arsonc"))
        .assert()
        .failure()
        .code(3)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("staging failed"))
        .stderr(predicate::str::contains("missing.dta"));
}

#[test]
fn missing_compiler_is_a_tool_error() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("song.dta");
    fs::write(&input, "(song)\n").expect("write input");
    matchstack(dir.path())
        .arg(&input)
        .arg("42")
        .arg("--compiler")
        .arg(dir.path().join("no-such-arsonc"))
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("compile failed"))
        .stderr(predicate::str::contains("could not locate"));
}

#[cfg(unix)]
mod with_fake_compiler {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    const FAKE_ARSONC: &str = r#"#!/bin/sh
case "$1" in
  compile)
    if grep -q BROKEN "$2"; then
      echo "$2(1): unexpected token BROKEN" >&2
      exit 2
    fi
    cp "$2" "${2%.*}.dtb"
    ;;
  decompile)
    cat > "${4%.*}.dta" <<'EOF'
(song_select_panel /* ID: 0 */
   (focus /* ID: 1 */ play_button)
   (enter
      {
         /* ID: 41 */
         if
         {== $mode 1}
         {print "ready"} /* ID: 42 */
      }
   )
)
EOF
    ;;
  *)
    echo "unexpected command: $1" >&2
    exit 64
    ;;
esac
"#;

    fn setup(source: &str) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempdir().expect("tempdir");
        let compiler = dir.path().join("arsonc");
        fs::write(&compiler, FAKE_ARSONC).expect("write fake compiler");
        let mut permissions = fs::metadata(&compiler).expect("metadata").permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&compiler, permissions).expect("chmod");

        let input = dir.path().join("song_select.dta");
        fs::write(&input, source).expect("write input");
        (dir, compiler, input)
    }

    fn lookup(dir: &Path, compiler: &Path, input: &Path, target: &str) -> Command {
        let mut cmd = matchstack(dir);
        cmd.arg(input)
            .arg(target)
            .arg("--compiler")
            .arg(compiler)
            .args(["--color", "never"]);
        cmd
    }

    #[test]
    fn prints_context_for_known_node() {
        let (dir, compiler, input) = setup("(song_select_panel)\n");
        lookup(dir.path(), &compiler, &input, "42")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Snippet from song_select.dta (target id: 42)",
            ))
            .stdout(predicate::str::contains("==>  41:      {if"))
            .stdout(predicate::str::contains("/*").not());

        assert_eq!(
            fs::read_to_string(&input).expect("input still readable"),
            "(song_select_panel)\n"
        );
    }

    #[test]
    fn unknown_node_is_reported_without_context() {
        let (dir, compiler, input) = setup("(song_select_panel)\n");
        lookup(dir.path(), &compiler, &input, "999999")
            .assert()
            .failure()
            .code(5)
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("locate failed"))
            .stderr(predicate::str::contains("node id 999999 was not found"));
    }

    #[test]
    fn compiler_errors_are_surfaced() {
        let (dir, compiler, input) = setup("(BROKEN\n");
        lookup(dir.path(), &compiler, &input, "42")
            .assert()
            .failure()
            .code(4)
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("compile failed"))
            .stderr(predicate::str::contains("unexpected token BROKEN"));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let (dir, compiler, input) = setup("(song_select_panel)\n");
        let first = lookup(dir.path(), &compiler, &input, "2")
            .output()
            .expect("first run");
        let second = lookup(dir.path(), &compiler, &input, "2")
            .output()
            .expect("second run");

        assert!(first.status.success());
        assert_eq!(first.stdout, second.stdout);
    }

    #[test]
    fn offset_flag_changes_the_label_searched() {
        let (dir, compiler, input) = setup("(song_select_panel)\n");
        lookup(dir.path(), &compiler, &input, "41")
            .args(["--offset", "1", "--no-fold"])
            .assert()
            .success()
            .stdout(predicate::str::contains("==>  42:         {print \"ready\"}"));
    }
}
