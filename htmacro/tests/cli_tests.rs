//! The built binary, driven the way a build script would.

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn htmacro(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_htmacro"))
        .args(args)
        .env_remove("HTMACRO_PATH")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn htmacro");
    // The binary may exit before reading stdin, so a broken pipe is fine.
    let _ = child.stdin.take().unwrap().write_all(stdin.as_bytes());
    child.wait_with_output().unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn stdin_to_stdout() {
    let out = htmacro(&["--no-config"], "<SET x=2><b>{x * 3}</b>");
    assert!(out.status.success());
    assert_eq!(stdout(&out), "<b>6</b>");
}

#[test]
fn defines_are_typed() {
    let out = htmacro(
        &["--no-config", "-D", "name=World", "-Dn=41"],
        "Hello {name} {n + 1}",
    );
    assert!(out.status.success());
    assert_eq!(stdout(&out), "Hello World 42");
}

#[test]
fn bad_define_fails() {
    let out = htmacro(&["--no-config", "-D", "oops"], "x");
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn error_diagnostic_sets_exit_status() {
    let out = htmacro(&["--no-config"], "<p>kept</p><CALL NAME=\"'ghost'\"></CALL>");
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stdout(&out), "<p>kept</p>");
    assert!(String::from_utf8_lossy(&out.stderr).contains("ghost"));
}

#[test]
fn warnings_keep_success() {
    let out = htmacro(&["--no-config"], "{undefined}");
    assert!(out.status.success());
    assert_eq!(stdout(&out), "0");
}

#[test]
fn quiet_hides_warnings() {
    let out = htmacro(&["--no-config", "-q"], "{undefined}");
    assert!(out.status.success());
    assert!(out.stderr.is_empty());
}

#[test]
fn markup_error_fails() {
    let out = htmacro(&["--no-config"], "<p>\n<!-- open");
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}

#[test]
fn file_in_file_out_with_includes() {
    let dir = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    fs::write(lib.path().join("foot.html"), "<footer>{year}</footer>").unwrap();
    fs::write(dir.path().join("page.html"), "<main>x</main><INCLUDE SRC=foot.html>").unwrap();
    let page = dir.path().join("page.html");
    let dest = dir.path().join("out.html");

    let out = htmacro(
        &[
            "--no-config",
            "-I",
            lib.path().to_str().unwrap(),
            "-D",
            "year=2024",
            "-o",
            dest.to_str().unwrap(),
            page.to_str().unwrap(),
        ],
        "",
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
    assert_eq!(fs::read_to_string(&dest).unwrap(), "<main>x</main><footer>2024</footer>");
}

#[test]
fn rc_file_settings() {
    let dir = tempfile::tempdir().unwrap();
    let rc = dir.path().join("site.rc");
    fs::write(&rc, "; site settings\n/set greeting=hi\n/interpolate off\n").unwrap();

    let out = htmacro(&["-f", rc.to_str().unwrap()], "{greeting}<p INTERPOLATE=1>{greeting}</p>");
    assert!(out.status.success());
    assert_eq!(stdout(&out), "{greeting}<p>hi</p>");
}

#[test]
fn no_interpolate_flag() {
    let out = htmacro(&["--no-config", "--no-interpolate"], "{1 + 1}");
    assert_eq!(stdout(&out), "{1 + 1}");
}

#[test]
fn cwd_controls_relative_includes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("note.txt"), "from cwd").unwrap();
    let out = htmacro(
        &["--no-config", "-C", dir.path().to_str().unwrap()],
        "<INCLUDE SRC=note.txt>",
    );
    assert!(out.status.success());
    assert_eq!(stdout(&out), "from cwd");
}

#[test]
fn missing_input_file_fails() {
    let out = htmacro(&["--no-config", "/definitely/not/here.html"], "");
    assert_eq!(out.status.code(), Some(1));
}
