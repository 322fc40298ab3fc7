use crate::common::TestEnv;
use crate::common::mock_commands::{
    SvnMock, create_failing_svn, create_svn_mock, svn_invocations,
};

const SVN_FULL_STATUS: &str = r#"
[[segments]]
type = "svn"

[segments.properties]
fetch_status = true
"#;

#[test]
fn test_print_without_config_is_empty() {
    let env = TestEnv::new();
    assert_eq!(env.print(|_| {}), "");
}

#[test]
fn test_print_svn_full_status() {
    let env = TestEnv::new();
    env.make_working_copy();
    create_svn_mock(
        &env.bin_dir(),
        &SvnMock {
            status: "?       notes.txt\n!       missing.c\nA       added.c\nD       removed.c\nM       main.c\nC       conflict.c\nR       moved.c\nX       external\n",
            ..Default::default()
        },
    );
    env.write_config(SVN_FULL_STATUS);

    assert_eq!(
        env.print(|_| {}),
        " \u{e0a0}trunk r1133 ?1 +1 ~1 -2 >1 !1 "
    );
}

#[test]
fn test_print_svn_queries_working_copy_root_from_subdirectory() {
    let env = TestEnv::new();
    env.make_working_copy();
    create_svn_mock(&env.bin_dir(), &SvnMock::default());
    env.write_config(SVN_FULL_STATUS);
    let nested = env.work_dir().join("src").join("lib");
    std::fs::create_dir_all(&nested).unwrap();

    let prompt = env.print(|cmd| {
        cmd.current_dir(&nested);
    });
    assert_eq!(prompt, " \u{e0a0}trunk r1133  ");

    let root = env.work_dir().display().to_string();
    let mut calls = svn_invocations(&env.bin_dir());
    calls.sort();
    assert_eq!(
        calls,
        vec![
            format!("info {root} --show-item relative-url"),
            format!("info {root} --show-item repos-root-url"),
            format!("info {root} --show-item revision"),
            format!("status {root}"),
        ]
    );
}

#[test]
fn test_print_svn_without_fetch_status_runs_no_queries() {
    let env = TestEnv::new();
    env.make_working_copy();
    create_svn_mock(&env.bin_dir(), &SvnMock::default());
    env.write_config(
        r#"
[[segments]]
type = "svn"
template = "svn:{{ branch }}:{{ base_rev }}"
"#,
    );

    assert_eq!(env.print(|_| {}), "svn::0");
    assert!(svn_invocations(&env.bin_dir()).is_empty());
}

#[test]
fn test_print_svn_symlinked_metadata_dir() {
    let env = TestEnv::new();
    let metadata = env.home().join("wc-metadata");
    std::fs::create_dir_all(&metadata).unwrap();
    std::os::unix::fs::symlink(&metadata, env.work_dir().join(".svn")).unwrap();
    create_svn_mock(&env.bin_dir(), &SvnMock::default());
    env.write_config(SVN_FULL_STATUS);

    assert_eq!(env.print(|_| {}), " \u{e0a0}trunk r1133  ");
}

#[test]
fn test_print_svn_outside_working_copy() {
    let env = TestEnv::new();
    create_svn_mock(&env.bin_dir(), &SvnMock::default());
    env.write_config(SVN_FULL_STATUS);

    assert_eq!(env.print(|_| {}), "");
    assert!(svn_invocations(&env.bin_dir()).is_empty());
}

#[test]
fn test_print_svn_not_installed() {
    let env = TestEnv::new();
    env.make_working_copy();
    env.write_config(SVN_FULL_STATUS);

    assert_eq!(env.print(|_| {}), "");
}

#[test]
fn test_print_svn_failing_queries_degrade() {
    let env = TestEnv::new();
    env.make_working_copy();
    create_failing_svn(&env.bin_dir());
    env.write_config(SVN_FULL_STATUS);

    // Still enabled, every field at its zero value
    assert_eq!(env.print(|_| {}), " \u{e0a0} r0  ");
}

#[test]
fn test_print_svn_excluded_folder() {
    let env = TestEnv::new();
    env.make_working_copy();
    create_svn_mock(&env.bin_dir(), &SvnMock::default());
    env.write_config(&format!(
        r#"
[[segments]]
type = "svn"

[segments.properties]
fetch_status = true
excluded_folders = ["{}"]
"#,
        env.work_dir().display()
    ));

    assert_eq!(env.print(|_| {}), "");
}

#[test]
fn test_print_docker_context_from_env() {
    let env = TestEnv::new();
    env.write_config("[[segments]]\ntype = \"docker\"\n");

    let prompt = env.print(|cmd| {
        cmd.env("DOCKER_HOST", "tcp://build:2376")
            .env("DOCKER_CONTEXT", "ignored");
    });
    assert_eq!(prompt, " \u{f308} tcp://build:2376 ");
}

#[test]
fn test_print_docker_context_from_config_file() {
    let env = TestEnv::new();
    env.write_file(
        "home/.docker/config.json",
        r#"{"auths": {}, "currentContext": "desktop-linux"}"#,
    );
    env.write_config("[[segments]]\ntype = \"docker\"\ntemplate = \"{{ context }}\"\n");

    assert_eq!(env.print(|_| {}), "desktop-linux");
}

#[test]
fn test_print_docker_broken_config_file() {
    let env = TestEnv::new();
    env.write_file("home/.docker/config.json", "{");
    env.write_config("[[segments]]\ntype = \"docker\"\n");

    assert_eq!(env.print(|_| {}), "");
}

#[test]
fn test_print_docker_files_mode() {
    let env = TestEnv::new();
    env.write_file("work/compose.yaml", "services: {}\n");
    env.write_config(
        r#"
[[segments]]
type = "docker"
template = "[docker{{ context }}]"

[segments.properties]
display_mode = "files"
"#,
    );

    assert_eq!(env.print(|_| {}), "[docker]");
}

#[test]
fn test_print_segments_in_config_order() {
    let env = TestEnv::new();
    env.make_working_copy();
    create_svn_mock(
        &env.bin_dir(),
        &SvnMock {
            status: "M       main.c\n",
            ..Default::default()
        },
    );
    env.write_config(
        r#"
[[segments]]
type = "docker"
template = "<{{ context }}>"

[[segments]]
type = "svn"
template = "<{{ repo }}@{{ branch }}{% if working.changed %}*{% endif %}>"

[segments.properties]
fetch_status = true
"#,
    );

    let prompt = env.print(|cmd| {
        cmd.env("DOCKER_CONTEXT", "remote");
    });
    assert_eq!(prompt, "<remote><project@trunk*>");
}

#[test]
fn test_print_invalid_config_fails() {
    let env = TestEnv::new();
    env.write_config("[[segments]]\ntype = \"git\"\n");

    let output = env.command().arg("print").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("promptline: Failed to load configuration"), "{stderr}");
}

#[test]
fn test_print_debug_logs_commands() {
    let env = TestEnv::new();
    env.make_working_copy();
    create_svn_mock(&env.bin_dir(), &SvnMock::default());
    env.write_config(SVN_FULL_STATUS);

    let output = env.command().args(["print", "--debug"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        " \u{e0a0}trunk r1133  "
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[pl-trace]"), "{stderr}");
    assert!(stderr.contains("Segment svn enabled=true"), "{stderr}");
}

#[test]
fn test_print_command_timeout_degrades() {
    let env = TestEnv::new();
    env.make_working_copy();
    crate::common::mock_commands::write_mock_script(
        &env.bin_dir(),
        "svn",
        "#!/bin/sh\nwhile :; do :; done\n",
    );
    env.write_config(&format!("command_timeout_ms = 100\n{SVN_FULL_STATUS}"));

    assert_eq!(env.print(|_| {}), " \u{e0a0} r0  ");
}
