use distbuild_config::ToolDefinition;
use distbuild_config::ToolchainDialect;
use pretty_assertions::assert_eq;

use super::*;
use crate::commandline::InvokeKind;

fn rewriter() -> InvocationRewriter {
    InvocationRewriter::new(vec![
        ToolDefinition {
            id: "gcc9".to_string(),
            names: vec!["gcc".to_string(), "gcc-9".to_string(), "g++-9".to_string()],
            dialect: ToolchainDialect::Gcc,
            ..Default::default()
        },
        ToolDefinition {
            id: "touch".to_string(),
            names: vec!["touch".to_string()],
            dialect: ToolchainDialect::UpdateFile,
            ..Default::default()
        },
        ToolDefinition {
            id: "xgcc".to_string(),
            names: vec!["xgcc".to_string()],
            dialect: ToolchainDialect::Gcc,
            remove_remote: vec!["-fdiagnostics-color=always".to_string()],
            append_remote: vec!["-fpreprocessed".to_string()],
            remote_alias: Some("gcc9-cross".to_string()),
            ..Default::default()
        },
    ])
}

fn argv(line: &[&str]) -> Vec<String> {
    line.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_recognize_by_name_and_path() {
    let rewriter = rewriter();
    let cmd = rewriter
        .recognize(&argv(&["/usr/bin/gcc-9", "-c", "foo.cpp", "-o", "foo.o"]))
        .unwrap();
    assert_eq!(cmd.tool.tool_id, "gcc9");
    assert_eq!(cmd.kind, InvokeKind::Compile);
}

#[test]
fn test_recognize_unknown_tool() {
    let rewriter = rewriter();
    assert!(rewriter.recognize(&argv(&["icc", "-c", "a.c"])).is_err());
    assert!(rewriter.recognize(&[]).is_err());
}

#[test]
fn test_parse_for_wire_side() {
    let rewriter = rewriter();
    let cmd = rewriter
        .parse("gcc9", argv(&["-c", "foo.i", "-o", "foo.o"]))
        .unwrap();
    assert_eq!(cmd.tool.executable.to_str(), Some("gcc"));
    assert_eq!(cmd.kind, InvokeKind::Compile);
}

#[test]
fn test_split_full_scenario() {
    let rewriter = rewriter();
    let cmd = rewriter
        .recognize(&argv(&[
            "gcc",
            "-O2",
            "-DFOO=1",
            "-Iinc",
            "-isysroot",
            "/sdk",
            "-c",
            "src/foo.cpp",
            "-o",
            "out/foo.o",
            "-MMD",
            "-MF",
            "out/foo.d",
        ]))
        .unwrap();

    let split = rewriter.split(&cmd, "/scratch/foo.i").unwrap();

    assert_eq!(
        split.preprocess.args,
        vec![
            "-O2",
            "-DFOO=1",
            "-Iinc",
            "-isysroot",
            "/sdk",
            "-E",
            "src/foo.cpp",
            "-o",
            "/scratch/foo.i",
        ]
    );
    assert_eq!(split.preprocess.kind, InvokeKind::Preprocess);
    assert_eq!(split.preprocess.input(), Some("src/foo.cpp"));
    assert_eq!(split.preprocess.output(), Some("/scratch/foo.i"));

    assert_eq!(
        split.compile.args,
        vec!["-O2", "-c", "/scratch/foo.i", "-o", "out/foo.o"]
    );
    assert_eq!(split.compile.kind, InvokeKind::Compile);
    assert_eq!(split.compile.input(), Some("/scratch/foo.i"));
    assert_eq!(split.compile.output(), Some("out/foo.o"));
}

#[test]
fn test_split_indices_stay_valid() {
    let rewriter = rewriter();
    let cmd = rewriter
        .recognize(&argv(&["gcc", "-Iinc", "-c", "a.cpp", "-o", "a.o"]))
        .unwrap();
    let split = rewriter.split(&cmd, "/t/a.i").unwrap();

    for half in [&split.preprocess, &split.compile] {
        let input = half.input_index.unwrap();
        let output = half.output_index.unwrap();
        assert!(input < half.args.len());
        assert!(output < half.args.len());
    }
}

#[test]
fn test_split_rejects_unknown() {
    let rewriter = rewriter();
    let cmd = rewriter.recognize(&argv(&["gcc", "--version"])).unwrap();
    assert!(rewriter.split(&cmd, "/t/x.i").is_err());
}

#[test]
fn test_split_rejects_link_lines() {
    let rewriter = rewriter();
    let cmd = rewriter
        .recognize(&argv(&["gcc", "foo.o", "bar.o", "-o", "app"]))
        .unwrap();
    assert_eq!(cmd.kind, InvokeKind::Unknown);
    assert!(rewriter.split(&cmd, "/t/x.i").is_err());
}

#[test]
fn test_split_rejects_update_file_tools() {
    let rewriter = rewriter();
    let cmd = rewriter.recognize(&argv(&["touch", "stamp.txt"])).unwrap();
    assert_eq!(cmd.kind, InvokeKind::Compile);
    assert!(rewriter.split(&cmd, "/t/x.i").is_err());
}

#[test]
fn test_prepare_remote_applies_transforms() {
    let rewriter = rewriter();
    let cmd = rewriter
        .recognize(&argv(&[
            "xgcc",
            "-fdiagnostics-color=always",
            "-c",
            "foo.i",
            "-o",
            "foo.o",
        ]))
        .unwrap();

    let mut remote = cmd.clone();
    rewriter.prepare_remote(&mut remote);

    assert_eq!(remote.tool.tool_id, "gcc9-cross");
    assert!(!remote.args.contains(&"-fdiagnostics-color=always".to_string()));
    assert!(remote.args.contains(&"-fpreprocessed".to_string()));
    assert_eq!(remote.kind, InvokeKind::Compile);
}

#[test]
fn test_split_then_reparse_round_trips() {
    // Re-deriving either half from its own argument list reproduces the
    // same classification.
    let rewriter = rewriter();
    let cmd = rewriter
        .recognize(&argv(&["gcc", "-O2", "-Iinc", "-c", "x.cpp", "-o", "x.o"]))
        .unwrap();
    let split = rewriter.split(&cmd, "/t/x.i").unwrap();

    let reparsed = rewriter
        .parse("gcc9", split.compile.args.clone())
        .unwrap();
    assert_eq!(reparsed.kind, split.compile.kind);
    assert_eq!(reparsed.input_index, split.compile.input_index);
    assert_eq!(reparsed.output_index, split.compile.output_index);
}
