use distbuild_config::ToolchainDialect;
use pretty_assertions::assert_eq;

use super::*;
use crate::dialect::parser_for;

fn gcc_cmd(args: &[&str]) -> ToolCommandline {
    let mut cmd = ToolCommandline::new(
        ToolId::new("gcc9", "/usr/bin/gcc-9"),
        ToolchainDialect::Gcc,
        args.iter().map(|s| s.to_string()).collect(),
    );
    parser_for(cmd.dialect).derive(&mut cmd);
    cmd
}

#[test]
fn test_input_output_accessors() {
    let cmd = gcc_cmd(&["-c", "foo.cpp", "-o", "foo.o"]);
    assert_eq!(cmd.kind, InvokeKind::Compile);
    assert_eq!(cmd.input(), Some("foo.cpp"));
    assert_eq!(cmd.output(), Some("foo.o"));
}

#[test]
fn test_set_input_rewrites_in_place() {
    let mut cmd = gcc_cmd(&["-c", "foo.cpp", "-o", "foo.o"]);
    cmd.set_input("/scratch/foo.i");
    assert_eq!(cmd.args, vec!["-c", "/scratch/foo.i", "-o", "foo.o"]);
    assert_eq!(cmd.input(), Some("/scratch/foo.i"));
}

#[test]
fn test_set_output_rewrites_in_place() {
    let mut cmd = gcc_cmd(&["-c", "foo.cpp", "-o", "foo.o"]);
    cmd.set_output("/scratch/foo.o");
    assert_eq!(cmd.output(), Some("/scratch/foo.o"));
}

#[test]
fn test_msvc_attached_output_accessor() {
    let mut cmd = ToolCommandline::new(
        ToolId::new("msvc19", "cl.exe"),
        ToolchainDialect::Msvc,
        vec![
            "/c".to_string(),
            "foo.cpp".to_string(),
            "/Foout/foo.obj".to_string(),
        ],
    );
    parser_for(cmd.dialect).derive(&mut cmd);
    assert_eq!(cmd.kind, InvokeKind::Compile);
    assert_eq!(cmd.output(), Some("out/foo.obj"));

    cmd.set_output("scratch/foo.obj");
    assert_eq!(cmd.args[2], "/Foscratch/foo.obj");
    assert_eq!(cmd.output(), Some("scratch/foo.obj"));
}

#[test]
fn test_unknown_commandline_has_no_accessors() {
    let cmd = gcc_cmd(&["--version"]);
    assert_eq!(cmd.kind, InvokeKind::Unknown);
    assert_eq!(cmd.input(), None);
    assert_eq!(cmd.output(), None);
}
