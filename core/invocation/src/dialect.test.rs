use distbuild_config::ToolchainDialect;
use pretty_assertions::assert_eq;

use super::*;
use crate::commandline::ToolId;

fn derive(dialect: ToolchainDialect, args: &[&str]) -> ToolCommandline {
    let mut cmd = ToolCommandline::new(
        ToolId::new("tool", "tool"),
        dialect,
        args.iter().map(|s| s.to_string()).collect(),
    );
    parser_for(dialect).derive(&mut cmd);
    cmd
}

#[test]
fn test_gcc_compile_classified() {
    let cmd = derive(ToolchainDialect::Gcc, &["-c", "foo.cpp", "-o", "foo.o"]);
    assert_eq!(cmd.kind, InvokeKind::Compile);
    assert_eq!(cmd.input_index, Some(1));
    assert_eq!(cmd.output_index, Some(3));
}

#[test]
fn test_gcc_preprocess_classified() {
    let cmd = derive(ToolchainDialect::Gcc, &["-E", "foo.cpp", "-o", "foo.i"]);
    assert_eq!(cmd.kind, InvokeKind::Preprocess);
}

#[test]
fn test_gcc_no_type_flag_is_unknown() {
    // Linking: no -c/-E anywhere.
    let cmd = derive(ToolchainDialect::Gcc, &["foo.o", "bar.o", "-o", "app"]);
    assert_eq!(cmd.kind, InvokeKind::Unknown);
    assert_eq!(cmd.input_index, None);
    assert_eq!(cmd.output_index, None);
}

#[test]
fn test_gcc_two_inputs_is_unknown() {
    let cmd = derive(
        ToolchainDialect::Gcc,
        &["-c", "foo.cpp", "bar.cpp", "-o", "foo.o"],
    );
    assert_eq!(cmd.kind, InvokeKind::Unknown);
}

#[test]
fn test_gcc_missing_output_is_unknown() {
    let cmd = derive(ToolchainDialect::Gcc, &["-c", "foo.cpp"]);
    assert_eq!(cmd.kind, InvokeKind::Unknown);
}

#[test]
fn test_gcc_dangling_output_flag_is_unknown() {
    // -o with nothing after it: the pointed-to argument must exist.
    let cmd = derive(ToolchainDialect::Gcc, &["-c", "foo.cpp", "-o"]);
    assert_eq!(cmd.kind, InvokeKind::Unknown);
}

#[test]
fn test_gcc_consuming_flags_do_not_produce_inputs() {
    let cmd = derive(
        ToolchainDialect::Gcc,
        &[
            "-target", "arm64-apple-darwin", "-isysroot", "/sdk", "-arch", "arm64", "-x", "c++",
            "-MF", "foo.d", "-MT", "foo.o", "-c", "foo.cpp", "-o", "foo.o",
        ],
    );
    assert_eq!(cmd.kind, InvokeKind::Compile);
    assert_eq!(cmd.input(), Some("foo.cpp"));
    assert_eq!(cmd.output(), Some("foo.o"));
}

#[test]
fn test_gcc_attached_preprocessor_flags_are_not_inputs() {
    let cmd = derive(
        ToolchainDialect::Gcc,
        &["-Iinc", "-DFOO=1", "-Fframework", "-c", "foo.cpp", "-o", "foo.o"],
    );
    assert_eq!(cmd.input(), Some("foo.cpp"));
}

#[test]
fn test_gcc_set_invoke_kind_flips_flag() {
    let mut cmd = derive(ToolchainDialect::Gcc, &["-c", "foo.cpp", "-o", "foo.o"]);
    parser_for(ToolchainDialect::Gcc).set_invoke_kind(&mut cmd, InvokeKind::Preprocess);
    assert_eq!(cmd.args[0], "-E");
    assert_eq!(cmd.kind, InvokeKind::Preprocess);

    parser_for(ToolchainDialect::Gcc).set_invoke_kind(&mut cmd, InvokeKind::Compile);
    assert_eq!(cmd.args[0], "-c");
    assert_eq!(cmd.kind, InvokeKind::Compile);
}

#[test]
fn test_gcc_set_invoke_kind_noop_on_unknown() {
    let mut cmd = derive(ToolchainDialect::Gcc, &["--version"]);
    parser_for(ToolchainDialect::Gcc).set_invoke_kind(&mut cmd, InvokeKind::Preprocess);
    assert_eq!(cmd.args, vec!["--version"]);
    assert_eq!(cmd.kind, InvokeKind::Unknown);
}

#[test]
fn test_gcc_strip_dependency_flags() {
    let mut cmd = derive(
        ToolchainDialect::Gcc,
        &["-MMD", "-MD", "-MF", "foo.d", "-MT", "foo.o", "-c", "foo.cpp", "-o", "foo.o"],
    );
    parser_for(ToolchainDialect::Gcc).strip_dependency_flags(&mut cmd);
    assert_eq!(cmd.args, vec!["-c", "foo.cpp", "-o", "foo.o"]);
    assert_eq!(cmd.kind, InvokeKind::Compile);
}

#[test]
fn test_gcc_strip_preprocessor_flags() {
    let mut cmd = derive(
        ToolchainDialect::Gcc,
        &[
            "-Iinc", "-DFOO=1", "-isysroot", "/sdk", "-isystem", "/usr/inc", "-iframework", "/fw",
            "--serialize-diagnostics", "foo.dia", "-index-store-path", "/idx", "-O2", "-c",
            "foo.cpp", "-o", "foo.o",
        ],
    );
    parser_for(ToolchainDialect::Gcc).strip_preprocessor_flags(&mut cmd);
    assert_eq!(cmd.args, vec!["-O2", "-c", "foo.cpp", "-o", "foo.o"]);
}

#[test]
fn test_gcc_parse_is_idempotent() {
    let parser = parser_for(ToolchainDialect::Gcc);
    let mut cmd = derive(
        ToolchainDialect::Gcc,
        &["-O2", "-Iinc", "-c", "foo.cpp", "-o", "foo.o", "-MMD"],
    );
    let first = cmd.clone();
    parser.derive(&mut cmd);
    assert_eq!(cmd, first);
    parser.derive(&mut cmd);
    assert_eq!(cmd, first);
}

#[test]
fn test_clang_uses_gcc_dialect() {
    let cmd = derive(ToolchainDialect::Clang, &["-c", "foo.cpp", "-o", "foo.o"]);
    assert_eq!(cmd.kind, InvokeKind::Compile);
}

#[test]
fn test_msvc_classify() {
    let cmd = derive(
        ToolchainDialect::Msvc,
        &["/c", "foo.cpp", "/Foout/foo.obj", "/Iinc", "/DFOO=1"],
    );
    assert_eq!(cmd.kind, InvokeKind::Compile);
    assert_eq!(cmd.input(), Some("foo.cpp"));
    assert_eq!(cmd.output(), Some("out/foo.obj"));
}

#[test]
fn test_msvc_dash_flags_accepted() {
    let cmd = derive(ToolchainDialect::Msvc, &["-c", "foo.cpp", "-Fofoo.obj"]);
    assert_eq!(cmd.kind, InvokeKind::Compile);
    assert_eq!(cmd.output(), Some("foo.obj"));
}

#[test]
fn test_msvc_set_invoke_kind_switches_output_selector() {
    let parser = parser_for(ToolchainDialect::Msvc);
    let mut cmd = derive(ToolchainDialect::Msvc, &["/c", "foo.cpp", "/Fofoo.obj"]);

    parser.set_invoke_kind(&mut cmd, InvokeKind::Preprocess);
    assert_eq!(cmd.args, vec!["/P", "foo.cpp", "/Fifoo.obj"]);
    assert_eq!(cmd.kind, InvokeKind::Preprocess);

    parser.set_invoke_kind(&mut cmd, InvokeKind::Compile);
    assert_eq!(cmd.args, vec!["/c", "foo.cpp", "/Fofoo.obj"]);
}

#[test]
fn test_msvc_strip_preprocessor_flags() {
    let parser = parser_for(ToolchainDialect::Msvc);
    let mut cmd = derive(
        ToolchainDialect::Msvc,
        &["/Iinc", "/DFOO=1", "-Ienv", "/c", "foo.cpp", "/Fofoo.obj"],
    );
    parser.strip_preprocessor_flags(&mut cmd);
    assert_eq!(cmd.args, vec!["/c", "foo.cpp", "/Fofoo.obj"]);
}

#[test]
fn test_msvc_two_inputs_is_unknown() {
    let cmd = derive(
        ToolchainDialect::Msvc,
        &["/c", "foo.cpp", "bar.cpp", "/Fofoo.obj"],
    );
    assert_eq!(cmd.kind, InvokeKind::Unknown);
}

#[test]
fn test_update_file_last_argument_is_both_ends() {
    let cmd = derive(ToolchainDialect::UpdateFile, &["--touch", "stamp.txt"]);
    assert_eq!(cmd.kind, InvokeKind::Compile);
    assert_eq!(cmd.input(), Some("stamp.txt"));
    assert_eq!(cmd.output(), Some("stamp.txt"));
}

#[test]
fn test_update_file_empty_args_is_unknown() {
    let cmd = derive(ToolchainDialect::UpdateFile, &[]);
    assert_eq!(cmd.kind, InvokeKind::Unknown);
}
