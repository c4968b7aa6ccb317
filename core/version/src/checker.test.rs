use pretty_assertions::assert_eq;

use super::*;

#[cfg(unix)]
fn fake_tool(dir: &tempfile::TempDir, name: &str, script: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn checker_for(tools: Vec<ToolDefinition>, tmp: &tempfile::TempDir) -> VersionChecker {
    let executor = LocalExecutor::new(2, tmp.path().join("scratch"));
    VersionChecker::new(executor, InvocationRewriter::new(tools))
}

#[tokio::test]
async fn test_pinned_version_skips_probe() {
    let tmp = tempfile::tempdir().unwrap();
    let checker = checker_for(
        vec![ToolDefinition {
            id: "gcc9".to_string(),
            names: vec!["/does/not/exist".to_string()],
            dialect: ToolchainDialect::Gcc,
            version: Some("9.3.0".to_string()),
            ..Default::default()
        }],
        &tmp,
    );
    let versions = checker.determine_tool_versions(&[]).await;
    assert_eq!(versions.get("gcc9").map(String::as_str), Some("9.3.0"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_gcc_dump_version_probe() {
    let tmp = tempfile::tempdir().unwrap();
    let gcc = fake_tool(&tmp, "fake-gcc", "echo 9.3.0");
    let checker = checker_for(
        vec![ToolDefinition {
            id: "gcc9".to_string(),
            names: vec![gcc],
            dialect: ToolchainDialect::Gcc,
            ..Default::default()
        }],
        &tmp,
    );
    let versions = checker.determine_tool_versions(&[]).await;
    assert_eq!(versions.get("gcc9").map(String::as_str), Some("9.3.0"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_clang_banner_probe() {
    let tmp = tempfile::tempdir().unwrap();
    let clang = fake_tool(
        &tmp,
        "fake-clang",
        "echo 'Apple clang version 12.0.1 (clang-1200.0.32.29)'",
    );
    let checker = checker_for(
        vec![ToolDefinition {
            id: "clang12".to_string(),
            names: vec![clang],
            dialect: ToolchainDialect::Clang,
            ..Default::default()
        }],
        &tmp,
    );
    let versions = checker.determine_tool_versions(&[]).await;
    assert_eq!(versions.get("clang12").map(String::as_str), Some("12.0.1"));
}

#[tokio::test]
async fn test_update_file_tools_have_empty_version() {
    let tmp = tempfile::tempdir().unwrap();
    let checker = checker_for(
        vec![ToolDefinition {
            id: "touch".to_string(),
            names: vec!["touch".to_string()],
            dialect: ToolchainDialect::UpdateFile,
            ..Default::default()
        }],
        &tmp,
    );
    let versions = checker.determine_tool_versions(&[]).await;
    assert_eq!(versions.get("touch").map(String::as_str), Some(""));
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_probe_yields_empty_version() {
    let tmp = tempfile::tempdir().unwrap();
    let broken = fake_tool(&tmp, "fake-broken", "exit 1");
    let checker = checker_for(
        vec![ToolDefinition {
            id: "broken".to_string(),
            names: vec![broken],
            dialect: ToolchainDialect::Gcc,
            ..Default::default()
        }],
        &tmp,
    );
    let versions = checker.determine_tool_versions(&[]).await;
    assert_eq!(versions.get("broken").map(String::as_str), Some(""));
}

#[cfg(unix)]
#[tokio::test]
async fn test_only_filter_restricts_probing() {
    let tmp = tempfile::tempdir().unwrap();
    let gcc = fake_tool(&tmp, "fake-gcc", "echo 9.3.0");
    let checker = checker_for(
        vec![
            ToolDefinition {
                id: "gcc9".to_string(),
                names: vec![gcc],
                dialect: ToolchainDialect::Gcc,
                ..Default::default()
            },
            ToolDefinition {
                id: "other".to_string(),
                names: vec!["other".to_string()],
                version: Some("1.0".to_string()),
                ..Default::default()
            },
        ],
        &tmp,
    );
    let versions = checker
        .determine_tool_versions(&["gcc9".to_string()])
        .await;
    assert_eq!(versions.len(), 1);
    assert!(versions.contains_key("gcc9"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_msvc_banner_regex() {
    let tmp = tempfile::tempdir().unwrap();
    let cl = fake_tool(
        &tmp,
        "fake-cl",
        "echo 'Microsoft (R) C/C++ Optimizing Compiler Version 19.29.30133 for x64' >&2",
    );
    let checker = checker_for(
        vec![ToolDefinition {
            id: "msvc19".to_string(),
            names: vec![cl],
            dialect: ToolchainDialect::Msvc,
            ..Default::default()
        }],
        &tmp,
    );
    let versions = checker.determine_tool_versions(&[]).await;
    assert_eq!(
        versions.get("msvc19").map(String::as_str),
        Some("19.29.30133 for x64")
    );
}
