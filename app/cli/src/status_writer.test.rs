use pretty_assertions::assert_eq;

use super::*;

fn versions(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(tool, version)| (tool.to_string(), version.to_string()))
        .collect()
}

#[test]
fn test_find_conflicts_reports_disagreements() {
    let mut all = BTreeMap::new();
    all.insert(
        "build-01:7767".to_string(),
        versions(&[("gcc9", "9.3.0"), ("clang12", "12.0.1")]),
    );
    all.insert(
        "build-02:7767".to_string(),
        versions(&[("gcc9", "9.4.0"), ("clang12", "12.0.1")]),
    );

    let conflicts = find_conflicts(&all);
    assert_eq!(conflicts.len(), 1);
    let gcc = conflicts.get("gcc9").unwrap();
    assert_eq!(gcc.get("build-01:7767").map(String::as_str), Some("9.3.0"));
    assert_eq!(gcc.get("build-02:7767").map(String::as_str), Some("9.4.0"));
}

#[test]
fn test_find_conflicts_empty_when_uniform() {
    let mut all = BTreeMap::new();
    all.insert("a".to_string(), versions(&[("gcc9", "9.3.0")]));
    all.insert("b".to_string(), versions(&[("gcc9", "9.3.0")]));
    assert!(find_conflicts(&all).is_empty());
}

#[test]
fn test_find_conflicts_single_host_never_conflicts() {
    let mut all = BTreeMap::new();
    all.insert("only".to_string(), versions(&[("gcc9", "9.3.0")]));
    assert!(find_conflicts(&all).is_empty());
}
