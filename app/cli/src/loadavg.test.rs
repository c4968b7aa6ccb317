use super::*;

#[test]
fn test_one_minute_is_finite_and_non_negative() {
    let load = one_minute();
    assert!(load.is_finite());
    assert!(load >= 0.0);
}
