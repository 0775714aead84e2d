//! Assertion helpers for import steps

#![allow(dead_code)]

use cfgsync_core::ConfigStorage;
use cfgsync_import::ImportStep;

fn position(steps: &[ImportStep], display: &str) -> usize {
    steps
        .iter()
        .position(|s| s.to_string() == display)
        .unwrap_or_else(|| panic!("step '{}' not found in {:?}", display, render(steps)))
}

/// Render steps the way they are displayed
pub fn render(steps: &[ImportStep]) -> Vec<String> {
    steps.iter().map(ToString::to_string).collect()
}

/// Assert that step `first` comes before step `second`
pub fn assert_before(steps: &[ImportStep], first: &str, second: &str) {
    let a = position(steps, first);
    let b = position(steps, second);
    assert!(
        a < b,
        "expected '{}' before '{}' in {:?}",
        first,
        second,
        render(steps)
    );
}

/// Assert that a storage holds exactly the given names
pub fn assert_names(storage: &dyn ConfigStorage, expected: &[&str]) {
    let names = storage.list_all("").unwrap();
    assert_eq!(names, expected, "unexpected storage content");
}
