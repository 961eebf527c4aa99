// tests/comment/merge_test.rs
use db_enricher::comment::{merge_comments, strip_tagged_region, tag, UpdateMode};

#[test]
fn test_merge_into_empty_comment() {
    assert_eq!(
        merge_comments("", "Null Count: 0", UpdateMode::Overwrite),
        "<gemini>Null Count: 0</gemini>"
    );
}

#[test]
fn test_merge_appends_region_after_user_text() {
    assert_eq!(
        merge_comments("  Primary key  ", "Distinct Values: 10", UpdateMode::Overwrite),
        "Primary key <gemini>Distinct Values: 10</gemini>"
    );
}

#[test]
fn test_overwrite_replaces_region_content() {
    let existing = "Order id <gemini>Null Count: 4</gemini> see billing docs";
    assert_eq!(
        merge_comments(existing, "Null Count: 0", UpdateMode::Overwrite),
        "Order id <gemini>Null Count: 0</gemini> see billing docs"
    );
}

#[test]
fn test_append_joins_old_and_new_content() {
    let existing = "Order id <gemini>Null Count: 4</gemini>";
    assert_eq!(
        merge_comments(existing, "Distinct Values: 9", UpdateMode::Append),
        "Order id <gemini>Null Count: 4 | Distinct Values: 9</gemini>"
    );
}

#[test]
fn test_append_into_empty_region() {
    assert_eq!(
        merge_comments("<gemini> </gemini>", "Null Count: 1", UpdateMode::Append),
        "<gemini>Null Count: 1</gemini>"
    );
}

#[test]
fn test_empty_metadata_removes_region() {
    let existing = "Order id <gemini>Null Count: 4</gemini> see billing docs";
    for mode in [UpdateMode::Overwrite, UpdateMode::Append] {
        assert_eq!(
            merge_comments(existing, "   ", mode),
            "Order id see billing docs"
        );
    }
}

#[test]
fn test_overwrite_is_idempotent() {
    let existing = "Customer email";
    let once = merge_comments(existing, "Examples: ['a@x.io']", UpdateMode::Overwrite);
    let twice = merge_comments(&once, "Examples: ['a@x.io']", UpdateMode::Overwrite);
    assert_eq!(once, twice);
}

#[test]
fn test_user_text_survives_merge_then_strip() {
    let user_text = "Set by the billing service; never null";
    let merged = merge_comments(user_text, "Null Count: 0", UpdateMode::Overwrite);
    assert!(merged.starts_with(user_text));
    assert_eq!(strip_tagged_region(&merged), user_text);
}

#[test]
fn test_malformed_markers_are_user_text() {
    let existing = "a </gemini> b <gemini>";
    assert_eq!(
        merge_comments(existing, "x", UpdateMode::Overwrite),
        format!("{existing} {}", tag("x"))
    );
    assert_eq!(strip_tagged_region(existing), existing);
}

#[test]
fn test_strip_region_only_comment_is_empty() {
    assert_eq!(strip_tagged_region("<gemini>Null Count: 3</gemini>"), "");
}

#[test]
fn test_documented_scenarios() {
    assert_eq!(
        merge_comments("User email column", "Examples: 'a','b' | Null Count: 0", UpdateMode::Overwrite),
        "User email column <gemini>Examples: 'a','b' | Null Count: 0</gemini>"
    );
    assert_eq!(
        merge_comments("Prefix <gemini>Old</gemini> Suffix", "New", UpdateMode::Append),
        "Prefix <gemini>Old | New</gemini> Suffix"
    );
    assert_eq!(merge_comments("<gemini>Data</gemini>", "", UpdateMode::Overwrite), "");
}

#[test]
fn test_merge_then_clear_restores_user_text() {
    let existing = "  Billing address  <gemini>stale</gemini>  line two ";
    for mode in [UpdateMode::Overwrite, UpdateMode::Append] {
        let merged = merge_comments(existing, "Null Count: 2", mode);
        assert_eq!(merge_comments(&merged, "", mode), "Billing address line two");
    }
}
