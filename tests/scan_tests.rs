use std::fs;
use std::path::Path;

use magic_paper::error::Error;
use magic_paper::scan::{is_supported_image, list_candidates};
use tempfile::tempdir;

#[test]
fn lists_recursively_in_lexicographic_order() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("b.png"), b"x").unwrap();
    fs::write(root.join("a.jpg"), b"x").unwrap();
    fs::write(root.join("sub").join("c.webp"), b"x").unwrap();
    fs::write(root.join("notes.txt"), b"x").unwrap();

    let found = list_candidates(root).unwrap();
    assert_eq!(
        found,
        vec![
            root.join("a.jpg"),
            root.join("b.png"),
            root.join("sub").join("c.webp"),
        ]
    );
}

#[test]
fn listing_is_deterministic() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    for name in ["z.png", "m.png", "a.png"] {
        fs::write(root.join(name), b"x").unwrap();
    }
    assert_eq!(list_candidates(root).unwrap(), list_candidates(root).unwrap());
}

#[test]
fn missing_directory_is_an_error() {
    let tmp = tempdir().unwrap();
    let gone = tmp.path().join("gone");
    match list_candidates(&gone) {
        Err(Error::DirectoryNotFound(p)) => assert_eq!(p, gone),
        other => panic!("expected DirectoryNotFound, got {other:?}"),
    }
}

#[test]
fn empty_directory_yields_empty_list() {
    let tmp = tempdir().unwrap();
    assert!(list_candidates(tmp.path()).unwrap().is_empty());
}

#[test]
fn hidden_directories_are_skipped() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join(".thumbnails")).unwrap();
    fs::write(root.join(".thumbnails").join("t.png"), b"x").unwrap();
    fs::write(root.join("real.png"), b"x").unwrap();

    assert_eq!(list_candidates(root).unwrap(), vec![root.join("real.png")]);
}

#[test]
fn extension_check_is_case_insensitive() {
    assert!(is_supported_image(Path::new("photo.JPG")));
    assert!(is_supported_image(Path::new("photo.jpeg")));
    assert!(!is_supported_image(Path::new("notes.txt")));
    assert!(!is_supported_image(Path::new("no_extension")));
}
