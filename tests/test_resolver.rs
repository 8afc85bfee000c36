use std::path::PathBuf;

use torero_serve::files::resolver::normalize_target;
use torero_serve::files::{DirEntry, ResolvedResource, resolve};

/// Returns (tempdir guard, canonical document root inside it).
///
/// The root is a subdirectory so there is something outside it to
/// escape to: `secret.txt` sits next to the root.
fn fixture() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("www");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();
    std::fs::write(root.join("index.html"), "<p>hi</p>").unwrap();
    std::fs::write(root.join("data.bin"), [0u8, 1, 2, 3, 4]).unwrap();
    std::fs::write(root.join("hello world.txt"), "spaces").unwrap();
    std::fs::create_dir(root.join("sub")).unwrap();
    std::fs::write(root.join("sub").join("b.css"), "b{}").unwrap();
    std::fs::write(root.join("sub").join("a.txt"), "a").unwrap();
    let root = std::fs::canonicalize(root).unwrap();
    (dir, root)
}

#[test]
fn test_normalize_plain_paths() {
    assert_eq!(normalize_target("/"), Some(vec![]));
    assert_eq!(normalize_target("/a/b.txt"), Some(vec!["a".to_string(), "b.txt".to_string()]));
    assert_eq!(normalize_target("//a///b/"), Some(vec!["a".to_string(), "b".to_string()]));
}

#[test]
fn test_normalize_dot_segments_stay_inside() {
    assert_eq!(normalize_target("/a/./b/../c"), Some(vec!["a".to_string(), "c".to_string()]));
    assert_eq!(normalize_target("/a/.."), Some(vec![]));
}

#[test]
fn test_normalize_rejects_escapes() {
    for target in [
        "/..",
        "/../../etc/passwd",
        "/a/../../etc/passwd",
        "/%2e%2e/etc/passwd",
        "/%2E%2E/%2e%2e/etc/passwd",
        "/a/%2e%2e/%2e%2e/x",
    ] {
        assert_eq!(normalize_target(target), None, "{} must be rejected", target);
    }
}

#[test]
fn test_normalize_rejects_encoded_separators() {
    assert_eq!(normalize_target("/..%2fetc%2fpasswd"), None);
    assert_eq!(normalize_target("/a%2Fb"), None);
    assert_eq!(normalize_target("/a%5cb"), None);
    assert_eq!(normalize_target("/a%00b"), None);
}

#[test]
fn test_normalize_rejects_bad_encoding() {
    assert_eq!(normalize_target("/a%zz"), None);
    assert_eq!(normalize_target("/a%2"), None);
    assert_eq!(normalize_target("/%c3%28"), None);
}

#[test]
fn test_normalize_ignores_query_and_fragment() {
    assert_eq!(
        normalize_target("/a.txt?x=/../../etc#frag"),
        Some(vec!["a.txt".to_string()])
    );
}

#[test]
fn test_normalize_absolute_form() {
    assert_eq!(
        normalize_target("http://example.com/sub/a.txt?q=1"),
        Some(vec!["sub".to_string(), "a.txt".to_string()])
    );
}

#[tokio::test]
async fn test_resolve_regular_file() {
    let (_dir, root) = fixture();

    let resolved = resolve(&root, "/index.html").await;

    assert_eq!(
        resolved,
        ResolvedResource::RegularFile {
            path: root.join("index.html"),
            size: 9,
            mime: "text/html; charset=utf-8",
        }
    );
}

#[tokio::test]
async fn test_resolve_unknown_extension_is_octet_stream() {
    let (_dir, root) = fixture();

    match resolve(&root, "/data.bin").await {
        ResolvedResource::RegularFile { size, mime, .. } => {
            assert_eq!(size, 5);
            assert_eq!(mime, "application/octet-stream");
        }
        other => panic!("expected a file, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resolve_percent_encoded_name() {
    let (_dir, root) = fixture();

    match resolve(&root, "/hello%20world.txt").await {
        ResolvedResource::RegularFile { path, .. } => {
            assert_eq!(path, root.join("hello world.txt"));
        }
        other => panic!("expected a file, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resolve_directory_entries_sorted() {
    let (_dir, root) = fixture();

    match resolve(&root, "/sub").await {
        ResolvedResource::Directory {
            path,
            segments,
            entries,
        } => {
            assert_eq!(path, root.join("sub"));
            assert_eq!(segments, vec!["sub".to_string()]);
            assert_eq!(
                entries,
                vec![
                    DirEntry { name: "a.txt".to_string(), is_dir: false },
                    DirEntry { name: "b.css".to_string(), is_dir: false },
                ]
            );
        }
        other => panic!("expected a directory, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resolve_root_directory() {
    let (_dir, root) = fixture();

    match resolve(&root, "/").await {
        ResolvedResource::Directory { segments, entries, .. } => {
            assert!(segments.is_empty());
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["data.bin", "hello world.txt", "index.html", "sub"]);
            assert!(entries.iter().find(|e| e.name == "sub").unwrap().is_dir);
        }
        other => panic!("expected a directory, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resolve_missing_is_not_found() {
    let (_dir, root) = fixture();
    assert_eq!(resolve(&root, "/missing.txt").await, ResolvedResource::NotFound);
    assert_eq!(resolve(&root, "/sub/missing/deeper").await, ResolvedResource::NotFound);
}

#[tokio::test]
async fn test_resolve_traversal_is_forbidden() {
    let (_dir, root) = fixture();

    for target in ["/../secret.txt", "/sub/../../secret.txt", "/%2e%2e/secret.txt"] {
        assert_eq!(resolve(&root, target).await, ResolvedResource::Forbidden, "{}", target);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_resolve_symlink_escaping_root_is_forbidden() {
    let (dir, root) = fixture();
    std::os::unix::fs::symlink(dir.path().join("secret.txt"), root.join("leak.txt")).unwrap();
    std::os::unix::fs::symlink(dir.path(), root.join("up")).unwrap();

    assert_eq!(resolve(&root, "/leak.txt").await, ResolvedResource::Forbidden);
    assert_eq!(resolve(&root, "/up/secret.txt").await, ResolvedResource::Forbidden);
}

#[cfg(unix)]
#[tokio::test]
async fn test_resolve_symlink_inside_root_is_followed() {
    let (_dir, root) = fixture();
    std::os::unix::fs::symlink(root.join("sub").join("a.txt"), root.join("alias.txt")).unwrap();

    match resolve(&root, "/alias.txt").await {
        ResolvedResource::RegularFile { path, mime, .. } => {
            assert_eq!(path, root.join("sub").join("a.txt"));
            assert_eq!(mime, "text/plain; charset=utf-8");
        }
        other => panic!("expected a file, got {:?}", other),
    }
}
