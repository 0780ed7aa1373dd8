//! Output file naming.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Anything outside ASCII alphanumerics and `._@-`.
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._@-]").unwrap();
}

/// Replace every character outside `[A-Za-z0-9._@-]` with `-`, one dash per
/// character.
pub fn sanitize(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "-").into_owned()
}

/// File name for an embedded image: `page-<NNN>-img-<pos>.<ext>`.
///
/// `page_number` and `position` are 1-based.
pub fn image_file_name(page_number: u32, position: usize, extension: &str) -> String {
    sanitize(&format!("page-{page_number:03}-img-{position}.{extension}"))
}

/// File name for a page render: `page-<NNN>.png`.
pub fn page_render_file_name(page_number: u32) -> String {
    sanitize(&format!("page-{page_number:03}.png"))
}

/// Pick the path to write `file_name` to inside `folder`.
///
/// With `overwrite` the candidate path is always returned. Otherwise, if the
/// candidate exists, `-2`, `-3`, ... is appended to the stem until a free
/// path is found.
pub fn resolve_output_path(folder: &Path, file_name: &str, overwrite: bool) -> PathBuf {
    let candidate = folder.join(file_name);
    if overwrite || !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

    (2u64..)
        .map(|suffix| match &extension {
            Some(ext) => folder.join(format!("{stem}-{suffix}.{ext}")),
            None => folder.join(format!("{stem}-{suffix}")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("page-001-img-1.png"), "page-001-img-1.png");
        assert_eq!(sanitize("a b/c\\d:e"), "a-b-c-d-e");
        assert_eq!(sanitize("user@host_v1.2"), "user@host_v1.2");
        assert_eq!(sanitize("żółw.jpg"), "---w.jpg");
        assert_eq!(sanitize("tab\there\nnew+line%"), "tab-here-new-line-");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_file_names() {
        assert_eq!(image_file_name(1, 1, "png"), "page-001-img-1.png");
        assert_eq!(image_file_name(42, 12, "jpg"), "page-042-img-12.jpg");
        assert_eq!(image_file_name(1234, 1, "jpx"), "page-1234-img-1.jpx");
        assert_eq!(page_render_file_name(7), "page-007.png");
    }

    #[test]
    fn test_free_candidate_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = resolve_output_path(dir.path(), "page-001-img-1.png", false);
        assert_eq!(path, dir.path().join("page-001-img-1.png"));
    }

    #[test]
    fn test_collisions_start_at_two() {
        let dir = tempfile::tempdir().unwrap();
        let name = "page-001-img-1.png";

        fs::write(dir.path().join(name), b"first").unwrap();
        let second = resolve_output_path(dir.path(), name, false);
        assert_eq!(second, dir.path().join("page-001-img-1-2.png"));

        fs::write(&second, b"second").unwrap();
        let third = resolve_output_path(dir.path(), name, false);
        assert_eq!(third, dir.path().join("page-001-img-1-3.png"));

        assert_eq!(fs::read(dir.path().join(name)).unwrap(), b"first");
    }

    #[test]
    fn test_overwrite_reuses_candidate() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page-002.png"), b"old").unwrap();
        fs::write(dir.path().join("page-002-2.png"), b"old").unwrap();

        let path = resolve_output_path(dir.path(), "page-002.png", true);
        assert_eq!(path, dir.path().join("page-002.png"));
    }

    #[test]
    fn test_collision_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blob"), b"x").unwrap();
        assert_eq!(
            resolve_output_path(dir.path(), "blob", false),
            dir.path().join("blob-2")
        );
    }
}
