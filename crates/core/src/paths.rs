//! Output locations derived from the input file name

use std::path::{Path, PathBuf};

/// Input file name without its last extension. Falls back to `document`
/// when the path has no file name at all.
pub fn document_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// `<report_dir>/relatorio-<stem>.md`
pub fn report_path(report_dir: &Path, input: &Path) -> PathBuf {
    report_dir.join(format!("relatorio-{}.md", document_stem(input)))
}

/// `<image_dir>/<stem>/`
pub fn image_dir(image_root: &Path, input: &Path) -> PathBuf {
    image_root.join(document_stem(input))
}

/// `image_<page>_<index>.png`, both 0-based.
pub fn image_file_name(page: usize, index: usize) -> String {
    format!("image_{}_{}.png", page, index)
}
