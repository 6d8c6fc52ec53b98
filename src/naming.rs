use camino::Utf8Path;

use crate::domain::{ALIGNMENT_EXTENSIONS, LimsRecord, SubjectContext};

/// Display name for a track: subject id (unless the filename already
/// carries it), the libraries sequenced from the file's sample for
/// alignment files, then the filename, joined with `_`.
///
/// Pure and total. Without matching lab metadata the name falls back to
/// the filename, prefixed only by the subject id when needed.
pub fn compose_name(path: &str, subject_id: &str, lims: &[LimsRecord]) -> String {
    let filename = Utf8Path::new(path)
        .file_name()
        .unwrap_or(path)
        .to_string();
    let extension = Utf8Path::new(&filename).extension().unwrap_or_default();
    let sample_id = filename
        .split(['_', '.'])
        .next()
        .unwrap_or_default();

    let mut segments: Vec<&str> = Vec::new();
    if !subject_id.is_empty() && !filename.starts_with(subject_id) {
        segments.push(subject_id);
    }

    if ALIGNMENT_EXTENSIONS.contains(&extension) && !sample_id.is_empty() {
        for record in lims.iter().filter(|record| record.sample_id == sample_id) {
            let library = record.library_id.as_str();
            if !library.is_empty() && !segments.contains(&library) {
                segments.push(library);
            }
        }
    }

    segments.push(&filename);
    segments.join("_")
}

pub fn compose_for(path: &str, context: &SubjectContext) -> String {
    compose_name(path, &context.subject_id, &context.lims)
}
