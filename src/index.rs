use crate::error::PortalError;

/// Base-file suffix to index suffix, checked in order.
const INDEX_RULES: &[(&str, &str)] = &[
    ("bam", ".bai"),
    ("vcf", ".tbi"),
    ("vcf.gz", ".tbi"),
    ("cram", ".crai"),
];

/// Path of the companion index for a base file; the index suffix is
/// appended to the full base path.
pub fn derive_index(path: &str) -> Result<String, PortalError> {
    INDEX_RULES
        .iter()
        .find(|(base, _)| path.ends_with(base))
        .map(|(_, index)| format!("{path}{index}"))
        .ok_or_else(|| PortalError::NoIndexAvailable(path.to_string()))
}
