use assert_matches::assert_matches;

use portal_tracks::error::PortalError;
use portal_tracks::index::derive_index;

#[test]
fn compressed_vcf_gets_tabix_index() {
    assert_eq!(derive_index("a/b.vcf.gz").unwrap(), "a/b.vcf.gz.tbi");
}

#[test]
fn unknown_extension_fails() {
    assert_matches!(derive_index("a/b.xyz"), Err(PortalError::NoIndexAvailable(_)));
}

#[test]
fn alignment_indexes() {
    assert_eq!(
        derive_index("SBJ001/wgs/SBJ001_tumor.bam").unwrap(),
        "SBJ001/wgs/SBJ001_tumor.bam.bai"
    );
    assert_eq!(derive_index("x.cram").unwrap(), "x.cram.crai");
}

#[test]
fn sam_and_bcf_have_no_index_rule() {
    assert_matches!(derive_index("x.sam"), Err(PortalError::NoIndexAvailable(_)));
    assert_matches!(derive_index("x.bcf"), Err(PortalError::NoIndexAvailable(_)));
}
