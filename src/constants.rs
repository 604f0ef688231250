pub const JQ_VCF_TAG: &str = "JQ_";
pub const JQ_SUMMARY_TAG: &str = "JQ_SUMMARY_";

pub const MUTECT_ABBREVIATION: &str = "MT";
pub const STRELKA_ABBREVIATION: &str = "SK";
pub const VARSCAN_ABBREVIATION: &str = "VS";

pub const CALLER_REPORTED_SUFFIX: &str = "CALLER_REPORTED";
pub const CALLER_PASSED_SUFFIX: &str = "CALLER_PASSED";

pub const MULT_ALT_LOCUS_FLAG: &str = "JQ_MULT_ALT_LOCUS";
pub const EXCLUDE_FILTER: &str = "JQ_EXCLUDE";
pub const MALFORMED_REF_FILTER: &str = "JQ_MALFORMED_REF";
pub const MALFORMED_ALT_FILTER: &str = "JQ_MALFORMED_ALT";
pub const MISSING_ALT_FILTER: &str = "JQ_MISSING_ALT";

/// Caller-recognition signatures matched against metaheader lines.
pub const MUTECT_SIGNATURE: &str = "##MuTect=";
pub const STRELKA_SIGNATURE: &str = "##source=strelka";
pub const VARSCAN_SIGNATURE: &str = "##source=VarScan2";

/// Required first-line prefix of a VarScan high-confidence filter file.
pub const VARSCAN_HC_HEADER_PREFIX: &str = "chrom\tposition";

pub const DEFAULT_VARSCAN_HC_PATTERN: &str = r"Somatic\.hc\.fpfilter\.pass";
pub const DEFAULT_INCLUDE_FORMAT_TAG_PATTERN: &str = "JQ_.*";

/// Maximum offending file names listed in a VarScan pairing error before the
/// remainder is collapsed into a count.
pub const MAX_LISTED_FILES: usize = 5;
