use crate::{
    constants::MULT_ALT_LOCUS_FLAG,
    core::{callers::common::TranslatedVcfReader, vcf_record::VcfRecord},
    error::{JacquardError, JqResult},
    utils::util::natural_cmp,
};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

pub const OUTPUT_FILEFORMAT: &str = "##fileformat=VCFv4.1";

static SOMATIC_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^JQ_.*_HC_SOM$").expect("static regex is valid"));

/// True when any sample carries a JQ somatic tag equal to "1".
pub fn is_somatic(record: &VcfRecord) -> bool {
    record.sample_tag_values.values().any(|tag_values| {
        tag_values
            .iter()
            .any(|(tag, value)| SOMATIC_TAG_REGEX.is_match(tag) && value == "1")
    })
}

/// Per-record inclusion policy (`--include-variants`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncludeVariants {
    /// Everything except records flagged JQ_EXCLUDE during translation.
    #[default]
    All,
    Passed,
    Somatic,
}

impl IncludeVariants {
    pub fn includes(&self, record: &VcfRecord) -> bool {
        match self {
            IncludeVariants::All => !record
                .filter
                .split(';')
                .any(|flag| flag == crate::constants::EXCLUDE_FILTER),
            IncludeVariants::Passed => record.filter == "PASS",
            IncludeVariants::Somatic => is_somatic(record),
        }
    }
}

impl std::str::FromStr for IncludeVariants {
    type Err = JacquardError;

    fn from_str(value: &str) -> JqResult<Self> {
        match value {
            "all" => Ok(IncludeVariants::All),
            "passed" => Ok(IncludeVariants::Passed),
            "somatic" => Ok(IncludeVariants::Somatic),
            _ => Err(crate::jq_error!(
                "Invalid --include-variants value [{value}]; expected all, passed, or somatic"
            )),
        }
    }
}

/// Whole-locus inclusion policy (`--include-loci`), judged over every record
/// pulled at a coordinate. The all_* variants drop the entire coordinate when
/// any contributing record fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncludeLoci {
    #[default]
    All,
    AnyPassed,
    AllPassed,
    AnySomatic,
    AllSomatic,
}

impl IncludeLoci {
    pub fn includes(&self, pulled_records: &[&VcfRecord]) -> bool {
        match self {
            IncludeLoci::All => true,
            IncludeLoci::AnyPassed => pulled_records.iter().any(|record| record.filter == "PASS"),
            IncludeLoci::AllPassed => pulled_records.iter().all(|record| record.filter == "PASS"),
            IncludeLoci::AnySomatic => pulled_records.iter().any(|record| is_somatic(record)),
            IncludeLoci::AllSomatic => pulled_records.iter().all(|record| is_somatic(record)),
        }
    }
}

impl std::str::FromStr for IncludeLoci {
    type Err = JacquardError;

    fn from_str(value: &str) -> JqResult<Self> {
        match value {
            "all" => Ok(IncludeLoci::All),
            "any_passed" => Ok(IncludeLoci::AnyPassed),
            "all_passed" => Ok(IncludeLoci::AllPassed),
            "any_somatic" => Ok(IncludeLoci::AnySomatic),
            "all_somatic" => Ok(IncludeLoci::AllSomatic),
            _ => Err(crate::jq_error!(
                "Invalid --include-loci value [{value}]; expected all, any_passed, all_passed, \
                 any_somatic, or all_somatic"
            )),
        }
    }
}

/// One-record lookahead over a reader whose stream is already coordinate
/// sorted. `next_if_equals` consumes the buffered record only when it matches
/// the requested coordinate; otherwise the reader stays parked for the next
/// coordinate.
pub struct BufferedReader {
    reader: TranslatedVcfReader,
    current: Option<VcfRecord>,
}

impl BufferedReader {
    /// The reader must already be open; the buffer is seeded with its first
    /// record.
    pub fn new(mut reader: TranslatedVcfReader) -> JqResult<Self> {
        let current = reader.next_record()?;
        Ok(BufferedReader { reader, current })
    }

    pub fn next_if_equals(&mut self, coordinate: &VcfRecord) -> JqResult<Option<VcfRecord>> {
        if self.current.as_ref() != Some(coordinate) {
            return Ok(None);
        }
        let matched = self.current.take();
        self.current = self.reader.next_record()?;
        Ok(matched)
    }

    pub fn into_reader(self) -> TranslatedVcfReader {
        self.reader
    }
}

/// Streams every reader once, building the sorted superset of distinct
/// coordinates, each stub flagged JQ_MULT_ALT_LOCUS when its locus shows more
/// than one distinct (ref, alt) pair or a comma-separated alt. Readers must
/// be open; each is left positioned at end-of-stream and must be reopened for
/// the join phase. Unsorted input is a fatal error.
pub fn build_coordinates(
    readers: &mut [TranslatedVcfReader],
    include_variants: IncludeVariants,
) -> JqResult<Vec<VcfRecord>> {
    let mut coordinate_set: HashSet<VcfRecord> = HashSet::new();
    let mut alts_by_locus: HashMap<(String, String), HashSet<(String, String)>> = HashMap::new();

    for reader in readers.iter_mut() {
        let mut previous: Option<VcfRecord> = None;
        while let Some(record) = reader.next_record()? {
            if let Some(previous) = &previous {
                if record < *previous {
                    return Err(JacquardError::UnsortedInput {
                        file_name: reader.file_name().to_string(),
                        coordinate: record.coordinate(),
                    });
                }
            }
            if include_variants.includes(&record) {
                alts_by_locus
                    .entry((record.chrom.clone(), record.pos.clone()))
                    .or_default()
                    .insert((record.ref_allele.clone(), record.alt.clone()));
                coordinate_set.insert(record.empty_record());
            }
            previous = Some(record);
        }
        log::debug!(
            "Coordinate scan finished for [{}]: {} distinct coordinates so far",
            reader.file_name(),
            coordinate_set.len()
        );
    }

    let mut coordinates: Vec<VcfRecord> = coordinate_set.into_iter().collect();
    coordinates.sort();
    for stub in coordinates.iter_mut() {
        let locus = (stub.chrom.clone(), stub.pos.clone());
        let multi_allelic = stub.alt.contains(',')
            || alts_by_locus
                .get(&locus)
                .is_some_and(|alt_pairs| alt_pairs.len() > 1);
        if multi_allelic {
            stub.add_info_field(MULT_ALT_LOCUS_FLAG)?;
        }
    }
    Ok(coordinates)
}

/// Sample/tag bookkeeping for one merge run: patient-qualified output sample
/// keys and the FORMAT tag inclusion regexes.
pub struct MergeContext {
    /// Per reader, per original sample name, the output sample key
    /// `<patient>|<sample>`.
    reader_sample_keys: Vec<IndexMap<String, String>>,
    output_sample_keys: Vec<String>,
    include_tag_regexes: Vec<Regex>,
}

fn patient_prefix(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

impl MergeContext {
    pub fn new(
        readers: &[TranslatedVcfReader],
        include_format_tag_patterns: &[String],
    ) -> JqResult<Self> {
        let include_tag_regexes = include_format_tag_patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^({pattern})$")).map_err(|error| {
                    crate::jq_error!("Invalid --include-format-tags regex [{pattern}]: {error}")
                })
            })
            .collect::<JqResult<Vec<Regex>>>()?;

        let mut reader_sample_keys = Vec::new();
        let mut output_key_set = HashSet::new();
        let mut output_sample_keys = Vec::new();
        for reader in readers {
            let patient = patient_prefix(reader.file_name()).to_string();
            let mut sample_keys = IndexMap::new();
            for sample in reader.sample_names() {
                let key = format!("{patient}|{sample}");
                if output_key_set.insert(key.clone()) {
                    output_sample_keys.push(key.clone());
                }
                sample_keys.insert(sample, key);
            }
            reader_sample_keys.push(sample_keys);
        }
        output_sample_keys.sort_by(|a, b| natural_cmp(a, b));

        Ok(MergeContext {
            reader_sample_keys,
            output_sample_keys,
            include_tag_regexes,
        })
    }

    pub fn output_sample_keys(&self) -> &[String] {
        &self.output_sample_keys
    }

    fn retains_tag(&self, tag: &str) -> bool {
        self.include_tag_regexes
            .iter()
            .any(|regex| regex.is_match(tag))
    }

    pub fn column_header(&self) -> String {
        let mut columns = vec![
            "#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO", "FORMAT",
        ]
        .join("\t");
        for key in &self.output_sample_keys {
            columns.push('\t');
            columns.push_str(key);
        }
        columns
    }

    /// Merges the records pulled at one coordinate into one wide record:
    /// union of retained FORMAT tags in alphabetical order, every output
    /// sample present, "." where a sample did not report a tag. Returns
    /// `None` when the inclusion policies leave nothing to merge.
    pub fn merge_coordinate(
        &self,
        stub: &VcfRecord,
        pulled: &[(usize, VcfRecord)],
        include_variants: IncludeVariants,
        include_loci: IncludeLoci,
    ) -> JqResult<Option<VcfRecord>> {
        let pulled_refs: Vec<&VcfRecord> = pulled.iter().map(|(_, record)| record).collect();
        if pulled.is_empty() || !include_loci.includes(&pulled_refs) {
            return Ok(None);
        }
        let contributing: Vec<&(usize, VcfRecord)> = pulled
            .iter()
            .filter(|(_, record)| include_variants.includes(record))
            .collect();
        if contributing.is_empty() {
            return Ok(None);
        }

        let mut retained_tags: Vec<String> = Vec::new();
        let mut values_by_sample_key: HashMap<&str, HashMap<&str, &str>> = HashMap::new();
        for (reader_index, record) in &contributing {
            let sample_keys = &self.reader_sample_keys[*reader_index];
            for (sample, tag_values) in &record.sample_tag_values {
                let Some(sample_key) = sample_keys.get(sample) else {
                    return Err(crate::jq_error!(
                        "Record sample [{sample}] is not declared in its file's column header \
                         ({})",
                        record.coordinate()
                    ));
                };
                for (tag, value) in tag_values {
                    if !self.retains_tag(tag) {
                        continue;
                    }
                    if !retained_tags.iter().any(|existing| existing == tag) {
                        retained_tags.push(tag.clone());
                    }
                    values_by_sample_key
                        .entry(sample_key.as_str())
                        .or_default()
                        .insert(tag.as_str(), value.as_str());
                }
            }
        }
        retained_tags.sort();

        let mut merged = stub.clone();
        for sample_key in &self.output_sample_keys {
            let sample_values = values_by_sample_key.get(sample_key.as_str());
            let tag_values = retained_tags
                .iter()
                .map(|tag| {
                    let value = sample_values
                        .and_then(|values| values.get(tag.as_str()))
                        .copied()
                        .unwrap_or(".");
                    (tag.clone(), value.to_string())
                })
                .collect();
            merged.sample_tag_values.insert(sample_key.clone(), tag_values);
        }
        Ok(Some(merged))
    }

    /// Compiles the output metaheaders in VCF-canonical category order:
    /// fileformat, jacquard.*, contig, ALT, FILTER, INFO, FORMAT. Within each
    /// category lines are sorted and deduplicated.
    pub fn compile_metaheaders(
        &self,
        readers: &[TranslatedVcfReader],
        execution_context: &[String],
    ) -> Vec<String> {
        let mut jacquard_lines: Vec<String> = Vec::new();
        let mut contig_lines = HashSet::new();
        let mut alt_lines = HashSet::new();
        let mut filter_lines = HashSet::new();
        let mut info_lines = HashSet::new();
        let mut format_lines = HashSet::new();

        for reader in readers {
            let all_metaheaders: Vec<String> = reader
                .metaheaders()
                .iter()
                .cloned()
                .chain(reader.new_metaheaders())
                .collect();
            for metaheader in all_metaheaders {
                if metaheader.starts_with("##jacquard.") {
                    if !jacquard_lines.contains(&metaheader) {
                        jacquard_lines.push(metaheader);
                    }
                } else if metaheader.starts_with("##contig=") {
                    contig_lines.insert(metaheader);
                } else if metaheader.starts_with("##ALT=") {
                    alt_lines.insert(metaheader);
                } else if metaheader.starts_with("##FILTER=") {
                    filter_lines.insert(metaheader);
                } else if metaheader.starts_with("##INFO=") {
                    info_lines.insert(metaheader);
                } else if let Some(id_start) = metaheader.strip_prefix("##FORMAT=<ID=") {
                    let id = id_start
                        .split(|c| c == ',' || c == '>')
                        .next()
                        .unwrap_or_default();
                    if self.retains_tag(id) {
                        format_lines.insert(metaheader);
                    }
                }
            }
        }
        info_lines.insert(format!(
            "##INFO=<ID={MULT_ALT_LOCUS_FLAG},Number=0,Type=Flag,Description=\"More than one alt allele was seen at this locus\">"
        ));

        let mut metaheaders = vec![OUTPUT_FILEFORMAT.to_string()];
        metaheaders.extend(jacquard_lines);
        metaheaders.extend(execution_context.iter().cloned());
        for lines in [contig_lines, alt_lines, filter_lines, info_lines, format_lines] {
            let mut sorted: Vec<String> = lines.into_iter().collect();
            sorted.sort_by(|a, b| natural_cmp(a, b));
            metaheaders.extend(sorted);
        }
        metaheaders
    }
}
