use crate::{
    core::{vcf_reader::VcfReader, vcf_record::VcfRecord},
    error::JqResult,
    utils::util::format_two_digits,
};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::str::FromStr;

/// A single record transformer owned by a caller adapter. Each tag declares
/// the metaheader for its output field and mutates records in place. A tag
/// whose source FORMAT field is absent must no-op, not fail the record.
pub trait TransformTag {
    fn metaheader(&self) -> String;
    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()>;
}

pub fn jq_format_tag(abbreviation: &str, suffix: &str) -> String {
    format!("JQ_{abbreviation}_{suffix}")
}

/// The same value for every sample on the record.
pub fn uniform_sample_values(record: &VcfRecord, value: &str) -> IndexMap<String, String> {
    record
        .sample_tag_values
        .keys()
        .map(|sample| (sample.clone(), value.to_string()))
        .collect()
}

/// Rounds a (possibly multi-allelic, comma-separated) allele frequency string
/// to two decimal digits per allele. Returns `None` when any piece is not
/// numeric.
pub fn round_allele_freq(raw_value: &str) -> Option<String> {
    let mut rounded = Vec::new();
    for piece in raw_value.split(',') {
        let value = Decimal::from_str(piece).ok()?;
        rounded.push(format_two_digits(value));
    }
    Some(rounded.join(","))
}

/// Scans a file's metaheaders for a caller signature without constructing a
/// full `VcfReader`. The reader is closed again before returning, claimed or
/// not.
pub fn metaheaders_match(
    file_reader: &mut crate::io::file_reader::FileReader,
    predicate: impl Fn(&str) -> bool,
) -> JqResult<bool> {
    file_reader.open()?;
    let mut matched = false;
    loop {
        match file_reader.next_line() {
            Ok(Some(line)) if line.starts_with("##") => {
                if predicate(&line) {
                    matched = true;
                    break;
                }
            }
            Ok(_) => break,
            Err(error) => {
                file_reader.close();
                return Err(error);
            }
        }
    }
    file_reader.close();
    Ok(matched)
}

/// Strelka and VarScan emit snp/indel file pairs per patient. A patient with
/// one half of the pair is logged as an error but does not abort the claim.
pub fn check_snp_indel_pairing(file_names: &[String], caller_name: &str) {
    use std::collections::HashMap;
    let mut by_patient: HashMap<&str, (bool, bool)> = HashMap::new();
    for file_name in file_names {
        let patient = file_name.split('.').next().unwrap_or(file_name);
        let entry = by_patient.entry(patient).or_default();
        let lowered = file_name.to_lowercase();
        if lowered.contains("snp") || lowered.contains("snv") {
            entry.0 = true;
        }
        if lowered.contains("indel") {
            entry.1 = true;
        }
    }
    for (patient, (has_snp, has_indel)) in by_patient {
        if has_snp && !has_indel {
            log::error!(
                "{caller_name}: patient [{patient}] has a snp/snv file but no matching indel file"
            );
        } else if has_indel && !has_snp {
            log::error!(
                "{caller_name}: patient [{patient}] has an indel file but no matching snp/snv file"
            );
        }
    }
}

/// JQ_<CALLER>_CALLER_REPORTED: 1 for every sample of every record the caller
/// emitted.
pub struct CallerReportedTag {
    tag_id: String,
    caller_name: &'static str,
}

impl CallerReportedTag {
    pub fn new(abbreviation: &str, caller_name: &'static str) -> Self {
        CallerReportedTag {
            tag_id: jq_format_tag(abbreviation, crate::constants::CALLER_REPORTED_SUFFIX),
            caller_name,
        }
    }
}

impl TransformTag for CallerReportedTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=1,Type=Integer,Description=\"1 = variant present in original {} VCF\">",
            self.tag_id, self.caller_name
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let values = uniform_sample_values(record, "1");
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

/// JQ_<CALLER>_CALLER_PASSED: 1 iff the record FILTER is PASS.
pub struct CallerPassedTag {
    tag_id: String,
    caller_name: &'static str,
}

impl CallerPassedTag {
    pub fn new(abbreviation: &str, caller_name: &'static str) -> Self {
        CallerPassedTag {
            tag_id: jq_format_tag(abbreviation, crate::constants::CALLER_PASSED_SUFFIX),
            caller_name,
        }
    }
}

impl TransformTag for CallerPassedTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=1,Type=Integer,Description=\"1 = variant FILTER is PASS in original {} VCF\">",
            self.tag_id, self.caller_name
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let passed = if record.filter == "PASS" { "1" } else { "0" };
        let values = uniform_sample_values(record, passed);
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

/// Wraps a base [`VcfReader`], decorating each record with a caller's ordered
/// tag list on the way out. The wrapper exclusively owns the base reader.
pub struct TranslatedVcfReader {
    reader: VcfReader,
    caller_name: &'static str,
    tags: Vec<Box<dyn TransformTag>>,
    column_header: String,
    renamed_samples: Option<Vec<String>>,
}

impl std::fmt::Debug for TranslatedVcfReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatedVcfReader")
            .field("reader", &self.reader)
            .field("caller_name", &self.caller_name)
            .field("tags", &self.tags.len())
            .field("column_header", &self.column_header)
            .field("renamed_samples", &self.renamed_samples)
            .finish()
    }
}

impl TranslatedVcfReader {
    pub fn new(reader: VcfReader, caller_name: &'static str, tags: Vec<Box<dyn TransformTag>>) -> Self {
        let column_header = reader.column_header().to_string();
        TranslatedVcfReader {
            reader,
            caller_name,
            tags,
            column_header,
            renamed_samples: None,
        }
    }

    /// Reader with no caller tags; used by merge for inputs that are already
    /// translated.
    pub fn passthrough(reader: VcfReader) -> Self {
        Self::new(reader, "", Vec::new())
    }

    /// Replaces the sample names in the column header (MuTect NORMAL/TUMOR
    /// renaming). Record sample keys are renamed positionally to match.
    pub fn rename_samples(mut self, new_sample_names: Vec<String>) -> Self {
        let fixed_columns: Vec<&str> = self.column_header.split('\t').take(9).collect();
        let mut columns: Vec<String> =
            fixed_columns.iter().map(|column| column.to_string()).collect();
        columns.extend(new_sample_names.iter().cloned());
        self.column_header = columns.join("\t");
        self.renamed_samples = Some(new_sample_names);
        self
    }

    pub fn caller_name(&self) -> &'static str {
        self.caller_name
    }

    pub fn file_name(&self) -> &str {
        self.reader.file_name()
    }

    pub fn metaheaders(&self) -> &[String] {
        self.reader.metaheaders()
    }

    pub fn column_header(&self) -> &str {
        &self.column_header
    }

    pub fn sample_names(&self) -> Vec<String> {
        self.column_header
            .split('\t')
            .skip(9)
            .map(|name| name.to_string())
            .collect()
    }

    pub fn format_metaheaders(&self) -> &indexmap::IndexMap<String, String> {
        self.reader.format_metaheaders()
    }

    pub fn contig_metaheaders(&self) -> &indexmap::IndexMap<String, String> {
        self.reader.contig_metaheaders()
    }

    /// Metaheaders for the tags this reader injects, in tag order.
    pub fn new_metaheaders(&self) -> Vec<String> {
        self.tags.iter().map(|tag| tag.metaheader()).collect()
    }

    pub fn open(&mut self) -> JqResult<()> {
        self.reader.open()
    }

    pub fn close(&mut self) {
        self.reader.close();
    }

    pub fn next_record(&mut self) -> JqResult<Option<VcfRecord>> {
        let Some(mut record) = self.reader.next_record()? else {
            return Ok(None);
        };
        if let Some(new_names) = &self.renamed_samples {
            let old: Vec<(String, crate::core::vcf_record::TagValues)> =
                record.sample_tag_values.drain(..).collect();
            for ((_, tag_values), new_name) in old.into_iter().zip(new_names) {
                record.sample_tag_values.insert(new_name.clone(), tag_values);
            }
        }
        for tag in &self.tags {
            tag.add_tag_values(&mut record)?;
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use crate::core::vcf_record::SampleTagValues;

    /// Record with the given FORMAT tag values for NORMAL and TUMOR samples.
    pub fn two_sample_record(filter: &str, format_and_values: &[(&str, &str, &str)]) -> VcfRecord {
        let mut sample_tag_values = SampleTagValues::new();
        let mut normal = crate::core::vcf_record::TagValues::new();
        let mut tumor = crate::core::vcf_record::TagValues::new();
        for (tag, normal_value, tumor_value) in format_and_values {
            normal.insert(tag.to_string(), normal_value.to_string());
            tumor.insert(tag.to_string(), tumor_value.to_string());
        }
        sample_tag_values.insert("NORMAL".to_string(), normal);
        sample_tag_values.insert("TUMOR".to_string(), tumor);
        VcfRecord::new("1", "42", ".", "A", "C", ".", filter, ".", sample_tag_values)
    }

    pub fn tag_value(record: &VcfRecord, sample: &str, tag: &str) -> Option<String> {
        record.sample_tag_values.get(sample)?.get(tag).cloned()
    }
}
