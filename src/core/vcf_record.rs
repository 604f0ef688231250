use crate::error::{JacquardError, JqResult};
use indexmap::IndexMap;
use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
};

pub type TagValues = IndexMap<String, String>;
pub type SampleTagValues = IndexMap<String, TagValues>;

/// One variant call at a genomic coordinate, plus per-sample FORMAT tag
/// values. Equality, ordering, and hashing are defined solely by the
/// (chrom, pos, ref, alt) coordinate: two records at the same coordinate are
/// the same variant regardless of differing INFO/FILTER/sample data. This is
/// what merge dedup and sorting rely on.
#[derive(Debug, Clone)]
pub struct VcfRecord {
    pub chrom: String,
    pub pos: String,
    pub vcf_id: String,
    pub ref_allele: String,
    pub alt: String,
    pub qual: String,
    pub filter: String,
    pub info: String,
    pub info_dict: IndexMap<String, String>,
    pub sample_tag_values: SampleTagValues,
}

fn numeric_or_max(value: &str) -> u64 {
    value.parse::<u64>().unwrap_or(u64::MAX)
}

fn parse_info_dict(info: &str) -> IndexMap<String, String> {
    let mut info_dict = IndexMap::new();
    if info == "." || info.is_empty() {
        return info_dict;
    }
    for field in info.split(';') {
        match field.split_once('=') {
            Some((key, value)) => info_dict.insert(key.to_string(), value.to_string()),
            // Flags map to themselves
            None => info_dict.insert(field.to_string(), field.to_string()),
        };
    }
    info_dict
}

impl VcfRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chrom: impl Into<String>,
        pos: impl Into<String>,
        vcf_id: impl Into<String>,
        ref_allele: impl Into<String>,
        alt: impl Into<String>,
        qual: impl Into<String>,
        filter: impl Into<String>,
        info: impl Into<String>,
        sample_tag_values: SampleTagValues,
    ) -> Self {
        let info = info.into();
        let info_dict = parse_info_dict(&info);
        VcfRecord {
            chrom: chrom.into(),
            pos: pos.into(),
            vcf_id: vcf_id.into(),
            ref_allele: ref_allele.into(),
            alt: alt.into(),
            qual: qual.into(),
            filter: filter.into(),
            info,
            info_dict,
            sample_tag_values,
        }
    }

    /// Parses one tab-delimited VCF data line. `sample_names` must be in the
    /// same order as the sample columns; the caller supplies them from the
    /// column header.
    pub fn parse_record(line: &str, sample_names: &[String]) -> JqResult<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 8 {
            return Err(crate::jq_error!(
                "VCF record has {} columns, expected at least 8: [{}]",
                fields.len(),
                line
            ));
        }

        let mut sample_tag_values = SampleTagValues::new();
        if fields.len() > 9 && fields[8] != "." {
            let sample_fields = &fields[9..];
            if sample_fields.len() != sample_names.len() {
                return Err(crate::jq_error!(
                    "VCF record has {} sample columns but the column header names {} samples: [{}]",
                    sample_fields.len(),
                    sample_names.len(),
                    line
                ));
            }
            let tag_names: Vec<&str> = fields[8].split(':').collect();
            for (sample_name, sample_field) in sample_names.iter().zip(sample_fields) {
                let tag_values: TagValues = tag_names
                    .iter()
                    .map(|tag| tag.to_string())
                    .zip(sample_field.split(':').map(|value| value.to_string()))
                    .collect();
                sample_tag_values.insert(sample_name.clone(), tag_values);
            }
        }

        Ok(VcfRecord::new(
            fields[0], fields[1], fields[2], fields[3], fields[4], fields[5], fields[6],
            fields[7], sample_tag_values,
        ))
    }

    /// Coordinate stub carrying only chrom/pos/ref/alt; everything else is
    /// null. Used to build the merge coordinate set.
    pub fn empty_record(&self) -> Self {
        VcfRecord::new(
            self.chrom.clone(),
            self.pos.clone(),
            ".",
            self.ref_allele.clone(),
            self.alt.clone(),
            ".",
            ".",
            ".",
            SampleTagValues::new(),
        )
    }

    /// Human-readable coordinate for diagnostics.
    pub fn coordinate(&self) -> String {
        format!(
            "{}:{} {}>{}",
            self.chrom, self.pos, self.ref_allele, self.alt
        )
    }

    fn sort_key(&self) -> (u64, &str, u64, &str, &str) {
        (
            numeric_or_max(&self.chrom),
            &self.chrom,
            numeric_or_max(&self.pos),
            &self.ref_allele,
            &self.alt,
        )
    }

    /// Recomputes the serialized `info` string from `info_dict`. Mutations of
    /// `info_dict` are not reflected in `info` until this is called.
    pub fn join_info_fields(&mut self) {
        if self.info_dict.is_empty() {
            self.info = ".".to_string();
            return;
        }
        self.info = self
            .info_dict
            .iter()
            .map(|(key, value)| {
                if key == value {
                    key.clone()
                } else {
                    format!("{key}={value}")
                }
            })
            .collect::<Vec<_>>()
            .join(";");
    }

    /// Adds an INFO field, either a bare flag or a `KEY=VALUE` string. A
    /// duplicate key is an error, never a silent overwrite.
    pub fn add_info_field(&mut self, field: &str) -> JqResult<()> {
        let key = field.split_once('=').map_or(field, |(key, _)| key);
        if self.info_dict.contains_key(key) {
            return Err(JacquardError::DuplicateInfoField {
                key: key.to_string(),
                coordinate: self.coordinate(),
            });
        }
        match field.split_once('=') {
            Some((key, value)) => self
                .info_dict
                .insert(key.to_string(), value.to_string()),
            None => self.info_dict.insert(field.to_string(), field.to_string()),
        };
        self.join_info_fields();
        Ok(())
    }

    /// Adds one FORMAT tag with a value for every sample. The supplied sample
    /// set must exactly match the record's samples, and the tag must not
    /// already exist on any of them.
    pub fn add_sample_tag_value(
        &mut self,
        tag_name: &str,
        value_by_sample: &IndexMap<String, String>,
    ) -> JqResult<()> {
        for tag_values in self.sample_tag_values.values() {
            if tag_values.contains_key(tag_name) {
                return Err(JacquardError::DuplicateFormatTag {
                    tag: tag_name.to_string(),
                    coordinate: self.coordinate(),
                });
            }
        }
        let mut expected: Vec<String> = self.sample_tag_values.keys().cloned().collect();
        let mut actual: Vec<String> = value_by_sample.keys().cloned().collect();
        expected.sort();
        actual.sort();
        if expected != actual {
            return Err(JacquardError::SampleMismatch {
                tag: tag_name.to_string(),
                coordinate: self.coordinate(),
                expected,
                actual,
            });
        }
        for (sample_name, tag_values) in self.sample_tag_values.iter_mut() {
            // Sample membership was checked above
            if let Some(value) = value_by_sample.get(sample_name) {
                tag_values.insert(tag_name.to_string(), value.clone());
            }
        }
        Ok(())
    }

    /// Replaces a null/empty/PASS filter outright; otherwise appends with ";"
    /// unless the value is already present (idempotent).
    pub fn add_or_replace_filter(&mut self, new_filter: &str) {
        let current = self.filter.trim();
        if current.is_empty() || current == "." || current.eq_ignore_ascii_case("pass") {
            self.filter = new_filter.to_string();
        } else if !self.filter.split(';').any(|flag| flag == new_filter) {
            self.filter = format!("{};{}", self.filter, new_filter);
        }
    }

    /// Reconstructs the tab-delimited line with a trailing newline. FORMAT
    /// tag order follows the first sample's insertion order.
    pub fn text(&self) -> String {
        let mut fields = vec![
            self.chrom.clone(),
            self.pos.clone(),
            self.vcf_id.clone(),
            self.ref_allele.clone(),
            self.alt.clone(),
            self.qual.clone(),
            self.filter.clone(),
            self.info.clone(),
        ];
        if !self.sample_tag_values.is_empty() {
            let tag_names: Vec<&String> = self
                .sample_tag_values
                .values()
                .next()
                .map(|tag_values| tag_values.keys().collect())
                .unwrap_or_default();
            if tag_names.is_empty() {
                fields.push(".".to_string());
                fields.extend(self.sample_tag_values.keys().map(|_| ".".to_string()));
            } else {
                fields.push(
                    tag_names
                        .iter()
                        .map(|tag| tag.as_str())
                        .collect::<Vec<_>>()
                        .join(":"),
                );
                for tag_values in self.sample_tag_values.values() {
                    let sample_field = tag_names
                        .iter()
                        .map(|tag| tag_values.get(*tag).map_or(".", String::as_str))
                        .collect::<Vec<_>>()
                        .join(":");
                    fields.push(sample_field);
                }
            }
        }
        let mut line = fields.join("\t");
        line.push('\n');
        line
    }
}

impl PartialEq for VcfRecord {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for VcfRecord {}

impl PartialOrd for VcfRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VcfRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl Hash for VcfRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_parse_record_basic_fields() {
        let line = "chr1\t42\trs32\tA\tC,T\t30\tPASS\tDP=50;SOMATIC\tGT:DP\t0/1:20\t1/1:30\n";
        let record =
            VcfRecord::parse_record(line, &sample_names(&["NORMAL", "TUMOR"])).unwrap();
        assert_eq!(record.chrom, "chr1");
        assert_eq!(record.pos, "42");
        assert_eq!(record.vcf_id, "rs32");
        assert_eq!(record.ref_allele, "A");
        assert_eq!(record.alt, "C,T");
        assert_eq!(record.qual, "30");
        assert_eq!(record.filter, "PASS");
        assert_eq!(record.info, "DP=50;SOMATIC");
        assert_eq!(record.info_dict.get("DP"), Some(&"50".to_string()));
        assert_eq!(record.info_dict.get("SOMATIC"), Some(&"SOMATIC".to_string()));
        assert_eq!(
            record.sample_tag_values["TUMOR"].get("DP"),
            Some(&"30".to_string())
        );
    }

    #[test]
    fn test_parse_record_roundtrips_through_text() {
        let line = "chr1\t42\t.\tA\tC\t.\tPASS\tDP=50\tGT:DP\t0/1:20\t1/1:30\n";
        let record =
            VcfRecord::parse_record(line, &sample_names(&["NORMAL", "TUMOR"])).unwrap();
        assert_eq!(record.text(), line);
    }

    #[test]
    fn test_parse_record_without_samples() {
        let line = "chr1\t42\t.\tA\tC\t.\t.\t.\n";
        let record = VcfRecord::parse_record(line, &[]).unwrap();
        assert!(record.sample_tag_values.is_empty());
        assert_eq!(record.text(), line);
    }

    #[test]
    fn test_parse_record_rejects_short_lines() {
        let error = VcfRecord::parse_record("chr1\t42\t.\tA\n", &[]).unwrap_err();
        assert!(error.to_string().contains("expected at least 8"));
    }

    #[test]
    fn test_parse_record_rejects_sample_count_mismatch() {
        let line = "chr1\t42\t.\tA\tC\t.\t.\t.\tGT\t0/1\n";
        let error =
            VcfRecord::parse_record(line, &sample_names(&["NORMAL", "TUMOR"])).unwrap_err();
        assert!(error.to_string().contains("sample columns"));
    }

    #[test]
    fn test_equality_and_hash_ignore_non_coordinate_fields() {
        use std::collections::hash_map::DefaultHasher;
        let a = VcfRecord::parse_record("chr1\t42\t.\tA\tC\t.\tPASS\tDP=1\n", &[]).unwrap();
        let b = VcfRecord::parse_record("chr1\t42\trsX\tA\tC\t50\tq10\tDP=99\n", &[]).unwrap();
        assert_eq!(a, b);

        let mut hasher_a = DefaultHasher::new();
        let mut hasher_b = DefaultHasher::new();
        a.hash(&mut hasher_a);
        b.hash(&mut hasher_b);
        assert_eq!(hasher_a.finish(), hasher_b.finish());
    }

    #[test]
    fn test_sort_orders_numeric_chrom_and_pos_numerically() {
        let make = |chrom: &str, pos: &str| {
            VcfRecord::new(chrom, pos, ".", "A", "C", ".", ".", ".", SampleTagValues::new())
        };
        let mut records = vec![
            make("10", "5"),
            make("2", "100"),
            make("2", "20"),
            make("X", "7"),
        ];
        records.sort();
        let order: Vec<(String, String)> = records
            .iter()
            .map(|record| (record.chrom.clone(), record.pos.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2".to_string(), "20".to_string()),
                ("2".to_string(), "100".to_string()),
                ("10".to_string(), "5".to_string()),
                ("X".to_string(), "7".to_string()),
            ]
        );

        // Sorting again does not change the order
        let mut resorted = records.clone();
        resorted.sort();
        assert_eq!(records, resorted);
    }

    #[test]
    fn test_add_info_field_flag_and_key_value() {
        let mut record = VcfRecord::parse_record("chr1\t42\t.\tA\tC\t.\t.\t.\n", &[]).unwrap();
        record.add_info_field("SOMATIC").unwrap();
        assert_eq!(record.info, "SOMATIC");
        record.add_info_field("DP=50").unwrap();
        assert_eq!(record.info, "SOMATIC;DP=50");
    }

    #[test]
    fn test_add_info_field_rejects_duplicate_key() {
        let mut record =
            VcfRecord::parse_record("chr1\t42\t.\tA\tC\t.\t.\tDP=50\n", &[]).unwrap();
        let error = record.add_info_field("DP=60").unwrap_err();
        assert!(matches!(error, JacquardError::DuplicateInfoField { .. }));
    }

    #[test]
    fn test_add_sample_tag_value_appends_to_all_samples() {
        let line = "chr1\t42\t.\tA\tC\t.\t.\t.\tDP\t20\t30\n";
        let mut record =
            VcfRecord::parse_record(line, &sample_names(&["NORMAL", "TUMOR"])).unwrap();
        let values: IndexMap<String, String> = [
            ("NORMAL".to_string(), "0".to_string()),
            ("TUMOR".to_string(), "1".to_string()),
        ]
        .into_iter()
        .collect();
        record.add_sample_tag_value("JQ_MT_HC_SOM", &values).unwrap();
        assert_eq!(
            record.sample_tag_values["TUMOR"].get("JQ_MT_HC_SOM"),
            Some(&"1".to_string())
        );
        assert_eq!(record.text(), "chr1\t42\t.\tA\tC\t.\t.\t.\tDP:JQ_MT_HC_SOM\t20:0\t30:1\n");
    }

    #[test]
    fn test_add_sample_tag_value_rejects_duplicate_tag() {
        let line = "chr1\t42\t.\tA\tC\t.\t.\t.\tDP\t20\n";
        let mut record = VcfRecord::parse_record(line, &sample_names(&["TUMOR"])).unwrap();
        let values: IndexMap<String, String> =
            [("TUMOR".to_string(), "5".to_string())].into_iter().collect();
        let error = record.add_sample_tag_value("DP", &values).unwrap_err();
        assert!(matches!(error, JacquardError::DuplicateFormatTag { .. }));
    }

    #[test]
    fn test_add_sample_tag_value_rejects_sample_mismatch() {
        let line = "chr1\t42\t.\tA\tC\t.\t.\t.\tDP\t20\t30\n";
        let mut record =
            VcfRecord::parse_record(line, &sample_names(&["NORMAL", "TUMOR"])).unwrap();
        let values: IndexMap<String, String> =
            [("TUMOR".to_string(), "1".to_string())].into_iter().collect();
        let error = record.add_sample_tag_value("JQ_X", &values).unwrap_err();
        assert!(matches!(error, JacquardError::SampleMismatch { .. }));
    }

    #[test]
    fn test_add_or_replace_filter_replaces_pass_and_null() {
        for initial in ["PASS", "pass", ".", ""] {
            let mut record =
                VcfRecord::new("1", "42", ".", "A", "C", ".", initial, ".", SampleTagValues::new());
            record.add_or_replace_filter("JQ_EXCLUDE");
            assert_eq!(record.filter, "JQ_EXCLUDE");
        }
    }

    #[test]
    fn test_add_or_replace_filter_appends_idempotently() {
        let mut record =
            VcfRecord::new("1", "42", ".", "A", "C", ".", "q10", ".", SampleTagValues::new());
        record.add_or_replace_filter("JQ_EXCLUDE");
        assert_eq!(record.filter, "q10;JQ_EXCLUDE");
        record.add_or_replace_filter("JQ_EXCLUDE");
        assert_eq!(record.filter, "q10;JQ_EXCLUDE");
    }

    #[test]
    fn test_empty_record_copies_coordinate_only() {
        let line = "chr1\t42\trsX\tA\tC\t50\tPASS\tDP=1\tGT\t0/1\n";
        let record = VcfRecord::parse_record(line, &sample_names(&["TUMOR"])).unwrap();
        let stub = record.empty_record();
        assert_eq!(stub, record);
        assert_eq!(stub.vcf_id, ".");
        assert_eq!(stub.filter, ".");
        assert_eq!(stub.info, ".");
        assert!(stub.sample_tag_values.is_empty());
    }

    #[test]
    fn test_join_info_fields_drops_lone_placeholder() {
        let mut record = VcfRecord::parse_record("chr1\t42\t.\tA\tC\t.\t.\t.\n", &[]).unwrap();
        record.add_info_field("DP=50").unwrap();
        assert_eq!(record.info, "DP=50");
    }
}
