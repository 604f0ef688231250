use crate::{
    constants::JQ_SUMMARY_TAG,
    core::{
        callers::common::TransformTag,
        summarize::{af_range_tag, dp_range_tag, NumericSummaryTag},
        vcf_reader::VcfReader,
        vcf_record::VcfRecord,
    },
    error::JqResult,
};
use indexmap::IndexMap;

/// Incremental population mean/variance (Welford). Population, not sample,
/// standard deviation: variance divides by n.
#[derive(Debug, Default)]
pub struct WelfordStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl WelfordStats {
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn population_stdev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }
}

/// The scalar z-score input for one sample: the maximum across the
/// comma-separated multi-allelic entries of the dependent tag, or None when
/// the value is absent or non-numeric.
fn scalar_value(tag_values: &IndexMap<String, String>, dependent_tag: &str) -> Option<f64> {
    let raw = tag_values.get(dependent_tag)?;
    if raw == "." {
        return None;
    }
    raw.split(',')
        .filter_map(|entry| entry.parse::<f64>().ok())
        .fold(None, |max, value| match max {
            Some(max) if max >= value => Some(max),
            _ => Some(value),
        })
}

/// `(value - population mean) / population stdev` of a summary range tag,
/// expressing cross-caller concordance. Population statistics come from a
/// dedicated pass over the whole file at construction; the tag is disabled
/// (no-op) when fewer than 2 values are seen or the stdev is zero.
pub struct ZScoreTag {
    tag_id: String,
    dependent_tag: String,
    description: &'static str,
    stats: Option<WelfordStats>,
}

impl ZScoreTag {
    /// Streams every record of `reader` (which must be open) to compute the
    /// population statistics. The dependent range tag is applied to each
    /// record first when the input has not already been summarized. The
    /// reader is left at end-of-stream; reopen it before the output pass.
    pub fn collect(
        suffix: &str,
        dependent: NumericSummaryTag,
        dependent_tag: &str,
        description: &'static str,
        reader: &mut VcfReader,
    ) -> JqResult<Self> {
        let mut stats = WelfordStats::default();
        while let Some(mut record) = reader.next_record()? {
            let has_dependent = record
                .sample_tag_values
                .values()
                .next()
                .is_some_and(|tag_values| tag_values.contains_key(dependent_tag));
            if !has_dependent {
                dependent.add_tag_values(&mut record)?;
            }
            for tag_values in record.sample_tag_values.values() {
                if let Some(value) = scalar_value(tag_values, dependent_tag) {
                    stats.add(value);
                }
            }
        }

        let enabled = stats.count() >= 2 && stats.population_stdev() != 0.0;
        if !enabled {
            log::warn!(
                "Z-score tag [{JQ_SUMMARY_TAG}{suffix}] disabled: \
                 population has {} usable value(s) and stdev {:.4}",
                stats.count(),
                stats.population_stdev()
            );
        }
        Ok(ZScoreTag {
            tag_id: format!("{JQ_SUMMARY_TAG}{suffix}"),
            dependent_tag: dependent_tag.to_string(),
            description,
            stats: enabled.then_some(stats),
        })
    }

    pub fn af_zscore(reader: &mut VcfReader) -> JqResult<Self> {
        Self::collect(
            "AF_ZSCORE",
            af_range_tag(),
            &format!("{JQ_SUMMARY_TAG}AF_RANGE"),
            "Concordance of allele frequencies among callers, z-score of the AF range against the file population",
            reader,
        )
    }

    pub fn dp_zscore(reader: &mut VcfReader) -> JqResult<Self> {
        Self::collect(
            "DP_ZSCORE",
            dp_range_tag(),
            &format!("{JQ_SUMMARY_TAG}DP_RANGE"),
            "Concordance of depths among callers, z-score of the DP range against the file population",
            reader,
        )
    }
}

impl TransformTag for ZScoreTag {
    fn metaheader(&self) -> String {
        let population = match &self.stats {
            Some(stats) => format!(
                "mean={:.2},stdev={:.2}",
                stats.mean(),
                stats.population_stdev()
            ),
            None => "undefined".to_string(),
        };
        format!(
            "##FORMAT=<ID={},Number=1,Type=Float,Description=\"{} [{population}]\">",
            self.tag_id, self.description
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let Some(stats) = &self.stats else {
            return Ok(());
        };
        let mut values = IndexMap::new();
        for (sample, tag_values) in &record.sample_tag_values {
            let value = match scalar_value(tag_values, &self.dependent_tag) {
                Some(value) => {
                    format!("{:.2}", (value - stats.mean()) / stats.population_stdev())
                }
                None => ".".to_string(),
            };
            values.insert(sample.clone(), value);
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::callers::common::test_utils::tag_value, io::file_reader::FileReader};
    use tempfile::TempDir;

    const HEADER: &str = "\
##fileformat=VCFv4.1
##FORMAT=<ID=JQ_SUMMARY_DP_RANGE,Number=1,Type=Float,Description=\"r\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSA\tSB
";

    fn reader_for(dir: &TempDir, records: &str) -> VcfReader {
        let path = dir.path().join("summarized.vcf");
        std::fs::write(&path, format!("{HEADER}{records}")).unwrap();
        VcfReader::new(FileReader::new(path)).unwrap()
    }

    // Population [4, 7, 13, 16]: mean 10, population stdev sqrt(22.5).
    const RANGE_RECORDS: &str = "\
1\t1\t.\tA\tC\t.\tPASS\t.\tJQ_SUMMARY_DP_RANGE\t4\t7
1\t2\t.\tA\tC\t.\tPASS\t.\tJQ_SUMMARY_DP_RANGE\t13\t16
";

    #[test]
    fn test_welford_population_statistics() {
        let mut stats = WelfordStats::default();
        for value in [4.0, 7.0, 13.0, 16.0] {
            stats.add(value);
        }
        assert!((stats.mean() - 10.0).abs() < 1e-9);
        assert!((stats.population_stdev() - 22.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_zscore_values_round_to_two_decimals() {
        let temp_dir = TempDir::new().unwrap();
        let mut reader = reader_for(&temp_dir, RANGE_RECORDS);
        reader.open().unwrap();
        let tag = ZScoreTag::dp_zscore(&mut reader).unwrap();
        reader.close();

        reader.open().unwrap();
        let mut record = reader.next_record().unwrap().unwrap();
        reader.close();
        tag.add_tag_values(&mut record).unwrap();

        assert_eq!(
            tag_value(&record, "SA", "JQ_SUMMARY_DP_ZSCORE"),
            Some("-1.26".to_string())
        );
        assert_eq!(
            tag_value(&record, "SB", "JQ_SUMMARY_DP_ZSCORE"),
            Some("-0.63".to_string())
        );
    }

    #[test]
    fn test_zscore_metaheader_carries_population_statistics() {
        let temp_dir = TempDir::new().unwrap();
        let mut reader = reader_for(&temp_dir, RANGE_RECORDS);
        reader.open().unwrap();
        let tag = ZScoreTag::dp_zscore(&mut reader).unwrap();
        reader.close();

        let metaheader = tag.metaheader();
        assert!(metaheader.contains("ID=JQ_SUMMARY_DP_ZSCORE"));
        assert!(metaheader.contains("mean=10.00"));
        assert!(metaheader.contains("stdev=4.74"));
    }

    #[test]
    fn test_zscore_disabled_for_degenerate_populations() {
        let temp_dir = TempDir::new().unwrap();

        // Fewer than two values
        let mut reader = reader_for(&temp_dir, "1\t1\t.\tA\tC\t.\tPASS\t.\tJQ_SUMMARY_DP_RANGE\t4\t.\n");
        reader.open().unwrap();
        let tag = ZScoreTag::dp_zscore(&mut reader).unwrap();
        reader.close();

        reader.open().unwrap();
        let mut record = reader.next_record().unwrap().unwrap();
        reader.close();
        tag.add_tag_values(&mut record).unwrap();
        assert_eq!(tag_value(&record, "SA", "JQ_SUMMARY_DP_ZSCORE"), None);

        // Zero stdev
        let mut reader = reader_for(&temp_dir, "1\t1\t.\tA\tC\t.\tPASS\t.\tJQ_SUMMARY_DP_RANGE\t5\t5\n");
        reader.open().unwrap();
        let tag = ZScoreTag::dp_zscore(&mut reader).unwrap();
        reader.close();
        assert!(tag.metaheader().contains("undefined"));
    }

    #[test]
    fn test_zscore_takes_max_of_multi_allelic_entries() {
        let mut tag_values = IndexMap::new();
        tag_values.insert("JQ_SUMMARY_DP_RANGE".to_string(), "4,16".to_string());
        assert_eq!(scalar_value(&tag_values, "JQ_SUMMARY_DP_RANGE"), Some(16.0));

        tag_values.insert("JQ_SUMMARY_DP_RANGE".to_string(), ".".to_string());
        assert_eq!(scalar_value(&tag_values, "JQ_SUMMARY_DP_RANGE"), None);
    }
}
