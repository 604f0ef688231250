use crate::{
    constants::{CALLER_PASSED_SUFFIX, CALLER_REPORTED_SUFFIX, JQ_SUMMARY_TAG, JQ_VCF_TAG},
    core::{callers::common::TransformTag, vcf_record::VcfRecord},
    error::{JacquardError, JqResult},
    utils::util::format_two_digits,
};
use indexmap::IndexMap;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Recovers the caller abbreviation from a Jacquard FORMAT tag, e.g.
/// `JQ_MT_CALLER_REPORTED` with suffix `CALLER_REPORTED` yields `MT`.
/// Summary tags never name a caller, so `SUMMARY` is rejected.
pub fn extract_caller_abbrev<'a>(tag: &'a str, suffix: &str) -> Option<&'a str> {
    let abbrev = tag
        .strip_prefix(JQ_VCF_TAG)?
        .strip_suffix(suffix)?
        .strip_suffix('_')?;
    if abbrev.is_empty() || abbrev.starts_with("SUMMARY") {
        None
    } else {
        Some(abbrev)
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value, "" | "0" | ".")
}

/// Caller abbreviations whose tag for `suffix` is truthy in one sample's
/// tag-value map, sorted alphabetically.
fn truthy_abbrevs(
    tag_values: &IndexMap<String, String>,
    suffix: &str,
) -> Vec<String> {
    let mut abbrevs: Vec<String> = tag_values
        .iter()
        .filter(|(_, value)| is_truthy(value))
        .filter_map(|(tag, _)| extract_caller_abbrev(tag, suffix))
        .map(str::to_string)
        .collect();
    abbrevs.sort();
    abbrevs.dedup();
    abbrevs
}

/// JQ_SUMMARY_CALLERS_{REPORTED,PASSED}_{COUNT,LIST}: per-sample count or
/// alphabetical comma-joined list of contributing callers.
struct CallerSummaryTag {
    tag_id: String,
    suffix: &'static str,
    list: bool,
    description: &'static str,
}

impl TransformTag for CallerSummaryTag {
    fn metaheader(&self) -> String {
        let vcf_type = if self.list { "String" } else { "Integer" };
        format!(
            "##FORMAT=<ID={},Number=1,Type={},Description=\"{}\">",
            self.tag_id, vcf_type, self.description
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let mut values = IndexMap::new();
        for (sample, tag_values) in &record.sample_tag_values {
            let abbrevs = truthy_abbrevs(tag_values, self.suffix);
            let value = if self.list {
                if abbrevs.is_empty() {
                    ".".to_string()
                } else {
                    abbrevs.join(",")
                }
            } else {
                abbrevs.len().to_string()
            };
            values.insert(sample.clone(), value);
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

/// JQ_SUMMARY_SAMPLES_{REPORTED,PASSED}_COUNT: INFO count of samples with at
/// least one truthy caller tag.
struct SamplesCountTag {
    info_id: String,
    suffix: &'static str,
    description: &'static str,
}

impl TransformTag for SamplesCountTag {
    fn metaheader(&self) -> String {
        format!(
            "##INFO=<ID={},Number=1,Type=Integer,Description=\"{}\">",
            self.info_id, self.description
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let count = record
            .sample_tag_values
            .values()
            .filter(|tag_values| !truthy_abbrevs(tag_values, self.suffix).is_empty())
            .count();
        record.add_info_field(&format!("{}={count}", self.info_id))
    }
}

#[derive(Debug, Clone, Copy)]
enum Aggregation {
    Average,
    Range,
    SumOfOnes,
}

fn aggregate(values: &[Decimal], aggregation: Aggregation, coordinate: &str) -> JqResult<String> {
    if values.is_empty() {
        return Err(JacquardError::EmptyAggregation {
            coordinate: coordinate.to_string(),
        });
    }
    let result = match aggregation {
        Aggregation::Average => {
            let sum: Decimal = values.iter().copied().sum();
            format_two_digits(sum / Decimal::from(values.len() as u64))
        }
        Aggregation::Range => {
            let max = values.iter().copied().max().unwrap_or_default();
            let min = values.iter().copied().min().unwrap_or_default();
            format_two_digits(max - min)
        }
        Aggregation::SumOfOnes => values
            .iter()
            .filter(|value| **value == Decimal::ONE)
            .count()
            .to_string(),
    };
    Ok(result)
}

/// Aggregates one numeric statistic (mean, max-min range, count of somatic
/// flags) per sample across all caller tags matching `source_regex`,
/// transposed per allele for comma-separated multi-allelic values. Exact
/// decimal arithmetic throughout; rounding happens only at formatting.
pub struct NumericSummaryTag {
    tag_id: String,
    source_regex: Regex,
    aggregation: Aggregation,
    description: &'static str,
}

impl NumericSummaryTag {
    fn sample_value(
        &self,
        tag_values: &IndexMap<String, String>,
        coordinate: &str,
    ) -> JqResult<String> {
        let mut raw: Vec<&String> = Vec::new();
        for (tag, value) in tag_values {
            if value == "." {
                continue;
            }
            let Some(captures) = self.source_regex.captures(tag) else {
                continue;
            };
            let abbrev = captures.get(1).map_or("", |m| m.as_str());
            if abbrev.is_empty() || abbrev.starts_with("SUMMARY") {
                continue;
            }
            raw.push(value);
        }
        if raw.is_empty() {
            return Ok(".".to_string());
        }

        let split: Vec<Vec<&str>> = raw.iter().map(|value| value.split(',').collect()).collect();
        let allele_count = split[0].len();
        if split.iter().any(|group| group.len() != allele_count) {
            return Err(JacquardError::InconsistentMultAltValues {
                coordinate: coordinate.to_string(),
                values: raw.iter().map(|value| value.to_string()).collect(),
            });
        }

        let mut per_allele = Vec::with_capacity(allele_count);
        for allele_index in 0..allele_count {
            let group = split
                .iter()
                .map(|values| {
                    Decimal::from_str(values[allele_index]).map_err(|_| {
                        crate::jq_error!(
                            "Non-numeric value [{}] while computing {} ({coordinate})",
                            values[allele_index],
                            self.tag_id
                        )
                    })
                })
                .collect::<JqResult<Vec<Decimal>>>()?;
            per_allele.push(aggregate(&group, self.aggregation, coordinate)?);
        }
        Ok(per_allele.join(","))
    }
}

impl TransformTag for NumericSummaryTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=A,Type=Float,Description=\"{}\">",
            self.tag_id, self.description
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let coordinate = record.coordinate();
        let mut values = IndexMap::new();
        for (sample, tag_values) in &record.sample_tag_values {
            values.insert(sample.clone(), self.sample_value(tag_values, &coordinate)?);
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

fn numeric_tag(
    suffix: &str,
    source_pattern: &str,
    aggregation: Aggregation,
    description: &'static str,
) -> NumericSummaryTag {
    NumericSummaryTag {
        tag_id: format!("{JQ_SUMMARY_TAG}{suffix}"),
        source_regex: Regex::new(source_pattern).expect("static regex is valid"),
        aggregation,
        description,
    }
}

pub fn af_range_tag() -> NumericSummaryTag {
    numeric_tag(
        "AF_RANGE",
        r"^JQ_(.*)_AF$",
        Aggregation::Range,
        "Max allele frequency minus min allele frequency across callers",
    )
}

pub fn dp_range_tag() -> NumericSummaryTag {
    numeric_tag(
        "DP_RANGE",
        r"^JQ_(.*)_DP$",
        Aggregation::Range,
        "Max depth minus min depth across callers",
    )
}

/// The ordered pipeline of per-record summary tags. Z-score tags are appended
/// by the command after their population pass.
pub struct SummarizeCaller {
    tags: Vec<Box<dyn TransformTag>>,
}

impl SummarizeCaller {
    pub fn new() -> Self {
        let tags: Vec<Box<dyn TransformTag>> = vec![
            Box::new(CallerSummaryTag {
                tag_id: format!("{JQ_SUMMARY_TAG}CALLERS_REPORTED_COUNT"),
                suffix: CALLER_REPORTED_SUFFIX,
                list: false,
                description: "Count of variant callers which listed this variant in the Jacquard tagged VCF",
            }),
            Box::new(CallerSummaryTag {
                tag_id: format!("{JQ_SUMMARY_TAG}CALLERS_REPORTED_LIST"),
                suffix: CALLER_REPORTED_SUFFIX,
                list: true,
                description: "Comma-separated list of variant caller short-names where this variant appears",
            }),
            Box::new(CallerSummaryTag {
                tag_id: format!("{JQ_SUMMARY_TAG}CALLERS_PASSED_COUNT"),
                suffix: CALLER_PASSED_SUFFIX,
                list: false,
                description: "Count of variant callers where FILTER = PASS for this variant in the Jacquard tagged VCF",
            }),
            Box::new(CallerSummaryTag {
                tag_id: format!("{JQ_SUMMARY_TAG}CALLERS_PASSED_LIST"),
                suffix: CALLER_PASSED_SUFFIX,
                list: true,
                description: "Comma-separated list of variant caller short-names where FILTER = PASS for this variant",
            }),
            Box::new(SamplesCountTag {
                info_id: format!("{JQ_SUMMARY_TAG}SAMPLES_REPORTED_COUNT"),
                suffix: CALLER_REPORTED_SUFFIX,
                description: "Count of samples where this variant appeared in any caller",
            }),
            Box::new(SamplesCountTag {
                info_id: format!("{JQ_SUMMARY_TAG}SAMPLES_PASSED_COUNT"),
                suffix: CALLER_PASSED_SUFFIX,
                description: "Count of samples where this variant passed in any caller",
            }),
            Box::new(numeric_tag(
                "AF_AVERAGE",
                r"^JQ_(.*)_AF$",
                Aggregation::Average,
                "Average allele frequency across recognized callers that reported frequency for this position",
            )),
            Box::new(af_range_tag()),
            Box::new(numeric_tag(
                "DP_AVERAGE",
                r"^JQ_(.*)_DP$",
                Aggregation::Average,
                "Average depth across recognized callers that reported depth for this position",
            )),
            Box::new(dp_range_tag()),
            Box::new(numeric_tag(
                "SOM_COUNT",
                r"^JQ_(.*)_HC_SOM$",
                Aggregation::SumOfOnes,
                "Count of recognized callers that reported this variant as high-confidence somatic",
            )),
        ];
        SummarizeCaller { tags }
    }

    pub fn add_tag(&mut self, tag: Box<dyn TransformTag>) {
        self.tags.push(tag);
    }

    pub fn metaheaders(&self) -> Vec<String> {
        self.tags.iter().map(|tag| tag.metaheader()).collect()
    }

    pub fn apply(&self, record: &mut VcfRecord) -> JqResult<()> {
        for tag in &self.tags {
            tag.add_tag_values(record)?;
        }
        Ok(())
    }
}

impl Default for SummarizeCaller {
    fn default() -> Self {
        Self::new()
    }
}
