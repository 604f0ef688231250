use crate::{
    constants::{
        MAX_LISTED_FILES, VARSCAN_ABBREVIATION, VARSCAN_HC_HEADER_PREFIX, VARSCAN_SIGNATURE,
    },
    core::{
        callers::common::{
            check_snp_indel_pairing, jq_format_tag, metaheaders_match, CallerPassedTag,
            CallerReportedTag, TransformTag, TranslatedVcfReader,
        },
        vcf_reader::VcfReader,
        vcf_record::VcfRecord,
    },
    error::JqResult,
    io::file_reader::FileReader,
    utils::util::format_two_digits,
};
use indexmap::IndexMap;
use regex::Regex;
use rust_decimal::Decimal;
use std::{collections::HashSet, str::FromStr, sync::Arc};

const CALLER_NAME: &str = "VarScan";

type HcCoordinates = HashSet<(String, String)>;

fn file_list_for_error(names: &[String]) -> String {
    let listed = names
        .iter()
        .take(MAX_LISTED_FILES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > MAX_LISTED_FILES {
        format!("{listed} (and {} more)", names.len() - MAX_LISTED_FILES)
    } else {
        listed
    }
}

/// Converts a VarScan FREQ percentage ("23.1%") into a 2-digit decimal
/// fraction, per comma-separated allele.
fn freq_to_decimal(raw_value: &str) -> Option<String> {
    let mut freqs = Vec::new();
    for piece in raw_value.split(',') {
        let percent = Decimal::from_str(piece.trim_end_matches('%')).ok()?;
        freqs.push(format_two_digits(percent / Decimal::from(100)));
    }
    Some(freqs.join(","))
}

struct CopiedFormatTag {
    tag_id: String,
    source_tag: &'static str,
    description: &'static str,
    vcf_type: &'static str,
}

impl TransformTag for CopiedFormatTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=A,Type={},Description=\"{}\">",
            self.tag_id, self.vcf_type, self.description
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let mut values = IndexMap::new();
        for (sample, tag_values) in &record.sample_tag_values {
            match tag_values.get(self.source_tag) {
                Some(value) => values.insert(sample.clone(), value.clone()),
                None => return Ok(()),
            };
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

/// JQ_VS_AF from the FREQ percentage tag.
struct AlleleFreqTag {
    tag_id: String,
}

impl TransformTag for AlleleFreqTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=A,Type=Float,Description=\"Jacquard allele frequency for VarScan: FREQ as a decimal rounded to 2 digits\">",
            self.tag_id
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let mut values = IndexMap::new();
        for (sample, tag_values) in &record.sample_tag_values {
            match tag_values.get("FREQ") {
                Some(raw_value) => values.insert(
                    sample.clone(),
                    freq_to_decimal(raw_value).unwrap_or_else(|| ".".to_string()),
                ),
                None => return Ok(()),
            };
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

/// JQ_VS_HC_SOM: tumor sample is somatic when the record's INFO SS status is
/// 2 and, when a high-confidence filter file is paired, its coordinate is in
/// that file. Positional tumor heuristic preserved as-is.
struct SomaticTag {
    tag_id: String,
    hc_coordinates: Option<Arc<HcCoordinates>>,
}

impl TransformTag for SomaticTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=1,Type=Integer,Description=\"Jacquard somatic status for VarScan: 0=non-somatic, 1=somatic (based on SS INFO tag and the high-confidence filter file when supplied)\">",
            self.tag_id
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let ss_somatic = record.info_dict.get("SS").map(String::as_str) == Some("2");
        let high_confidence = match &self.hc_coordinates {
            Some(coordinates) => {
                coordinates.contains(&(record.chrom.clone(), record.pos.clone()))
            }
            None => true,
        };
        let mut values = IndexMap::new();
        for (sample_index, sample) in record.sample_tag_values.keys().enumerate() {
            let somatic = if ss_somatic && high_confidence && sample_index == 1 {
                "1"
            } else {
                "0"
            };
            values.insert(sample.clone(), somatic.to_string());
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

fn varscan_tags(hc_coordinates: Option<Arc<HcCoordinates>>) -> Vec<Box<dyn TransformTag>> {
    vec![
        Box::new(CallerReportedTag::new(VARSCAN_ABBREVIATION, CALLER_NAME)),
        Box::new(CallerPassedTag::new(VARSCAN_ABBREVIATION, CALLER_NAME)),
        Box::new(CopiedFormatTag {
            tag_id: jq_format_tag(VARSCAN_ABBREVIATION, "GT"),
            source_tag: "GT",
            description: "Jacquard genotype (based on GT)",
            vcf_type: "String",
        }),
        Box::new(AlleleFreqTag {
            tag_id: jq_format_tag(VARSCAN_ABBREVIATION, "AF"),
        }),
        Box::new(CopiedFormatTag {
            tag_id: jq_format_tag(VARSCAN_ABBREVIATION, "DP"),
            source_tag: "DP",
            description: "Jacquard depth for VarScan (based on DP)",
            vcf_type: "Integer",
        }),
        Box::new(SomaticTag {
            tag_id: jq_format_tag(VARSCAN_ABBREVIATION, "HC_SOM"),
            hc_coordinates,
        }),
    ]
}

pub struct Varscan {
    hc_regex: Regex,
}

impl Varscan {
    pub fn new(hc_pattern: &str) -> JqResult<Self> {
        let hc_regex = Regex::new(hc_pattern).map_err(|error| {
            crate::jq_error!(
                "Invalid VarScan high-confidence filename regex [{hc_pattern}]: {error}"
            )
        })?;
        Ok(Varscan { hc_regex })
    }

    /// Reads a high-confidence filter file into its coordinate set. Returns
    /// `None` when the required `chrom<TAB>position` header is missing.
    fn read_hc_coordinates(file_reader: &mut FileReader) -> JqResult<Option<HcCoordinates>> {
        file_reader.open()?;
        let result = (|| {
            match file_reader.next_line()? {
                Some(header) if header.starts_with(VARSCAN_HC_HEADER_PREFIX) => {}
                _ => return Ok(None),
            }
            let mut coordinates = HcCoordinates::new();
            while let Some(line) = file_reader.next_line()? {
                let mut fields = line.split('\t');
                if let (Some(chrom), Some(position)) = (fields.next(), fields.next()) {
                    coordinates.insert((chrom.to_string(), position.to_string()));
                }
            }
            Ok(Some(coordinates))
        })();
        file_reader.close();
        result
    }

    pub fn claim(
        &self,
        file_readers: Vec<FileReader>,
    ) -> JqResult<(Vec<FileReader>, Vec<TranslatedVcfReader>)> {
        let mut unclaimed = Vec::new();
        let mut vcf_candidates = Vec::new();
        let mut hc_candidates = Vec::new();
        for mut file_reader in file_readers {
            if self.hc_regex.is_match(file_reader.file_name()) {
                hc_candidates.push(file_reader);
            } else if metaheaders_match(&mut file_reader, |line| line == VARSCAN_SIGNATURE)? {
                log::debug!("VarScan claimed [{}]", file_reader.file_name());
                vcf_candidates.push(file_reader);
            } else {
                unclaimed.push(file_reader);
            }
        }

        let mut invalid_files: Vec<String> = Vec::new();
        // hc file name prefix (text before the regex match) -> coordinate set
        let mut hc_by_prefix: Vec<(String, Arc<HcCoordinates>)> = Vec::new();
        for mut hc_reader in hc_candidates {
            let file_name = hc_reader.file_name().to_string();
            match Self::read_hc_coordinates(&mut hc_reader)? {
                Some(coordinates) => {
                    let match_start = self
                        .hc_regex
                        .find(&file_name)
                        .map(|hc_match| hc_match.start())
                        .unwrap_or(file_name.len());
                    let prefix = file_name[..match_start].trim_end_matches('.').to_string();
                    log::debug!("VarScan claimed high-confidence file [{file_name}]");
                    hc_by_prefix.push((prefix, Arc::new(coordinates)));
                }
                None => invalid_files.push(file_name),
            }
        }
        if !invalid_files.is_empty() {
            return Err(crate::jq_error!(
                "VarScan high-confidence filter file(s) are missing the expected \
                 'chrom<TAB>position' header: {}",
                file_list_for_error(&invalid_files)
            ));
        }

        let vcf_base_names: Vec<String> = vcf_candidates
            .iter()
            .map(|reader| {
                reader
                    .file_name()
                    .trim_end_matches(".gz")
                    .trim_end_matches(".vcf")
                    .to_string()
            })
            .collect();
        let mut unpaired: Vec<String> = Vec::new();
        let mut hc_for_vcf: Vec<Option<Arc<HcCoordinates>>> = vec![None; vcf_candidates.len()];
        for (prefix, coordinates) in hc_by_prefix {
            let matches: Vec<usize> = vcf_base_names
                .iter()
                .enumerate()
                .filter(|(_, base)| base.starts_with(&prefix))
                .map(|(index, _)| index)
                .collect();
            match matches.as_slice() {
                [index] => hc_for_vcf[*index] = Some(coordinates),
                _ => unpaired.push(prefix),
            }
        }
        if !unpaired.is_empty() {
            return Err(crate::jq_error!(
                "VarScan high-confidence filter file(s) could not be paired with exactly one \
                 VarScan VCF: {}",
                file_list_for_error(&unpaired)
            ));
        }

        let mut claimed = Vec::new();
        for (file_reader, hc_coordinates) in vcf_candidates.into_iter().zip(hc_for_vcf) {
            let reader = VcfReader::new(file_reader)?;
            claimed.push(TranslatedVcfReader::new(
                reader,
                CALLER_NAME,
                varscan_tags(hc_coordinates),
            ));
        }
        let claimed_names: Vec<String> = claimed
            .iter()
            .map(|reader| reader.file_name().to_string())
            .collect();
        check_snp_indel_pairing(&claimed_names, CALLER_NAME);
        Ok((unclaimed, claimed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_VARSCAN_HC_PATTERN;
    use crate::core::callers::common::test_utils::tag_value;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const VARSCAN_VCF: &str = "\
##fileformat=VCFv4.1
##source=VarScan2
##FORMAT=<ID=FREQ,Number=A,Type=String,Description=\"Variant allele frequency\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNORMAL\tTUMOR
1\t42\t.\tA\tC\t.\tPASS\tSS=2\tGT:DP:FREQ\t0/0:70:1.1%\t0/1:78:23.1%\n\
1\t52\t.\tG\tT\t.\tPASS\tSS=2\tGT:DP:FREQ\t0/0:66:0.5%\t0/1:61:40%\n";

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn varscan() -> Varscan {
        Varscan::new(DEFAULT_VARSCAN_HC_PATTERN).unwrap()
    }

    #[test]
    fn test_claim_recognizes_varscan_vcf() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "patientA.snp.vcf", VARSCAN_VCF);
        let (unclaimed, mut claimed) = varscan().claim(vec![FileReader::new(path)]).unwrap();
        assert!(unclaimed.is_empty());
        assert_eq!(claimed.len(), 1);

        let mut reader = claimed.remove(0);
        reader.open().unwrap();
        let record = reader.next_record().unwrap().unwrap();
        reader.close();
        assert_eq!(tag_value(&record, "TUMOR", "JQ_VS_AF"), Some("0.23".to_string()));
        assert_eq!(tag_value(&record, "TUMOR", "JQ_VS_DP"), Some("78".to_string()));
        assert_eq!(tag_value(&record, "TUMOR", "JQ_VS_GT"), Some("0/1".to_string()));
        // No hc file paired: SS=2 alone marks the tumor sample somatic
        assert_eq!(tag_value(&record, "TUMOR", "JQ_VS_HC_SOM"), Some("1".to_string()));
        assert_eq!(tag_value(&record, "NORMAL", "JQ_VS_HC_SOM"), Some("0".to_string()));
    }

    #[test]
    fn test_hc_file_restricts_somatic_calls_to_its_coordinates() {
        let temp_dir = TempDir::new().unwrap();
        let vcf_path = write(&temp_dir, "patientA.snp.vcf", VARSCAN_VCF);
        let hc_path = write(
            &temp_dir,
            "patientA.snp.Somatic.hc.fpfilter.pass",
            "chrom\tposition\tref\tvar\n1\t42\tA\tC\n",
        );
        let (unclaimed, mut claimed) = varscan()
            .claim(vec![FileReader::new(vcf_path), FileReader::new(hc_path)])
            .unwrap();
        assert!(unclaimed.is_empty());
        assert_eq!(claimed.len(), 1);

        let mut reader = claimed.remove(0);
        reader.open().unwrap();
        let in_hc = reader.next_record().unwrap().unwrap();
        let not_in_hc = reader.next_record().unwrap().unwrap();
        reader.close();
        assert_eq!(tag_value(&in_hc, "TUMOR", "JQ_VS_HC_SOM"), Some("1".to_string()));
        assert_eq!(tag_value(&not_in_hc, "TUMOR", "JQ_VS_HC_SOM"), Some("0".to_string()));
    }

    #[test]
    fn test_hc_file_with_bad_header_is_a_usage_error() {
        let temp_dir = TempDir::new().unwrap();
        let vcf_path = write(&temp_dir, "patientA.snp.vcf", VARSCAN_VCF);
        let hc_path = write(
            &temp_dir,
            "patientA.snp.Somatic.hc.fpfilter.pass",
            "not\ta\theader\n",
        );
        let error = varscan()
            .claim(vec![FileReader::new(vcf_path), FileReader::new(hc_path)])
            .unwrap_err();
        assert!(error.to_string().contains("chrom<TAB>position"));
        assert!(error.to_string().contains("patientA.snp.Somatic.hc.fpfilter.pass"));
    }

    #[test]
    fn test_unpaired_hc_file_is_a_usage_error() {
        let temp_dir = TempDir::new().unwrap();
        let hc_path = write(
            &temp_dir,
            "patientB.snp.Somatic.hc.fpfilter.pass",
            "chrom\tposition\n1\t42\n",
        );
        let error = varscan().claim(vec![FileReader::new(hc_path)]).unwrap_err();
        assert!(error.to_string().contains("paired"));
        assert!(error.to_string().contains("patientB.snp"));
    }

    #[test]
    fn test_error_lists_at_most_five_files() {
        let names: Vec<String> = (0..8).map(|i| format!("file{i}")).collect();
        let listed = file_list_for_error(&names);
        assert!(listed.contains("file4"));
        assert!(!listed.contains("file5,"));
        assert!(listed.contains("(and 3 more)"));
    }

    #[test]
    fn test_freq_to_decimal_handles_multi_allele() {
        assert_eq!(freq_to_decimal("23.1%,4.6%"), Some("0.23,0.05".to_string()));
        assert_eq!(freq_to_decimal("40%"), Some("0.4".to_string()));
        assert_eq!(freq_to_decimal("garbage"), None);
    }
}
