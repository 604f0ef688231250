use crate::{
    constants::{STRELKA_ABBREVIATION, STRELKA_SIGNATURE},
    core::{
        callers::common::{
            check_snp_indel_pairing, jq_format_tag, metaheaders_match, CallerPassedTag,
            CallerReportedTag, TransformTag, TranslatedVcfReader,
        },
        vcf_reader::VcfReader,
        vcf_record::{TagValues, VcfRecord},
    },
    error::JqResult,
    io::file_reader::FileReader,
    utils::util::format_two_digits,
};
use indexmap::IndexMap;
use rust_decimal::Decimal;

const CALLER_NAME: &str = "Strelka";
const NUCLEOTIDE_COUNT_TAGS: [&str; 4] = ["AU", "CU", "GU", "TU"];

/// Strelka count tags hold "tier1,tier2" pairs; Jacquard works from tier 2.
fn tier2_count(raw_value: &str) -> Option<u64> {
    let piece = raw_value.split(',').nth(1).or_else(|| raw_value.split(',').next())?;
    piece.parse::<u64>().ok()
}

fn ratio_two_digits(numerator: u64, denominator: u64) -> String {
    if denominator == 0 {
        return ".".to_string();
    }
    format_two_digits(Decimal::from(numerator) / Decimal::from(denominator))
}

/// JQ_SK_AF: allele frequency from tier-2 counts. SNV records carry per-base
/// AU/CU/GU/TU counts; indel records carry TAR/TIR (ref/alt) counts.
struct AlleleFreqTag {
    tag_id: String,
}

impl AlleleFreqTag {
    fn snv_sample_value(tag_values: &TagValues, alts: &[&str]) -> Option<String> {
        let mut denominator = 0u64;
        for count_tag in NUCLEOTIDE_COUNT_TAGS {
            denominator += tier2_count(tag_values.get(count_tag)?)?;
        }
        let mut freqs = Vec::new();
        for alt in alts {
            let count_tag = format!("{}U", alt.to_uppercase());
            match tag_values.get(&count_tag).and_then(|value| tier2_count(value)) {
                Some(numerator) => freqs.push(ratio_two_digits(numerator, denominator)),
                None => freqs.push(".".to_string()),
            }
        }
        Some(freqs.join(","))
    }

    fn indel_sample_value(tag_values: &TagValues) -> Option<String> {
        let ref_count = tier2_count(tag_values.get("TAR")?)?;
        let alt_count = tier2_count(tag_values.get("TIR")?)?;
        Some(ratio_two_digits(alt_count, ref_count + alt_count))
    }
}

impl TransformTag for AlleleFreqTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=A,Type=Float,Description=\"Jacquard allele frequency for Strelka: tier-2 alt count / tier-2 total count, rounded to 2 digits\">",
            self.tag_id
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let alts: Vec<&str> = record.alt.split(',').collect();
        let mut values = IndexMap::new();
        for (sample, tag_values) in &record.sample_tag_values {
            let value = if tag_values.contains_key("AU") {
                Self::snv_sample_value(tag_values, &alts)
            } else if tag_values.contains_key("TIR") {
                Self::indel_sample_value(tag_values)
            } else {
                None
            };
            match value {
                Some(value) => values.insert(sample.clone(), value),
                None => return Ok(()),
            };
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

/// JQ_SK_DP: DP2 when present, otherwise the tier-2 nucleotide count sum.
struct DepthTag {
    tag_id: String,
}

impl TransformTag for DepthTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=1,Type=Integer,Description=\"Jacquard depth for Strelka (based on DP2 or tier-2 AU/CU/GU/TU sum)\">",
            self.tag_id
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let mut values = IndexMap::new();
        for (sample, tag_values) in &record.sample_tag_values {
            if let Some(depth) = tag_values.get("DP2") {
                values.insert(sample.clone(), depth.clone());
                continue;
            }
            let mut total = 0u64;
            let mut complete = true;
            for count_tag in NUCLEOTIDE_COUNT_TAGS {
                match tag_values.get(count_tag).and_then(|value| tier2_count(value)) {
                    Some(count) => total += count,
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                return Ok(());
            }
            values.insert(sample.clone(), total.to_string());
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

/// JQ_SK_HC_SOM: Strelka encodes somatic status positionally; on a PASS
/// record the tumor sample (second column) is somatic. Inherited domain
/// heuristic, preserved as-is.
struct SomaticTag {
    tag_id: String,
}

impl TransformTag for SomaticTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=1,Type=Integer,Description=\"Jacquard somatic status for Strelka: 0=non-somatic, 1=somatic (tumor sample of a PASS record)\">",
            self.tag_id
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let passed = record.filter == "PASS";
        let mut values = IndexMap::new();
        for (sample_index, sample) in record.sample_tag_values.keys().enumerate() {
            let somatic = if passed && sample_index == 1 { "1" } else { "0" };
            values.insert(sample.clone(), somatic.to_string());
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

fn strelka_tags() -> Vec<Box<dyn TransformTag>> {
    vec![
        Box::new(CallerReportedTag::new(STRELKA_ABBREVIATION, CALLER_NAME)),
        Box::new(CallerPassedTag::new(STRELKA_ABBREVIATION, CALLER_NAME)),
        Box::new(AlleleFreqTag {
            tag_id: jq_format_tag(STRELKA_ABBREVIATION, "AF"),
        }),
        Box::new(DepthTag {
            tag_id: jq_format_tag(STRELKA_ABBREVIATION, "DP"),
        }),
        Box::new(SomaticTag {
            tag_id: jq_format_tag(STRELKA_ABBREVIATION, "HC_SOM"),
        }),
    ]
}

pub struct Strelka;

impl Strelka {
    pub fn claim(
        &self,
        file_readers: Vec<FileReader>,
    ) -> JqResult<(Vec<FileReader>, Vec<TranslatedVcfReader>)> {
        let mut unclaimed = Vec::new();
        let mut claimed = Vec::new();
        for mut file_reader in file_readers {
            let is_strelka =
                metaheaders_match(&mut file_reader, |line| line == STRELKA_SIGNATURE)?;
            if !is_strelka {
                unclaimed.push(file_reader);
                continue;
            }
            log::debug!("Strelka claimed [{}]", file_reader.file_name());
            let reader = VcfReader::new(file_reader)?;
            claimed.push(TranslatedVcfReader::new(reader, CALLER_NAME, strelka_tags()));
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
    use crate::core::callers::common::test_utils::tag_value;
    use tempfile::TempDir;

    const STRELKA_SNV_VCF: &str = "\
##fileformat=VCFv4.1
##source=strelka
##FORMAT=<ID=AU,Number=2,Type=Integer,Description=\"A tier1,tier2 counts\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNORMAL\tTUMOR
1\t42\t.\tA\tC\t.\tPASS\t.\tAU:CU:GU:TU\t18,20:0,0:0,0:0,0\t15,15:4,5:0,0:0,0
";

    fn claim_one(name: &str, contents: &str) -> (TempDir, TranslatedVcfReader) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        let (unclaimed, mut claimed) = Strelka.claim(vec![FileReader::new(path)]).unwrap();
        assert!(unclaimed.is_empty());
        assert_eq!(claimed.len(), 1);
        (temp_dir, claimed.remove(0))
    }

    #[test]
    fn test_claim_requires_exact_source_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("other.vcf");
        std::fs::write(
            &path,
            "##fileformat=VCFv4.1\n##source=strelka-lookalike\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
        )
        .unwrap();
        let (unclaimed, claimed) = Strelka.claim(vec![FileReader::new(path)]).unwrap();
        assert_eq!(unclaimed.len(), 1);
        assert!(claimed.is_empty());
    }

    #[test]
    fn test_snv_allele_freq_uses_tier2_counts() {
        let (_temp_dir, mut reader) = claim_one("patientA.snvs.vcf", STRELKA_SNV_VCF);
        reader.open().unwrap();
        let record = reader.next_record().unwrap().unwrap();
        reader.close();

        // TUMOR: CU tier2 = 5, total tier2 = 20 -> 0.25
        assert_eq!(tag_value(&record, "TUMOR", "JQ_SK_AF"), Some("0.25".to_string()));
        assert_eq!(tag_value(&record, "NORMAL", "JQ_SK_AF"), Some("0".to_string()));
        // Depth falls back to the tier-2 sum when DP2 is absent
        assert_eq!(tag_value(&record, "TUMOR", "JQ_SK_DP"), Some("20".to_string()));
    }

    #[test]
    fn test_indel_allele_freq_uses_tar_tir() {
        let contents = "\
##fileformat=VCFv4.1
##source=strelka
##FORMAT=<ID=TIR,Number=2,Type=Integer,Description=\"alt tier counts\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNORMAL\tTUMOR
1\t42\t.\tAT\tA\t.\tPASS\t.\tDP2:TAR:TIR\t50:40,40:0,0\t60:30,30:10,10
";
        let (_temp_dir, mut reader) = claim_one("patientA.indels.vcf", contents);
        reader.open().unwrap();
        let record = reader.next_record().unwrap().unwrap();
        reader.close();

        // TUMOR: TIR tier2 = 10, TAR tier2 = 30 -> 10/40 = 0.25
        assert_eq!(tag_value(&record, "TUMOR", "JQ_SK_AF"), Some("0.25".to_string()));
        assert_eq!(tag_value(&record, "TUMOR", "JQ_SK_DP"), Some("60".to_string()));
    }

    #[test]
    fn test_somatic_tag_marks_tumor_of_pass_records() {
        let (_temp_dir, mut reader) = claim_one("patientA.snvs.vcf", STRELKA_SNV_VCF);
        reader.open().unwrap();
        let record = reader.next_record().unwrap().unwrap();
        reader.close();
        assert_eq!(tag_value(&record, "TUMOR", "JQ_SK_HC_SOM"), Some("1".to_string()));
        assert_eq!(tag_value(&record, "NORMAL", "JQ_SK_HC_SOM"), Some("0".to_string()));
    }

    #[test]
    fn test_somatic_tag_all_zero_for_failed_records() {
        let contents = STRELKA_SNV_VCF.replace("\tPASS\t", "\tQSS_ref\t");
        let (_temp_dir, mut reader) = claim_one("patientA.snvs.vcf", &contents);
        reader.open().unwrap();
        let record = reader.next_record().unwrap().unwrap();
        reader.close();
        assert_eq!(tag_value(&record, "TUMOR", "JQ_SK_HC_SOM"), Some("0".to_string()));
        assert_eq!(tag_value(&record, "TUMOR", "JQ_SK_CALLER_PASSED"), Some("0".to_string()));
    }
}
