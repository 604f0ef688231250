use crate::{
    constants::{MUTECT_ABBREVIATION, MUTECT_SIGNATURE},
    core::{
        callers::common::{
            jq_format_tag, metaheaders_match, round_allele_freq, CallerPassedTag,
            CallerReportedTag, TransformTag, TranslatedVcfReader,
        },
        vcf_reader::VcfReader,
        vcf_record::VcfRecord,
    },
    error::{JacquardError, JqResult},
    io::file_reader::FileReader,
};
use indexmap::IndexMap;

const CALLER_NAME: &str = "MuTect";

/// Copies one caller-native FORMAT tag into its Jacquard name, optionally
/// rounding allele frequencies. No-ops when the source tag is absent.
struct CopiedFormatTag {
    tag_id: String,
    source_tag: &'static str,
    round: bool,
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
                Some(raw_value) => {
                    let value = if self.round {
                        round_allele_freq(raw_value).unwrap_or_else(|| ".".to_string())
                    } else {
                        raw_value.clone()
                    };
                    values.insert(sample.clone(), value);
                }
                None => return Ok(()),
            }
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

/// JQ_MT_HC_SOM: 1 for samples whose MuTect SS status is 2 (somatic).
struct SomaticTag {
    tag_id: String,
}

impl TransformTag for SomaticTag {
    fn metaheader(&self) -> String {
        format!(
            "##FORMAT=<ID={},Number=1,Type=Integer,Description=\"Jacquard somatic status for MuTect: 0=non-somatic, 1=somatic (based on SS FORMAT tag)\">",
            self.tag_id
        )
    }

    fn add_tag_values(&self, record: &mut VcfRecord) -> JqResult<()> {
        let mut values = IndexMap::new();
        for (sample, tag_values) in &record.sample_tag_values {
            match tag_values.get("SS") {
                Some(status) => {
                    let somatic = if status == "2" { "1" } else { "0" };
                    values.insert(sample.clone(), somatic.to_string());
                }
                None => return Ok(()),
            }
        }
        if values.is_empty() {
            return Ok(());
        }
        record.add_sample_tag_value(&self.tag_id, &values)
    }
}

fn mutect_tags() -> Vec<Box<dyn TransformTag>> {
    vec![
        Box::new(CallerReportedTag::new(MUTECT_ABBREVIATION, CALLER_NAME)),
        Box::new(CallerPassedTag::new(MUTECT_ABBREVIATION, CALLER_NAME)),
        Box::new(CopiedFormatTag {
            tag_id: jq_format_tag(MUTECT_ABBREVIATION, "GT"),
            source_tag: "GT",
            round: false,
            description: "Jacquard genotype (based on GT)",
            vcf_type: "String",
        }),
        Box::new(CopiedFormatTag {
            tag_id: jq_format_tag(MUTECT_ABBREVIATION, "AF"),
            source_tag: "FA",
            round: true,
            description: "Jacquard allele frequency for MuTect: decimal allele frequency rounded to 2 digits (based on FA)",
            vcf_type: "Float",
        }),
        Box::new(CopiedFormatTag {
            tag_id: jq_format_tag(MUTECT_ABBREVIATION, "DP"),
            source_tag: "DP",
            round: false,
            description: "Jacquard depth for MuTect (based on DP)",
            vcf_type: "Integer",
        }),
        Box::new(SomaticTag {
            tag_id: jq_format_tag(MUTECT_ABBREVIATION, "HC_SOM"),
        }),
    ]
}

/// Extracts the normal/tumor sample names from the `##MuTect=` metaheader.
/// MuTect writes its column header with alignment-derived names; Jacquard
/// canonicalizes them to NORMAL/TUMOR.
fn normal_tumor_sample_names(
    metaheaders: &[String],
    sample_names: &[String],
    file_name: &str,
) -> JqResult<Vec<String>> {
    let mutect_line = metaheaders
        .iter()
        .find(|line| line.starts_with(MUTECT_SIGNATURE))
        .ok_or_else(|| JacquardError::UnparsableMutectHeader {
            file_name: file_name.to_string(),
        })?;

    let mut normal_name = None;
    let mut tumor_name = None;
    for token in mutect_line.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            match key {
                "normal_sample_name" => normal_name = Some(value.trim_matches('"').to_string()),
                "tumor_sample_name" => tumor_name = Some(value.trim_matches('"').to_string()),
                _ => {}
            }
        }
    }
    let (Some(normal_name), Some(tumor_name)) = (normal_name, tumor_name) else {
        return Err(JacquardError::UnparsableMutectHeader {
            file_name: file_name.to_string(),
        });
    };

    sample_names
        .iter()
        .map(|name| {
            if *name == normal_name {
                Ok("NORMAL".to_string())
            } else if *name == tumor_name {
                Ok("TUMOR".to_string())
            } else {
                Err(JacquardError::UnparsableMutectHeader {
                    file_name: file_name.to_string(),
                })
            }
        })
        .collect()
}

pub struct Mutect;

impl Mutect {
    pub fn claim(
        &self,
        file_readers: Vec<FileReader>,
    ) -> JqResult<(Vec<FileReader>, Vec<TranslatedVcfReader>)> {
        let mut unclaimed = Vec::new();
        let mut claimed = Vec::new();
        for mut file_reader in file_readers {
            let is_mutect =
                metaheaders_match(&mut file_reader, |line| line.starts_with(MUTECT_SIGNATURE))?;
            if !is_mutect {
                unclaimed.push(file_reader);
                continue;
            }
            log::debug!("MuTect claimed [{}]", file_reader.file_name());
            let reader = VcfReader::new(file_reader)?;
            let new_names = normal_tumor_sample_names(
                reader.metaheaders(),
                reader.sample_names(),
                reader.file_name(),
            )?;
            claimed.push(
                TranslatedVcfReader::new(reader, CALLER_NAME, mutect_tags())
                    .rename_samples(new_names),
            );
        }
        Ok((unclaimed, claimed))
    }
}
