use crate::{
    constants::{
        EXCLUDE_FILTER, MALFORMED_ALT_FILTER, MALFORMED_REF_FILTER, MISSING_ALT_FILTER,
    },
    core::callers::{common::TranslatedVcfReader, factory::VariantCallerFactory},
    core::vcf_record::VcfRecord,
    io::{file_reader::FileReader, file_writer::FileWriter},
    utils::util::Result,
};
use crate::cli::TranslateArgs;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static VALID_ALLELE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ACGTNacgtn]+$").expect("static regex is valid"));

fn exclude_filter_metaheaders() -> [String; 4] {
    [
        format!("##FILTER=<ID={MALFORMED_REF_FILTER},Description=\"The REF value was not a valid allele sequence\">"),
        format!("##FILTER=<ID={MALFORMED_ALT_FILTER},Description=\"The ALT value was not a valid allele sequence\">"),
        format!("##FILTER=<ID={MISSING_ALT_FILTER},Description=\"The ALT value was missing\">"),
        format!("##FILTER=<ID={EXCLUDE_FILTER},Description=\"The record is problematic and will be excluded from downstream Jacquard processing\">"),
    ]
}

/// Flags malformed REF/ALT values in the FILTER column rather than failing the
/// run; flagged records are retained but marked for downstream exclusion.
/// Returns true when the record was flagged.
fn flag_malformed(record: &mut VcfRecord) -> bool {
    let mut flags = Vec::new();
    if !VALID_ALLELE_REGEX.is_match(&record.ref_allele) {
        flags.push(MALFORMED_REF_FILTER);
    }
    // ALT alleles are judged individually so a "." or "*" buried in a
    // multi-allelic list is still flagged
    let mut malformed_alt = false;
    let mut missing_alt = false;
    for allele in record.alt.split(',') {
        if allele == "." || allele == "*" {
            missing_alt = true;
        } else if !VALID_ALLELE_REGEX.is_match(allele) {
            malformed_alt = true;
        }
    }
    if malformed_alt {
        flags.push(MALFORMED_ALT_FILTER);
    }
    if missing_alt {
        flags.push(MISSING_ALT_FILTER);
    }
    if flags.is_empty() {
        return false;
    }
    for flag in flags {
        record.add_or_replace_filter(flag);
    }
    record.add_or_replace_filter(EXCLUDE_FILTER);
    true
}

fn translated_file_name(file_name: &str) -> String {
    let base = file_name.trim_end_matches(".gz").trim_end_matches(".gzip");
    let base = base.strip_suffix(".vcf").unwrap_or(base);
    format!("{base}.translated.vcf")
}

fn input_file_readers(input_dir: &Path) -> Result<Vec<FileReader>> {
    let mut readers = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        readers.push(FileReader::new(entry.path()));
    }
    readers.sort();
    Ok(readers)
}

fn translate_file(
    reader: &mut TranslatedVcfReader,
    output_dir: &Path,
    execution_context: &[String],
) -> Result<u64> {
    let output_name = translated_file_name(reader.file_name());
    let mut writer = FileWriter::new(output_dir.join(&output_name));
    writer.open()?;
    reader.open()?;

    let result: Result<u64> = (|| {
        for metaheader in reader.metaheaders() {
            writer.write_line(metaheader)?;
        }
        for metaheader in reader.new_metaheaders() {
            writer.write_line(&metaheader)?;
        }
        for metaheader in exclude_filter_metaheaders() {
            writer.write_line(&metaheader)?;
        }
        for line in execution_context {
            writer.write_line(line)?;
        }
        writer.write_line(reader.column_header())?;

        let mut excluded = 0u64;
        while let Some(mut record) = reader.next_record()? {
            if flag_malformed(&mut record) {
                excluded += 1;
            }
            writer.write(&record.text())?;
        }
        Ok(excluded)
    })();

    reader.close();
    writer.close()?;
    let excluded = result?;
    log::debug!(
        "Translated [{}] ({}) -> [{output_name}]",
        reader.file_name(),
        reader.caller_name()
    );
    Ok(excluded)
}

pub fn execute(args: &TranslateArgs, execution_context: &[String]) -> Result<()> {
    let file_readers = input_file_readers(&args.input_dir)?;
    if file_readers.is_empty() {
        return Err(crate::jq_error!(
            "No input files found in {}",
            args.input_dir.display()
        ));
    }

    let factory = VariantCallerFactory::new(&args.varscan_hc_pattern)?;
    let (unclaimed, mut claimed) = factory.claim(file_readers)?;
    if !unclaimed.is_empty() {
        let names: Vec<&str> = unclaimed.iter().map(|reader| reader.file_name()).collect();
        if args.force {
            log::warn!(
                "Skipping {} unrecognized file(s): {}",
                names.len(),
                names.join(", ")
            );
        } else {
            return Err(crate::jq_error!(
                "Could not determine the variant caller for {} file(s) [{}]; \
                 review the inputs or rerun with --force",
                names.len(),
                names.join(", ")
            ));
        }
    }
    if claimed.is_empty() {
        return Err(crate::jq_error!(
            "No translatable VCFs found in {}",
            args.input_dir.display()
        ));
    }

    std::fs::create_dir_all(&args.output_dir)?;

    let mut total_excluded = 0u64;
    for reader in claimed.iter_mut() {
        let excluded = translate_file(reader, &args.output_dir, execution_context)?;
        if excluded > 0 {
            log::warn!(
                "{excluded} record(s) in [{}] were malformed and flagged {EXCLUDE_FILTER}",
                reader.file_name()
            );
        }
        total_excluded += excluded;
    }
    if total_excluded > 0 {
        log::warn!(
            "{total_excluded} total record(s) were flagged {EXCLUDE_FILTER} and will be \
             skipped by merge"
        );
    }
    log::info!(
        "Translated {} file(s) into {}",
        claimed.len(),
        args.output_dir.display()
    );
    Ok(())
}
