use crate::{
    cli::MergeArgs,
    core::{
        callers::{common::TranslatedVcfReader, factory::VariantCallerFactory},
        merge::{build_coordinates, BufferedReader, MergeContext},
        vcf_reader::VcfReader,
    },
    io::{file_reader::FileReader, file_writer::FileWriter},
    utils::util::{natural_cmp, Result},
};

/// Inputs straight from a caller are claimed and tagged on the fly;
/// already-translated files (which no caller claims) pass through untouched.
fn build_readers(args: &MergeArgs) -> Result<Vec<TranslatedVcfReader>> {
    let paths = args
        .process_vcf_paths()
        .map_err(|error| crate::jq_error!("{error}"))?;
    let file_readers: Vec<FileReader> = paths.into_iter().map(FileReader::new).collect();

    let factory = VariantCallerFactory::new(&args.varscan_hc_pattern)?;
    let (unclaimed, mut readers) = factory.claim(file_readers)?;
    for file_reader in unclaimed {
        readers.push(TranslatedVcfReader::passthrough(VcfReader::new(
            file_reader,
        )?));
    }
    readers.sort_by(|a, b| natural_cmp(a.file_name(), b.file_name()));
    Ok(readers)
}

pub fn execute(args: &MergeArgs, execution_context: &[String]) -> Result<()> {
    let mut readers = build_readers(args)?;
    log::info!("Merging {} file(s)", readers.len());

    let context = MergeContext::new(&readers, &args.include_format_tags)?;

    for reader in readers.iter_mut() {
        reader.open()?;
    }
    let coordinates_result = build_coordinates(&mut readers, args.include_variants);
    for reader in readers.iter_mut() {
        reader.close();
    }
    let coordinates = coordinates_result?;
    log::info!(
        "Found {} distinct coordinate(s) across {} sample column(s)",
        coordinates.len(),
        context.output_sample_keys().len()
    );

    let mut writer = FileWriter::new(&args.output);
    writer.open()?;
    for metaheader in context.compile_metaheaders(&readers, execution_context) {
        writer.write_line(&metaheader)?;
    }
    writer.write_line(&context.column_header())?;

    let mut buffered = Vec::with_capacity(readers.len());
    for mut reader in readers {
        reader.open()?;
        buffered.push(BufferedReader::new(reader)?);
    }

    let mut written = 0u64;
    for stub in &coordinates {
        let mut pulled = Vec::new();
        for (reader_index, reader) in buffered.iter_mut().enumerate() {
            while let Some(record) = reader.next_if_equals(stub)? {
                pulled.push((reader_index, record));
            }
        }
        if let Some(merged) =
            context.merge_coordinate(stub, &pulled, args.include_variants, args.include_loci)?
        {
            writer.write(&merged.text())?;
            written += 1;
        }
    }

    for reader in buffered {
        reader.into_reader().close();
    }
    writer.close()?;
    log::info!("Wrote {written} merged record(s) to {}", args.output.display());
    Ok(())
}
