use crate::{
    cli::SummarizeArgs,
    core::{summarize::SummarizeCaller, vcf_reader::VcfReader, zscore::ZScoreTag},
    io::{file_reader::FileReader, file_writer::FileWriter},
    utils::util::Result,
};

pub fn execute(args: &SummarizeArgs, execution_context: &[String]) -> Result<()> {
    let mut reader = VcfReader::new(FileReader::new(&args.input))?;
    let mut summarize_caller = SummarizeCaller::new();

    // Z-score tags need population statistics from a full pass each
    reader.open()?;
    let af_zscore = ZScoreTag::af_zscore(&mut reader)?;
    reader.close();
    reader.open()?;
    let dp_zscore = ZScoreTag::dp_zscore(&mut reader)?;
    reader.close();
    summarize_caller.add_tag(Box::new(af_zscore));
    summarize_caller.add_tag(Box::new(dp_zscore));

    let mut writer = FileWriter::new(&args.output);
    writer.open()?;
    for metaheader in reader.metaheaders() {
        writer.write_line(metaheader)?;
    }
    for metaheader in summarize_caller.metaheaders() {
        writer.write_line(&metaheader)?;
    }
    for line in execution_context {
        writer.write_line(line)?;
    }
    writer.write_line(reader.column_header())?;

    reader.open()?;
    let result: Result<u64> = (|| {
        let mut count = 0u64;
        while let Some(mut record) = reader.next_record()? {
            summarize_caller.apply(&mut record)?;
            writer.write(&record.text())?;
            count += 1;
        }
        Ok(count)
    })();
    reader.close();
    writer.close()?;

    let count = result?;
    log::info!(
        "Summarized {count} record(s) into {}",
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MERGED_VCF: &str = "\
##fileformat=VCFv4.1
##contig=<ID=1>
##FORMAT=<ID=JQ_MT_AF,Number=A,Type=Float,Description=\"af\">
##FORMAT=<ID=JQ_VS_AF,Number=A,Type=Float,Description=\"af\">
##FORMAT=<ID=JQ_MT_CALLER_REPORTED,Number=1,Type=Integer,Description=\"r\">
##FORMAT=<ID=JQ_VS_CALLER_REPORTED,Number=1,Type=Integer,Description=\"r\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tpatientA|TUMOR
1\t42\t.\tA\tC\t.\t.\t.\tJQ_MT_AF:JQ_VS_AF:JQ_MT_CALLER_REPORTED:JQ_VS_CALLER_REPORTED\t0.2:0.4:1:1
1\t52\t.\tG\tT\t.\t.\t.\tJQ_MT_AF:JQ_VS_AF:JQ_MT_CALLER_REPORTED:JQ_VS_CALLER_REPORTED\t0.1:0.9:1:1
";

    #[test]
    fn test_execute_adds_summary_and_zscore_columns() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("merged.vcf");
        std::fs::write(&input, MERGED_VCF).unwrap();
        let output = temp_dir.path().join("summarized.vcf");

        let args = SummarizeArgs {
            input,
            output: output.clone(),
        };
        execute(&args, &["##jacquard.version=0.1.0".to_string()]).unwrap();

        let summarized = std::fs::read_to_string(&output).unwrap();
        assert!(summarized.contains("##FORMAT=<ID=JQ_SUMMARY_AF_AVERAGE"));
        assert!(summarized.contains("##FORMAT=<ID=JQ_SUMMARY_AF_ZSCORE"));
        assert!(summarized.contains("##INFO=<ID=JQ_SUMMARY_SAMPLES_REPORTED_COUNT"));
        assert!(summarized.contains("##jacquard.version=0.1.0"));

        // First record: AF average (0.2+0.4)/2, range 0.2; two callers reported
        let record = summarized
            .lines()
            .find(|line| line.starts_with("1\t42"))
            .unwrap();
        assert!(record.contains("JQ_SUMMARY_SAMPLES_REPORTED_COUNT=1"));
        let format_index = record.split('\t').nth(8).unwrap();
        let values = record.split('\t').nth(9).unwrap();
        let tags: Vec<&str> = format_index.split(':').collect();
        let sample: Vec<&str> = values.split(':').collect();
        let value_of = |tag: &str| sample[tags.iter().position(|t| *t == tag).unwrap()];
        assert_eq!(value_of("JQ_SUMMARY_AF_AVERAGE"), "0.3");
        assert_eq!(value_of("JQ_SUMMARY_AF_RANGE"), "0.2");
        assert_eq!(value_of("JQ_SUMMARY_CALLERS_REPORTED_COUNT"), "2");
        assert_eq!(value_of("JQ_SUMMARY_CALLERS_REPORTED_LIST"), "MT,VS");
        // AF ranges are [0.2, 0.8]: mean 0.5, stdev 0.3
        assert_eq!(value_of("JQ_SUMMARY_AF_ZSCORE"), "-1.00");
    }
}
