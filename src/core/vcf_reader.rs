use crate::{
    core::vcf_record::VcfRecord,
    error::{JacquardError, JqResult},
    io::file_reader::FileReader,
};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static METAHEADER_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^##(FORMAT|INFO|FILTER|contig)=<ID=([^,>]+)").expect("static regex is valid")
});

/// Reader over one VCF file. Metaheaders and the column header are parsed
/// eagerly at construction; records stream lazily through `next_record` while
/// the reader is open. Closing and reopening rewinds to the first record.
#[derive(Debug)]
pub struct VcfReader {
    file_reader: FileReader,
    metaheaders: Vec<String>,
    column_header: String,
    sample_names: Vec<String>,
    format_metaheaders: IndexMap<String, String>,
    info_metaheaders: IndexMap<String, String>,
    filter_metaheaders: IndexMap<String, String>,
    contig_metaheaders: IndexMap<String, String>,
}

fn sample_names_from_header(column_header: &str) -> Vec<String> {
    column_header
        .split('\t')
        .skip(9)
        .map(|name| name.to_string())
        .collect()
}

impl VcfReader {
    pub fn new(mut file_reader: FileReader) -> JqResult<Self> {
        file_reader.open()?;
        let header = Self::read_header(&mut file_reader);
        file_reader.close();
        let (metaheaders, column_header) = header?;

        let mut format_metaheaders = IndexMap::new();
        let mut info_metaheaders = IndexMap::new();
        let mut filter_metaheaders = IndexMap::new();
        let mut contig_metaheaders = IndexMap::new();
        for metaheader in &metaheaders {
            if let Some(captures) = METAHEADER_ID_REGEX.captures(metaheader) {
                let id = captures[2].to_string();
                match &captures[1] {
                    "FORMAT" => format_metaheaders.insert(id, metaheader.clone()),
                    "INFO" => info_metaheaders.insert(id, metaheader.clone()),
                    "FILTER" => filter_metaheaders.insert(id, metaheader.clone()),
                    "contig" => contig_metaheaders.insert(id, metaheader.clone()),
                    _ => unreachable!(),
                };
            }
        }

        let sample_names = sample_names_from_header(&column_header);
        Ok(VcfReader {
            file_reader,
            metaheaders,
            column_header,
            sample_names,
            format_metaheaders,
            info_metaheaders,
            filter_metaheaders,
            contig_metaheaders,
        })
    }

    fn read_header(file_reader: &mut FileReader) -> JqResult<(Vec<String>, String)> {
        let mut metaheaders = Vec::new();
        let mut column_header = None;
        while let Some(line) = file_reader.next_line()? {
            if line.starts_with("##") {
                metaheaders.push(line);
            } else if line.starts_with('#') {
                column_header = Some(line);
                break;
            } else {
                break;
            }
        }
        let column_header = column_header.ok_or_else(|| JacquardError::MissingColumnHeader {
            file_name: file_reader.file_name().to_string(),
        })?;
        if metaheaders.is_empty() {
            return Err(JacquardError::MissingMetaheaders {
                file_name: file_reader.file_name().to_string(),
            });
        }
        Ok((metaheaders, column_header))
    }

    pub fn file_name(&self) -> &str {
        self.file_reader.file_name()
    }

    pub fn metaheaders(&self) -> &[String] {
        &self.metaheaders
    }

    pub fn column_header(&self) -> &str {
        &self.column_header
    }

    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    pub fn format_metaheaders(&self) -> &IndexMap<String, String> {
        &self.format_metaheaders
    }

    pub fn info_metaheaders(&self) -> &IndexMap<String, String> {
        &self.info_metaheaders
    }

    pub fn filter_metaheaders(&self) -> &IndexMap<String, String> {
        &self.filter_metaheaders
    }

    pub fn contig_metaheaders(&self) -> &IndexMap<String, String> {
        &self.contig_metaheaders
    }

    pub fn open(&mut self) -> JqResult<()> {
        self.file_reader.open()
    }

    pub fn close(&mut self) {
        self.file_reader.close();
    }

    /// Next record in file order, skipping header lines. Errors if the reader
    /// is not open.
    pub fn next_record(&mut self) -> JqResult<Option<VcfRecord>> {
        loop {
            match self.file_reader.next_line()? {
                None => return Ok(None),
                Some(line) if line.starts_with('#') => continue,
                Some(line) if line.is_empty() => continue,
                Some(line) => {
                    return VcfRecord::parse_record(&line, &self.sample_names).map(Some)
                }
            }
        }
    }
}
