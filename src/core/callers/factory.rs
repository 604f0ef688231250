use crate::{
    core::callers::{common::TranslatedVcfReader, mutect::Mutect, strelka::Strelka, varscan::Varscan},
    error::JqResult,
    io::file_reader::FileReader,
};

/// The closed set of supported variant callers, tried in fixed priority
/// order. Claim predicates are mutually exclusive by metaheader signature,
/// but a file can only ever be claimed once.
enum VariantCaller {
    Varscan(Varscan),
    Strelka(Strelka),
    Mutect(Mutect),
}

impl VariantCaller {
    fn claim(
        &self,
        file_readers: Vec<FileReader>,
    ) -> JqResult<(Vec<FileReader>, Vec<TranslatedVcfReader>)> {
        match self {
            VariantCaller::Varscan(caller) => caller.claim(file_readers),
            VariantCaller::Strelka(caller) => caller.claim(file_readers),
            VariantCaller::Mutect(caller) => caller.claim(file_readers),
        }
    }
}

pub struct VariantCallerFactory {
    callers: Vec<VariantCaller>,
}

impl VariantCallerFactory {
    pub fn new(varscan_hc_pattern: &str) -> JqResult<Self> {
        Ok(VariantCallerFactory {
            callers: vec![
                VariantCaller::Varscan(Varscan::new(varscan_hc_pattern)?),
                VariantCaller::Strelka(Strelka),
                VariantCaller::Mutect(Mutect),
            ],
        })
    }

    /// Routes the pool of file readers through each caller in turn. Files no
    /// caller recognizes are returned for the invoking command to handle.
    pub fn claim(
        &self,
        file_readers: Vec<FileReader>,
    ) -> JqResult<(Vec<FileReader>, Vec<TranslatedVcfReader>)> {
        let mut unclaimed = file_readers;
        let mut all_claimed = Vec::new();
        for caller in &self.callers {
            let (still_unclaimed, claimed) = caller.claim(unclaimed)?;
            unclaimed = still_unclaimed;
            all_claimed.extend(claimed);
        }
        Ok((unclaimed, all_claimed))
    }
}
