pub mod cli;
pub mod error;

pub mod commands {
    pub mod merge;
    pub mod summarize;
    pub mod translate;
}

pub mod core {
    pub mod merge;
    pub mod summarize;
    pub mod vcf_reader;
    pub mod vcf_record;
    pub mod zscore;
    pub mod callers {
        pub mod common;
        pub mod factory;
        pub mod mutect;
        pub mod strelka;
        pub mod varscan;
    }
}

pub mod io {
    pub mod file_reader;
    pub mod file_writer;
}

pub mod utils {
    pub mod util;
}

pub mod constants;

pub use constants::*;
