use crate::error::JqResult;
use rust_decimal::{Decimal, RoundingStrategy};
use std::{cmp::Ordering, env, fmt::Display, sync::Once};

pub type Result<T> = JqResult<T>;

#[allow(unused)]
static INIT_LOG: Once = Once::new();

#[allow(unused)]
pub fn init_logger() {
    INIT_LOG.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .init();
    });
}

pub fn handle_error_and_exit(err: impl Display) -> ! {
    log::error!("{err}");
    std::process::exit(1);
}

/// Metaheader lines recording how this run was invoked. Prepended verbatim to
/// every output VCF.
pub fn execution_context(full_version: &str) -> Vec<String> {
    let command_line = env::args().collect::<Vec<String>>().join(" ");
    let cwd = env::current_dir()
        .map(|d| d.display().to_string())
        .unwrap_or_else(|_| ".".to_string());
    vec![
        format!("##jacquard.version={full_version}"),
        format!("##jacquard.command={command_line}"),
        format!("##jacquard.cwd={cwd}"),
    ]
}

/// Rounds to two decimal digits (half away from zero) and strips trailing
/// zeros, so 0.235 -> "0.24", 0.10 -> "0.1", and 2.00 -> "2".
pub fn format_two_digits(value: Decimal) -> String {
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalChunk {
    Number(u64),
    Text(String),
}

/// Splits a string into numeric and non-numeric runs so that numeric runs
/// compare numerically: "chr2" sorts before "chr10".
fn natural_chunks(value: &str) -> Vec<NaturalChunk> {
    let mut chunks = Vec::new();
    let mut digits = String::new();
    let mut text = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            if !text.is_empty() {
                chunks.push(NaturalChunk::Text(std::mem::take(&mut text).to_lowercase()));
            }
            digits.push(c);
        } else {
            if !digits.is_empty() {
                // Runs longer than u64 would be malformed input anyway
                if let Ok(n) = std::mem::take(&mut digits).parse::<u64>() {
                    chunks.push(NaturalChunk::Number(n));
                }
            }
            text.push(c);
        }
    }
    if !digits.is_empty() {
        if let Ok(n) = digits.parse::<u64>() {
            chunks.push(NaturalChunk::Number(n));
        }
    }
    if !text.is_empty() {
        chunks.push(NaturalChunk::Text(text.to_lowercase()));
    }
    chunks
}

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_chunks(a).cmp(&natural_chunks(b))
}

pub fn natural_sort(values: &mut [String]) {
    values.sort_by(|a, b| natural_cmp(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_format_two_digits_rounds_half_away_from_zero() {
        assert_eq!(format_two_digits(Decimal::from_str("0.235").unwrap()), "0.24");
        assert_eq!(format_two_digits(Decimal::from_str("-0.235").unwrap()), "-0.24");
        assert_eq!(format_two_digits(Decimal::from_str("0.234").unwrap()), "0.23");
    }

    #[test]
    fn test_format_two_digits_strips_trailing_zeros() {
        assert_eq!(format_two_digits(Decimal::from_str("0.10").unwrap()), "0.1");
        assert_eq!(format_two_digits(Decimal::from_str("2.00").unwrap()), "2");
        assert_eq!(format_two_digits(Decimal::from_str("0").unwrap()), "0");
    }

    #[test]
    fn test_natural_cmp_orders_numeric_runs_numerically() {
        assert_eq!(natural_cmp("chr2", "chr10"), Ordering::Less);
        assert_eq!(natural_cmp("sample10", "sample9"), Ordering::Greater);
        assert_eq!(natural_cmp("chrX", "chrX"), Ordering::Equal);
    }

    #[test]
    fn test_natural_sort_mixed_names() {
        let mut names = vec![
            "patientB.10.vcf".to_string(),
            "patientB.2.vcf".to_string(),
            "patientA.vcf".to_string(),
        ];
        natural_sort(&mut names);
        assert_eq!(
            names,
            vec![
                "patientA.vcf".to_string(),
                "patientB.2.vcf".to_string(),
                "patientB.10.vcf".to_string(),
            ]
        );
    }

    #[test]
    fn test_execution_context_has_version_command_and_cwd() {
        let context = execution_context("0.1.0");
        assert_eq!(context.len(), 3);
        assert!(context[0].starts_with("##jacquard.version=0.1.0"));
        assert!(context[1].starts_with("##jacquard.command="));
        assert!(context[2].starts_with("##jacquard.cwd="));
    }
}
