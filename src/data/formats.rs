//! Column layouts of the supported IBD segment detectors

use std::fmt;
use std::str::FromStr;

use crate::error::NetworkError;

/// Program that produced the IBD segment file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IbdFormat {
    HapIbd,
    Germline,
    Ilash,
    Rapid,
}

/// 0-based column positions of the fields used for network building
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndices {
    pub id1: usize,
    pub hap1: usize,
    pub id2: usize,
    pub hap2: usize,
    pub chromosome: usize,
    pub start: usize,
    pub end: usize,
    pub length_cm: usize,
}

impl IbdFormat {
    pub fn name(&self) -> &'static str {
        match self {
            IbdFormat::HapIbd => "hapibd",
            IbdFormat::Germline => "germline",
            IbdFormat::Ilash => "ilash",
            IbdFormat::Rapid => "rapid",
        }
    }

    pub fn columns(&self) -> ColumnIndices {
        match self {
            IbdFormat::HapIbd => ColumnIndices {
                id1: 0,
                hap1: 1,
                id2: 2,
                hap2: 3,
                chromosome: 4,
                start: 5,
                end: 6,
                length_cm: 7,
            },
            IbdFormat::Germline => ColumnIndices {
                id1: 0,
                hap1: 1,
                id2: 2,
                hap2: 3,
                chromosome: 4,
                start: 5,
                end: 6,
                length_cm: 10,
            },
            IbdFormat::Ilash => ColumnIndices {
                id1: 0,
                hap1: 1,
                id2: 2,
                hap2: 3,
                chromosome: 4,
                start: 5,
                end: 6,
                length_cm: 9,
            },
            IbdFormat::Rapid => ColumnIndices {
                id1: 1,
                hap1: 3,
                id2: 2,
                hap2: 4,
                chromosome: 0,
                start: 5,
                end: 6,
                length_cm: 7,
            },
        }
    }

    /// Haplotype key for one side of a segment. hap-IBD and RAPID report a
    /// phase number that is appended to the individual id; GERMLINE and
    /// iLASH already report a haplotype identifier.
    pub fn hap_key(&self, individual_id: &str, hap_field: &str) -> String {
        match self {
            IbdFormat::HapIbd | IbdFormat::Rapid => format!("{individual_id}.{hap_field}"),
            IbdFormat::Germline | IbdFormat::Ilash => hap_field.to_string(),
        }
    }
}

impl FromStr for IbdFormat {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hapibd" => Ok(IbdFormat::HapIbd),
            "germline" => Ok(IbdFormat::Germline),
            "ilash" => Ok(IbdFormat::Ilash),
            "rapid" => Ok(IbdFormat::Rapid),
            _ => Err(NetworkError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for IbdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Genomic region of interest, `<chr>:<start>-<end>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegion {
    /// Chromosome without a `chr` prefix
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
}

impl FromStr for TargetRegion {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetworkError::InvalidRegion(s.to_string());

        let (chromosome, span) = s.trim().split_once(':').ok_or_else(invalid)?;
        let (start, end) = span.split_once('-').ok_or_else(invalid)?;

        let chromosome = chromosome.strip_prefix("chr").unwrap_or(chromosome);
        let start: i64 = start.trim().parse().map_err(|_| invalid())?;
        let end: i64 = end.trim().parse().map_err(|_| invalid())?;

        if chromosome.is_empty() || start < 0 || start > end {
            return Err(invalid());
        }

        Ok(Self {
            chromosome: chromosome.to_string(),
            start,
            end,
        })
    }
}

impl fmt::Display for TargetRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}
