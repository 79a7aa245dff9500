//! Trace loggers — tab-separated samples of the matrix during a search
//!
//! Two layouts: one column per unit holding its symbol string, or one
//! column per cell holding the raw code.

use crate::alignment::VersionedMatrix;
use std::io::{self, Write};

pub trait TraceLogger {
    fn header(&self, matrix: &VersionedMatrix, out: &mut dyn Write) -> io::Result<()>;

    fn sample(&self, sample: u64, matrix: &VersionedMatrix, out: &mut dyn Write) -> io::Result<()>;
}

/// `Sample\t<unit>\t<unit>…` then each unit's symbol string
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceTrace;

/// `Sample\t<unit><site>…` then every code, unit by unit
#[derive(Debug, Clone, Copy, Default)]
pub struct CellTrace;

impl TraceLogger for SequenceTrace {
    fn header(&self, matrix: &VersionedMatrix, out: &mut dyn Write) -> io::Result<()> {
        write!(out, "Sample")?;
        for name in matrix.taxa() {
            write!(out, "\t{}", name)?;
        }
        writeln!(out)
    }

    fn sample(&self, sample: u64, matrix: &VersionedMatrix, out: &mut dyn Write) -> io::Result<()> {
        write!(out, "{}", sample)?;
        let data_type = matrix.data_type();
        for unit in 0..matrix.unit_count() {
            let codes: Vec<_> = matrix.grid().column(unit).iter().copied().collect();
            write!(out, "\t{}", data_type.decode(&codes))?;
        }
        writeln!(out)
    }
}

impl TraceLogger for CellTrace {
    fn header(&self, matrix: &VersionedMatrix, out: &mut dyn Write) -> io::Result<()> {
        write!(out, "Sample")?;
        for name in matrix.taxa() {
            for site in 0..matrix.site_count() {
                write!(out, "\t{}{}", name, site)?;
            }
        }
        writeln!(out)
    }

    fn sample(&self, sample: u64, matrix: &VersionedMatrix, out: &mut dyn Write) -> io::Result<()> {
        write!(out, "{}", sample)?;
        for unit in 0..matrix.unit_count() {
            for site in 0..matrix.site_count() {
                write!(out, "\t{}", matrix.grid()[(site, unit)])?;
            }
        }
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::Nucleotide;
    use std::sync::Arc;

    fn matrix() -> VersionedMatrix {
        VersionedMatrix::from_sequences(Arc::new(Nucleotide), &[("b", "AC"), ("a", "GT")]).unwrap()
    }

    fn render(logger: &dyn TraceLogger, m: &VersionedMatrix) -> String {
        let mut out = Vec::new();
        logger.header(m, &mut out).unwrap();
        logger.sample(10, m, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_sequence_trace() {
        assert_eq!(render(&SequenceTrace, &matrix()), "Sample\ta\tb\n10\tGT\tAC\n");
    }

    #[test]
    fn test_cell_trace() {
        assert_eq!(
            render(&CellTrace, &matrix()),
            "Sample\ta0\ta1\tb0\tb1\n10\t2\t3\t0\t1\n"
        );
    }
}
