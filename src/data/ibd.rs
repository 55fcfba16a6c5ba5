//! IBD segment file loading

use std::path::Path;

use anyhow::Result;
use polars::prelude::*;

use crate::config::SegmentOverlap;
use crate::data::formats::{IbdFormat, TargetRegion};
use crate::graph::EdgeRow;

/// Name polars gives a headerless column at 0-based `index`
fn column_name(index: usize) -> String {
    format!("column_{}", index + 1)
}

/// Load the segments around `region` as edge rows.
///
/// The file is tab-delimited without a header. Rows are kept when they lie
/// on the region's chromosome, satisfy the `overlap` mode and are at least
/// `min_cm` long.
pub fn load_ibd_segments(
    path: impl AsRef<Path>,
    format: IbdFormat,
    region: &TargetRegion,
    min_cm: f64,
    overlap: SegmentOverlap,
) -> Result<Vec<EdgeRow>> {
    let path = path.as_ref();
    log::info!("Reading {} segments from {}", format, path.display());

    if !path.exists() {
        return Err(anyhow::anyhow!("File not found: {}", path.display()));
    }

    let columns = format.columns();
    let start = col(column_name(columns.start)).cast(DataType::Int64);
    let end = col(column_name(columns.end)).cast(DataType::Int64);
    let length = col(column_name(columns.length_cm)).cast(DataType::Float64);
    let chromosome = col(column_name(columns.chromosome))
        .str()
        .strip_prefix(lit("chr"));

    let in_region = match overlap {
        SegmentOverlap::Contains => start
            .lt_eq(lit(region.start))
            .and(end.gt_eq(lit(region.end))),
        SegmentOverlap::Overlaps => start
            .lt_eq(lit(region.end))
            .and(end.gt_eq(lit(region.start))),
    };

    // Every column is read as text and cast where numbers are needed
    let df = LazyCsvReader::new(path)
        .with_has_header(false)
        .with_separator(b'\t')
        .with_infer_schema_length(Some(0))
        .finish()?
        .filter(
            chromosome
                .eq(lit(region.chromosome.clone()))
                .and(in_region)
                .and(length.clone().gt_eq(lit(min_cm))),
        )
        .select([
            col(column_name(columns.id1)).alias("id1"),
            col(column_name(columns.hap1)).alias("hap1"),
            col(column_name(columns.id2)).alias("id2"),
            col(column_name(columns.hap2)).alias("hap2"),
            length.alias("cm"),
        ])
        .collect()?;

    log::info!("Kept {} segments in region {}", df.height(), region);

    let id1 = df.column("id1")?.str()?;
    let hap1 = df.column("hap1")?.str()?;
    let id2 = df.column("id2")?.str()?;
    let hap2 = df.column("hap2")?.str()?;
    let cm = df.column("cm")?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    for i in 0..df.height() {
        match (id1.get(i), hap1.get(i), id2.get(i), hap2.get(i), cm.get(i)) {
            (Some(id1), Some(hap1), Some(id2), Some(hap2), Some(cm)) => rows.push(EdgeRow::new(
                format.hap_key(id1, hap1),
                format.hap_key(id2, hap2),
                cm,
                id1,
                id2,
            )),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} segments with missing fields", skipped);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HAPIBD: &str = "\
S1\t1\tS2\t2\t20\t100\t900\t5.5
S1\t2\tS3\t1\t20\t150\t800\t2.0
S2\t1\tS3\t2\t20\t600\t2000\t8.0
S4\t1\tS5\t1\tchr20\t50\t5000\t12.0
S6\t1\tS7\t1\t21\t100\t900\t9.0
";

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_contains_filter() {
        let file = write_file(HAPIBD);
        let region: TargetRegion = "20:200-700".parse().unwrap();

        let rows =
            load_ibd_segments(file.path(), IbdFormat::HapIbd, &region, 3.0, SegmentOverlap::Contains)
                .unwrap();

        let pairs: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.hap_key_1.as_str(), r.hap_key_2.as_str()))
            .collect();
        assert_eq!(pairs, vec![("S1.1", "S2.2"), ("S4.1", "S5.1")]);
        assert_eq!(rows[0].individual_id_2, "S2");
        assert_eq!(rows[0].length_cm, 5.5);
    }

    #[test]
    fn test_overlap_filter() {
        let file = write_file(HAPIBD);
        let region: TargetRegion = "20:850-1000".parse().unwrap();

        let rows =
            load_ibd_segments(file.path(), IbdFormat::HapIbd, &region, 3.0, SegmentOverlap::Overlaps)
                .unwrap();

        let keys: Vec<&str> = rows.iter().map(|r| r.hap_key_1.as_str()).collect();
        assert_eq!(keys, vec!["S1.1", "S2.1", "S4.1"]);
    }

    #[test]
    fn test_rapid_columns() {
        // chr, id1, id2, hap1, hap2, start, end, cM
        let file = write_file(
            "20\tS1\tS2\t0\t1\t100\t900\t5.5\n\
             20\tS3\tS4\t1\t1\t100\t900\t1.5\n\
             chr20\tS5\tS6\t1\t0\t50\t950\t7.0\n",
        );
        let region: TargetRegion = "20:200-700".parse().unwrap();

        let rows =
            load_ibd_segments(file.path(), IbdFormat::Rapid, &region, 3.0, SegmentOverlap::Contains)
                .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hap_key_1, "S1.0");
        assert_eq!(rows[0].hap_key_2, "S2.1");
        assert_eq!(rows[0].individual_id_1, "S1");
        assert_eq!(rows[1].hap_key_1, "S5.1");
        assert_eq!(rows[1].length_cm, 7.0);
    }

    #[test]
    fn test_germline_native_keys() {
        // length in cM sits in column 10, after three unused fields
        let file = write_file(
            "S1\tS1_0\tS2\tS2_1\t20\t100\t900\trs1\trs2\t40\t6.0\n\
             S3\tS3_1\tS4\tS4_0\t20\t100\t900\trs1\trs2\t40\t2.5\n",
        );
        let region: TargetRegion = "chr20:200-700".parse().unwrap();

        let rows = load_ibd_segments(
            file.path(),
            IbdFormat::Germline,
            &region,
            3.0,
            SegmentOverlap::Contains,
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hap_key_1, "S1_0");
        assert_eq!(rows[0].hap_key_2, "S2_1");
        assert_eq!(rows[0].individual_id_2, "S2");
        assert_eq!(rows[0].length_cm, 6.0);
    }

    #[test]
    fn test_missing_file() {
        let region: TargetRegion = "20:1-2".parse().unwrap();
        assert!(load_ibd_segments(
            "/nonexistent/segments.ibd",
            IbdFormat::HapIbd,
            &region,
            3.0,
            SegmentOverlap::Contains
        )
        .is_err());
    }
}
