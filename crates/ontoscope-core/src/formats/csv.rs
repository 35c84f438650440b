use std::io::Write;

use crate::dedup::Discarded;
use crate::error::Result;
use crate::record::CanonicalRecord;

/// Column order of every record export.
pub const COLUMNS: &[&str] = &[
    "title",
    "authors",
    "abstract",
    "keywords",
    "year",
    "doi",
    "url",
    "source",
    "publisher",
];

/// Byte-order mark so spreadsheet tools pick UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn write_records<W: Write>(mut out: W, records: &[CanonicalRecord]) -> Result<()> {
    out.write_all(UTF8_BOM)?;
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.write_record(row(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Audit export of duplicates: key columns first, then the record.
pub fn write_discarded<W: Write>(mut out: W, discarded: &[Discarded]) -> Result<()> {
    out.write_all(UTF8_BOM)?;
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["key_kind", "key", "kept_index"];
    header.extend_from_slice(COLUMNS);
    writer.write_record(&header)?;

    for item in discarded {
        let mut fields = vec![
            item.key.kind().to_string(),
            item.key.as_str().to_string(),
            item.kept_index.to_string(),
        ];
        fields.extend(row(&item.record));
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn row(record: &CanonicalRecord) -> Vec<String> {
    vec![
        record.title.clone(),
        record.authors.clone(),
        record.abstract_text.clone(),
        record.keywords.clone(),
        record.year.map(|y| y.to_string()).unwrap_or_default(),
        record.doi.clone().unwrap_or_default(),
        record.url.clone().unwrap_or_default(),
        record.source.clone(),
        record.publisher.clone().unwrap_or_default(),
    ]
}
