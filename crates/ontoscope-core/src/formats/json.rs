use std::io::Write;

use crate::error::Result;
use crate::record::CanonicalRecord;

/// Pretty-printed JSON array, trailing newline included.
pub fn write_records<W: Write>(mut out: W, records: &[CanonicalRecord]) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, records)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Accepts writes, refuses to flush.
    struct FlushFails(Vec<u8>);

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    #[test]
    fn flush_failure_is_reported() {
        let err = write_records(FlushFails(Vec::new()), &[]).unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Io(_)));
    }

    #[test]
    fn abstract_field_keeps_its_name() {
        let record = CanonicalRecord {
            title: "Linked Data".to_string(),
            abstract_text: "An abstract".to_string(),
            source: "crossref".to_string(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        write_records(&mut buf, &[record.clone()]).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed[0]["abstract"], "An abstract");
        assert!(parsed[0].get("publisher").is_none());

        let back: Vec<CanonicalRecord> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(back, vec![record]);
    }
}
