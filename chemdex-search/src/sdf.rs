//! Streaming SD-file record parser.
//!
//! An SD record is a molecule block terminated by an `M  END` line, zero or
//! more `> <NAME>` property sections, and a `$$$$` terminator. The parser
//! emits one record per call, lazily, and attaches the synthetic properties
//! `dataset_name`, `line_number` (the record's starting line) and
//! `record_number` (monotonic from a configurable start).

use std::io::BufRead;

use chemdex_core::Result;

/// Synthetic property: name of the dataset the record came from.
pub const PROP_DATASET_NAME: &str = "dataset_name";
/// Synthetic property: starting line of the record within the stream.
pub const PROP_LINE_NUMBER: &str = "line_number";
/// Synthetic property: running record number within the stream.
pub const PROP_RECORD_NUMBER: &str = "record_number";

/// One parsed SD record: raw molblock text plus named properties in file
/// order.
#[derive(Debug, Clone, Default)]
pub struct SdfRecord {
    structure: Option<String>,
    properties: Vec<(String, String)>,
}

impl SdfRecord {
    /// Parse a record from its raw text (with or without the trailing
    /// `$$$$`).
    pub fn parse(text: &str) -> Self {
        let mut record = SdfRecord::default();
        record.load(text);
        record
    }

    fn load(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n");

        // A region that opens with a property header has no structure at
        // all; otherwise everything up to and including `M  END` is the
        // molblock. Without an `M  END` the whole region is the molblock and
        // there are no properties.
        if text.starts_with("> <") || text.starts_with(">  <") {
            return self.load_properties(&text);
        }

        match text.lines().position(|line| line.starts_with("M  END")) {
            Some(end_line) => {
                let mut structure = String::new();
                let mut consumed = 0usize;
                for (i, line) in text.lines().enumerate() {
                    consumed += line.len() + 1;
                    structure.push_str(line);
                    structure.push('\n');
                    if i == end_line {
                        break;
                    }
                }
                self.structure = Some(structure);
                let rest = text.get(consumed..).unwrap_or("").to_string();
                self.load_properties(&rest);
            }
            None => {
                self.structure = Some(text);
            }
        }
    }

    fn load_properties(&mut self, text: &str) {
        // Pad single blank lines so they survive the line walk as
        // single-space values
        let text = text.replace("\n\n", "\n \n");

        let mut name: Option<String> = None;
        let mut value = String::new();

        for raw_line in text.lines() {
            // Only padded blank lines survive; genuinely empty lines are
            // section separators
            if raw_line.is_empty() {
                continue;
            }
            let line = raw_line.trim();

            if line.starts_with("> <") || line.starts_with(">  <") {
                self.flush_property(name.take(), &mut value);
                name = property_name(line);
            } else if line.starts_with("$$$$") {
                break;
            } else {
                value.push_str(line);
                value.push('\n');
            }
        }
        self.flush_property(name, &mut value);
    }

    fn flush_property(&mut self, name: Option<String>, value: &mut String) {
        let trimmed = value.trim_end_matches(['\n', '\r', '\t']).to_string();
        value.clear();
        if let Some(name) = name {
            if !trimmed.is_empty() {
                self.properties.push((name, trimmed));
            }
        }
    }

    /// The raw molblock text, if the record had one.
    pub fn structure(&self) -> Option<&str> {
        self.structure.as_deref()
    }

    /// First value of a property.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a property, replacing an existing value of the same name.
    pub fn put(&mut self, name: &str, value: String) {
        match self.properties.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.properties.push((name.to_string(), value)),
        }
    }

    /// All properties in file order.
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Re-serialize the record as SD text, optionally excluding named
    /// properties.
    pub fn to_sdf(&self, exclude: &[&str]) -> String {
        let mut out = String::with_capacity(512);
        if let Some(structure) = &self.structure {
            out.push_str(structure);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        for (name, value) in &self.properties {
            if exclude.contains(&name.as_str()) {
                continue;
            }
            out.push_str("> <");
            out.push_str(name);
            out.push_str(">\n");
            out.push_str(value);
            out.push_str("\n\n");
        }
        out.push_str("$$$$\n");
        out
    }
}

/// Extract the property name between the first `<` (after the leading `>`)
/// and the matching `>`. A header without the closing `>` yields no name and
/// the property is skipped.
fn property_name(header: &str) -> Option<String> {
    let open = header[1..].find('<').map(|i| i + 1)?;
    let close = header[open + 1..].find('>').map(|i| i + open + 1)?;
    Some(header[open + 1..close].to_string())
}

/// Streams records from SD text.
pub struct SdfParser<R: BufRead> {
    reader: R,
    dataset_name: Option<String>,
    /// Next line number to be read; `None` disables line-number properties.
    line_number: Option<u64>,
    /// Next record number; `None` disables record-number properties.
    record_number: Option<u64>,
    done: bool,
}

impl<R: BufRead> SdfParser<R> {
    /// A parser counting lines from 1 and records from 0.
    pub fn new(reader: R, dataset_name: Option<&str>) -> Self {
        Self::with_numbering(reader, dataset_name, Some(1), Some(0))
    }

    /// A parser with explicit numbering starts; `None` disables the
    /// respective synthetic property.
    pub fn with_numbering(
        reader: R,
        dataset_name: Option<&str>,
        line_number_start: Option<u64>,
        record_number_start: Option<u64>,
    ) -> Self {
        SdfParser {
            reader,
            dataset_name: dataset_name.map(str::to_string),
            line_number: line_number_start,
            record_number: record_number_start,
            done: false,
        }
    }

    /// Read the next record. Returns `Ok(None)` at end of stream; a trailing
    /// region without a `$$$$` terminator is dropped. IO errors propagate.
    pub fn next_record(&mut self) -> Result<Option<SdfRecord>> {
        if self.done {
            return Ok(None);
        }

        let start_line = self.line_number;
        let mut buffer = String::new();
        let mut line = String::new();
        let mut terminated = false;

        loop {
            line.clear();
            let read = self.reader.read_line(&mut line)?;
            if read == 0 {
                self.done = true;
                break;
            }
            if let Some(n) = self.line_number.as_mut() {
                *n += 1;
            }
            buffer.push_str(&line);
            if line.trim_end().starts_with("$$$$") {
                terminated = true;
                break;
            }
        }

        if !terminated {
            return Ok(None);
        }

        let mut record = SdfRecord::parse(&buffer);
        if let Some(dataset) = &self.dataset_name {
            record.put(PROP_DATASET_NAME, dataset.clone());
        }
        if let Some(start) = start_line {
            record.put(PROP_LINE_NUMBER, start.to_string());
        }
        if let Some(n) = self.record_number.as_mut() {
            record.put(PROP_RECORD_NUMBER, n.to_string());
            *n += 1;
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETHANOL_BLOCK: &str = "\
ethanol
  chemdex

  3  2  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
M  END
";

    fn one_record(props: &str) -> String {
        format!("{ETHANOL_BLOCK}{props}$$$$\n")
    }

    #[test]
    fn record_structure_and_properties() {
        let text = one_record("> <ID>\nMOL-1\n\n> <logP>\n-0.31\n\n");
        let record = SdfRecord::parse(&text);
        assert!(record.structure().unwrap().contains("M  END"));
        assert_eq!(record.get("ID"), Some("MOL-1"));
        assert_eq!(record.get("logP"), Some("-0.31"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn multi_line_and_blank_line_values() {
        let text = one_record("> <notes>\nfirst line\n\nthird line\n\n");
        let record = SdfRecord::parse(&text);
        // The single blank line inside the value survives as an empty line
        assert_eq!(record.get("notes"), Some("first line\n\nthird line"));
    }

    #[test]
    fn header_without_closing_bracket_is_skipped() {
        let text = one_record("> <broken\nvalue\n\n> <good>\nok\n\n");
        let record = SdfRecord::parse(&text);
        assert_eq!(record.get("broken"), None);
        assert_eq!(record.get("good"), Some("ok"));
    }

    #[test]
    fn missing_mol_end_treats_region_as_structure() {
        let record = SdfRecord::parse("not a molblock\nat all\n$$$$\n");
        assert!(record.structure().unwrap().contains("not a molblock"));
        assert!(record.properties().is_empty());
    }

    #[test]
    fn crlf_input_is_normalized() {
        let text = one_record("> <ID>\nMOL-1\n\n").replace('\n', "\r\n");
        let record = SdfRecord::parse(&text);
        assert_eq!(record.get("ID"), Some("MOL-1"));
        assert!(!record.structure().unwrap().contains('\r'));
    }

    #[test]
    fn parser_streams_records_with_synthetic_properties() {
        let text = format!(
            "{}{}",
            one_record("> <ID>\nA\n\n"),
            one_record("> <ID>\nB\n\n")
        );
        let mut parser = SdfParser::new(text.as_bytes(), Some("demo.sdf"));

        let first = parser.next_record().unwrap().unwrap();
        assert_eq!(first.get("ID"), Some("A"));
        assert_eq!(first.get(PROP_DATASET_NAME), Some("demo.sdf"));
        assert_eq!(first.get(PROP_LINE_NUMBER), Some("1"));
        assert_eq!(first.get(PROP_RECORD_NUMBER), Some("0"));

        let second = parser.next_record().unwrap().unwrap();
        assert_eq!(second.get("ID"), Some("B"));
        assert_eq!(second.get(PROP_RECORD_NUMBER), Some("1"));
        let second_start: u64 = second.get(PROP_LINE_NUMBER).unwrap().parse().unwrap();
        assert!(second_start > 1);

        assert!(parser.next_record().unwrap().is_none());
    }

    #[test]
    fn trailing_partial_record_is_dropped() {
        let text = format!("{}ethanol\nno terminator", one_record(""));
        let mut parser = SdfParser::new(text.as_bytes(), None);
        assert!(parser.next_record().unwrap().is_some());
        assert!(parser.next_record().unwrap().is_none());
        assert!(parser.next_record().unwrap().is_none());
    }

    #[test]
    fn to_sdf_roundtrip_with_exclusions() {
        let text = one_record("> <ID>\nMOL-1\n\n> <secret>\nhidden\n\n");
        let record = SdfRecord::parse(&text);
        let saved = record.to_sdf(&["secret"]);
        assert!(saved.contains("> <ID>"));
        assert!(!saved.contains("secret"));
        assert!(saved.trim_end().ends_with("$$$$"));

        let reparsed = SdfRecord::parse(&saved);
        assert_eq!(reparsed.get("ID"), Some("MOL-1"));
        assert_eq!(
            reparsed.structure().map(str::trim_end),
            record.structure().map(str::trim_end)
        );
    }
}
