//! Metadata records as JSON Lines, and the outputs of a resolution pass.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use sysgroup_core::{
    GroupResolver, MetadataRecord, RecordError, ReportSummary, ResolutionReport,
};

/// One line of the input.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordLine {
    Record(MetadataRecord),
    /// Parsed as JSON but unusable (no archived path). The document is kept
    /// so annotated output stays line-for-line with the input.
    Malformed {
        line: usize,
        error: RecordError,
        document: serde_json::Value,
    },
}

/// Streams records one line at a time. Blank lines are skipped; lines that
/// are not JSON at all stop the stream with an error.
pub struct RecordReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    index_key: String,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R, index_key: &str) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            index_key: index_key.to_string(),
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<RecordLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e).context("Failed to read records")),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let value: serde_json::Value = match serde_json::from_str(&line) {
                Ok(value) => value,
                Err(e) => {
                    return Some(
                        Err(e).with_context(|| format!("Line {} is not valid JSON", self.line_no)),
                    )
                }
            };

            return Some(Ok(
                match MetadataRecord::try_from_json(value, &self.index_key) {
                    Ok(record) => RecordLine::Record(record),
                    Err((error, document)) => RecordLine::Malformed {
                        line: self.line_no,
                        error,
                        document,
                    },
                },
            ));
        }
    }
}

/// Open a JSON Lines file of metadata records.
pub fn read_records(path: &Path, index_key: &str) -> Result<RecordReader<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open records file: {}", path.display()))?;
    Ok(RecordReader::new(BufReader::new(file), index_key))
}

/// Read every line up front.
pub fn parse_records<R: BufRead>(reader: R, index_key: &str) -> Result<Vec<RecordLine>> {
    RecordReader::new(reader, index_key).collect()
}

/// Drives a resolver over a record stream and collects its outputs.
pub struct ResolutionPass<'a> {
    resolver: GroupResolver<'a>,
    annotate: Option<Box<dyn Write + 'a>>,
    keep_reports: bool,
    pub reports: Vec<ResolutionReport>,
    pub summary: ReportSummary,
}

#[derive(Serialize)]
struct ReportFile<'a> {
    summary: &'a ReportSummary,
    reports: &'a [ResolutionReport],
}

impl<'a> ResolutionPass<'a> {
    pub fn new(resolver: GroupResolver<'a>) -> Self {
        Self {
            resolver,
            annotate: None,
            keep_reports: false,
            reports: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    /// Write every record, with `system_groups` set when resolved, as JSON Lines.
    pub fn annotate_to(mut self, writer: impl Write + 'a) -> Self {
        self.annotate = Some(Box::new(writer));
        self
    }

    pub fn keep_reports(mut self, keep: bool) -> Self {
        self.keep_reports = keep;
        self
    }

    /// Resolve records one by one, calling `on_report` after each.
    pub fn run<I, F>(&mut self, lines: I, mut on_report: F) -> Result<()>
    where
        I: IntoIterator<Item = Result<RecordLine>>,
        F: FnMut(&ResolutionReport),
    {
        for line in lines {
            match line? {
                RecordLine::Record(record) => {
                    let report = self.resolver.resolve(&record);
                    self.record_outcome(&record, report, &mut on_report)?;
                }
                RecordLine::Malformed {
                    line,
                    error,
                    document,
                } => self.malformed(line, &error, &document)?,
            }
        }
        self.finish()
    }

    /// Load every record, resolve them on the rayon pool, then emit in input order.
    pub fn run_parallel<I, F>(&mut self, lines: I, mut on_report: F) -> Result<()>
    where
        I: IntoIterator<Item = Result<RecordLine>>,
        F: FnMut(&ResolutionReport),
    {
        let mut records = Vec::new();
        let mut rejected = Vec::new();
        for line in lines {
            match line? {
                RecordLine::Record(record) => records.push(record),
                RecordLine::Malformed {
                    line,
                    error,
                    document,
                } => rejected.push((records.len(), line, error, document)),
            }
        }

        let reports = self.resolver.resolve_all_parallel(&records);
        let mut rejected = rejected.into_iter().peekable();
        for (idx, (record, report)) in records.iter().zip(reports).enumerate() {
            while let Some((_, line, error, document)) = rejected.next_if(|r| r.0 == idx) {
                self.malformed(line, &error, &document)?;
            }
            self.record_outcome(record, report, &mut on_report)?;
        }
        for (_, line, error, document) in rejected {
            self.malformed(line, &error, &document)?;
        }
        self.finish()
    }

    fn record_outcome<F>(
        &mut self,
        record: &MetadataRecord,
        report: ResolutionReport,
        on_report: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&ResolutionReport),
    {
        on_report(&report);
        self.summary.add(&report);

        if self.annotate.is_some() {
            let doc = match report.system_groups() {
                Some(groups) => record.annotated(groups),
                None => record.to_json(),
            };
            self.write_annotated(&doc)?;
        }

        if self.keep_reports {
            self.reports.push(report);
        }
        Ok(())
    }

    fn malformed(
        &mut self,
        line: usize,
        error: &RecordError,
        document: &serde_json::Value,
    ) -> Result<()> {
        tracing::warn!(line, %error, "skipping malformed record");
        self.summary.add_malformed();
        self.write_annotated(document)
    }

    fn write_annotated(&mut self, doc: &serde_json::Value) -> Result<()> {
        if let Some(writer) = self.annotate.as_mut() {
            serde_json::to_writer(&mut *writer, doc).context("Failed to write annotated record")?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.annotate.as_mut() {
            writer.flush().context("Failed to flush annotated records")?;
        }
        tracing::info!(
            total = self.summary.total,
            resolved = self.summary.resolved(),
            no_group_found = self.summary.no_group_found,
            no_usable_query = self.summary.no_usable_query,
            malformed = self.summary.malformed,
            "resolution pass finished"
        );
        Ok(())
    }

    /// Write `{summary, reports}` as pretty JSON.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file: {}", path.display()))?;
        let report = ReportFile {
            summary: &self.summary,
            reports: &self.reports,
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &report)
            .with_context(|| format!("Failed to write report file: {}", path.display()))?;
        Ok(())
    }
}
