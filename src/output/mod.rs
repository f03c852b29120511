mod console;

pub use console::render_console;

use crate::models::FileReport;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing reports
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Formatting error: {0}")]
    Format(#[from] fmt::Error),
}

/// Output handler for per-file reports
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            "console" => OutputFormat::Console,
            _ => OutputFormat::Console, // Default
        }
    }
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new(format: OutputFormat, file_path: Option<PathBuf>) -> Result<Self, OutputError> {
        let writer: Option<Box<dyn Write + Send>> = match (&format, file_path) {
            (OutputFormat::Console, _) => None,
            (_, Some(path)) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            (_, None) => None,
        };

        Ok(OutputHandler { format, writer })
    }

    /// Create a handler writing to an arbitrary sink
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        OutputHandler {
            format,
            writer: Some(writer),
        }
    }

    /// Write a file report
    pub fn write_report(&mut self, report: &FileReport) -> Result<(), OutputError> {
        let data = match &self.format {
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(report)?),
            OutputFormat::Jsonl => format!("{}\n", serde_json::to_string(report)?),
            OutputFormat::Console => {
                let mut text = String::new();
                render_console(&mut text, report)?;
                text
            }
        };
        self.write_output(&data)
    }

    fn write_output(&mut self, data: &str) -> Result<(), OutputError> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(data.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> Result<(), OutputError> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionCount;
    use std::sync::{Arc, Mutex};

    /// Shared in-memory sink so tests can inspect what the handler wrote
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn create_test_report() -> FileReport {
        FileReport {
            file_name: "flaws_cloudtrail00.json".to_string(),
            record_count: 12,
            created_buckets: vec!["evidence".to_string()],
            created_instances: vec!["i-0a1b2c".to_string()],
            suspicious_user_agents: vec!["aws-cli/1.16 linux/4.19.0-kali1-amd64".to_string()],
            top_actions: vec![
                ActionCount::new("ListBuckets", 7),
                ActionCount::new("CreateBucket", 2),
            ],
            root_actions: vec![ActionCount::new("CreateBucket", 2)],
            analyzed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("jsonl"), OutputFormat::Jsonl);
        assert_eq!(OutputFormat::from_str("console"), OutputFormat::Console);
        assert_eq!(OutputFormat::from_str("yaml"), OutputFormat::Console);
    }

    #[test]
    fn test_render_console_sections() {
        let mut text = String::new();
        render_console(&mut text, &create_test_report()).unwrap();

        assert!(text.contains("Analysis Results for file: flaws_cloudtrail00.json"));
        assert!(text.contains("Successfully created S3 buckets:\n\nevidence\n"));
        assert!(text.contains("Successfully created EC2 instances:\n\ni-0a1b2c\n"));
        assert!(text.contains("kali1-amd64"));
        assert!(text.contains("ListBuckets: 7 times\nCreateBucket: 2 times\n"));
        assert!(text.contains("Root account operations found:\n\nCreateBucket: 2 times\n"));

        let top = text.find("Top 5 API Actions").unwrap();
        let root = text.find("Root account operations").unwrap();
        assert!(top < root);
    }

    #[test]
    fn test_console_format_writes_rendered_report() {
        let sink = SharedBuffer::default();
        let mut handler = OutputHandler::with_writer(OutputFormat::Console, Box::new(sink.clone()));

        handler.write_report(&create_test_report()).unwrap();

        let mut expected = String::new();
        render_console(&mut expected, &create_test_report()).unwrap();
        assert_eq!(sink.contents(), expected);
    }

    #[test]
    fn test_jsonl_writes_one_line_per_report() {
        let sink = SharedBuffer::default();
        let mut handler = OutputHandler::with_writer(OutputFormat::Jsonl, Box::new(sink.clone()));

        handler.write_report(&create_test_report()).unwrap();
        handler.write_report(&create_test_report()).unwrap();

        let contents = sink.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: FileReport = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.top_actions[0], ActionCount::new("ListBuckets", 7));
    }

    #[test]
    fn test_json_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.json");

        let mut handler = OutputHandler::new(OutputFormat::Json, Some(path.clone())).unwrap();
        handler.write_report(&create_test_report()).unwrap();
        handler.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"file_name\": \"flaws_cloudtrail00.json\""));
        assert!(contents.contains("\"analyzed_at\""));
    }
}
