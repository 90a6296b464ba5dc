//! Line-based statement reader

use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::ExecutionError;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Yields one trimmed statement per non-blank input line
pub struct StatementReader<R> {
    reader: R,
    buffer: String,
    line: usize,
}

impl StatementReader<BufReader<File>> {
    /// Open a statement file for reading
    pub async fn open(path: &Path) -> Result<Self, ExecutionError> {
        let file = File::open(path)
            .await
            .map_err(|source| ExecutionError::InputNotFound {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> StatementReader<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            buffer: String::new(),
            line: 0,
        }
    }

    /// Number of lines consumed so far, blank ones included
    pub fn line(&self) -> usize {
        self.line
    }

    /// Next non-blank statement, or `None` at end of input
    pub async fn next_statement(&mut self) -> Result<Option<String>, ExecutionError> {
        loop {
            self.buffer.clear();
            let read = self
                .reader
                .read_line(&mut self.buffer)
                .await
                .map_err(|source| ExecutionError::InputRead {
                    line: self.line + 1,
                    source,
                })?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;

            let mut text = self.buffer.as_str();
            if self.line == 1 {
                text = text.trim_start_matches(BYTE_ORDER_MARK);
            }
            let statement = text.trim();
            if statement.is_empty() {
                tracing::debug!(line = self.line, "ignored empty line");
                continue;
            }
            return Ok(Some(statement.to_string()));
        }
    }
}
