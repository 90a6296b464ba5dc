//! Scripted in-memory driver for executor tests
//!
//! Every call the executor makes is recorded as an [`Event`], and any step can
//! be told to fail through a [`Script`].

use async_trait::async_trait;
use sqlbatch_core::{
    Connection, ConnectionFactory, Result, SqlBatchError, StatementResult, Transaction,
};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(String),
    Begin,
    Batch(Vec<String>),
    Commit,
    Rollback,
    Close,
}

/// Which steps of a run should fail
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub fail_open: bool,
    pub fail_begin: bool,
    /// Fail the batch containing this statement
    pub fail_on_statement: Option<String>,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub fail_close: bool,
}

type EventLog = Arc<Mutex<Vec<Event>>>;

pub struct ScriptedFactory {
    script: Script,
    events: EventLog,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            events: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    /// Statements of every recorded batch, in execution order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Batch(statements) => Some(statements),
                _ => None,
            })
            .collect()
    }
}

fn record(events: &EventLog, event: Event) {
    events.lock().push(event);
}

#[async_trait]
impl ConnectionFactory for ScriptedFactory {
    async fn open(&self, url: &str) -> Result<Arc<dyn Connection>> {
        if self.script.fail_open {
            return Err(SqlBatchError::Connection("connection refused".into()));
        }
        record(&self.events, Event::Open(url.to_string()));
        Ok(Arc::new(ScriptedConnection {
            script: self.script.clone(),
            events: Arc::clone(&self.events),
        }))
    }
}

struct ScriptedConnection {
    script: Script,
    events: EventLog,
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn driver_name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, _sql: &str) -> Result<StatementResult> {
        Ok(StatementResult::new(1))
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        if self.script.fail_begin {
            return Err(SqlBatchError::Transaction("cannot disable autocommit".into()));
        }
        record(&self.events, Event::Begin);
        Ok(Box::new(ScriptedTransaction {
            script: self.script.clone(),
            events: Arc::clone(&self.events),
        }))
    }

    async fn close(&self) -> Result<()> {
        record(&self.events, Event::Close);
        if self.script.fail_close {
            return Err(SqlBatchError::Connection("socket already closed".into()));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.events.lock().contains(&Event::Close)
    }
}

struct ScriptedTransaction {
    script: Script,
    events: EventLog,
}

#[async_trait]
impl Transaction for ScriptedTransaction {
    async fn execute(&self, _sql: &str) -> Result<StatementResult> {
        Ok(StatementResult::new(1))
    }

    async fn execute_batch(&self, statements: &[String]) -> Result<Vec<StatementResult>> {
        record(&self.events, Event::Batch(statements.to_vec()));
        if let Some(failing) = &self.script.fail_on_statement {
            if let Some(index) = statements.iter().position(|s| s == failing) {
                return Err(SqlBatchError::Statement {
                    index,
                    sql: failing.clone(),
                    message: "constraint violation".into(),
                });
            }
        }
        Ok(vec![StatementResult::new(1); statements.len()])
    }

    async fn commit(&mut self) -> Result<()> {
        record(&self.events, Event::Commit);
        if self.script.fail_commit {
            return Err(SqlBatchError::Transaction("serialization failure".into()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        record(&self.events, Event::Rollback);
        if self.script.fail_rollback {
            return Err(SqlBatchError::Transaction("connection lost".into()));
        }
        Ok(())
    }
}

/// Write `lines` to a scratch statement file, one per line
pub fn input_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Write raw bytes to a scratch statement file
pub fn input_bytes(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_outlives_a_panicking_recorder() {
        let factory = ScriptedFactory::new(Script::default());
        let events = Arc::clone(&factory.events);

        let result: std::thread::Result<()> = std::thread::spawn(move || {
            let _guard = events.lock();
            panic!("recorder died while holding the log");
        })
        .join();

        assert!(result.is_err());
        record(&factory.events, Event::Begin);
        assert_eq!(factory.events(), vec![Event::Begin]);
    }
}
