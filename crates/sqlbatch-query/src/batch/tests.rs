//! Tests for batch execution

use super::*;
use crate::test_helpers::{Event, Script, ScriptedFactory, input_bytes, input_file};
use crate::{Converter, ExecutionError, ExecutionPhase, RollbackStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const URL: &str = "scripted://warehouse";

fn executor(factory: &Arc<ScriptedFactory>, batch_size: usize, input: &Path) -> BatchExecutor {
    let mut executor = BatchExecutor::new(factory.clone(), batch_size).unwrap();
    executor.set_url(URL);
    executor.set_input(input);
    executor
}

fn batch(statements: &[&str]) -> Event {
    Event::Batch(statements.iter().map(|s| s.to_string()).collect())
}

mod success_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_blank_line_skipped_and_remainder_flushed() {
        let factory = ScriptedFactory::new(Script::default());
        let input = input_file(&["INSERT A", "", "INSERT B", "INSERT C"]);

        let summary = executor(&factory, 2, input.path()).convert().await.unwrap();

        assert_eq!(
            factory.events(),
            vec![
                Event::Open(URL.to_string()),
                Event::Begin,
                batch(&["INSERT A", "INSERT B"]),
                batch(&["INSERT C"]),
                Event::Commit,
                Event::Close,
            ]
        );
        assert_eq!(summary.statements, 3);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.affected_rows, 3);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_empty_final_batch() {
        let factory = ScriptedFactory::new(Script::default());
        let input = input_file(&["INSERT 1", "INSERT 2", "INSERT 3", "INSERT 4"]);

        let summary = executor(&factory, 2, input.path()).convert().await.unwrap();

        assert_eq!(
            factory.batches(),
            vec![
                vec!["INSERT 1".to_string(), "INSERT 2".to_string()],
                vec!["INSERT 3".to_string(), "INSERT 4".to_string()],
            ]
        );
        assert_eq!(summary.batches, 2);
        assert_eq!(factory.count(&Event::Commit), 1);
    }

    #[tokio::test]
    async fn test_flush_count_follows_batch_size() {
        for total in 0..=7usize {
            for batch_size in 1..=3usize {
                let factory = ScriptedFactory::new(Script::default());
                let lines: Vec<String> = (1..=total).map(|i| format!("INSERT {}", i)).collect();
                let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
                let input = input_file(&refs);

                let summary = executor(&factory, batch_size, input.path())
                    .convert()
                    .await
                    .unwrap();

                let sizes: Vec<usize> = factory.batches().iter().map(Vec::len).collect();
                let mut expected = vec![batch_size; total / batch_size];
                if total % batch_size != 0 {
                    expected.push(total % batch_size);
                }
                assert_eq!(sizes, expected, "N={} B={}", total, batch_size);
                assert_eq!(summary.batches, expected.len());
                assert_eq!(summary.statements, total);
                assert_eq!(factory.count(&Event::Commit), 1);
                assert_eq!(factory.count(&Event::Close), 1);
                assert_eq!(factory.count(&Event::Rollback), 0);
            }
        }
    }

    #[tokio::test]
    async fn test_whitespace_lines_never_reach_a_batch() {
        let factory = ScriptedFactory::new(Script::default());
        let input = input_file(&["", "   ", "\t", "  INSERT A  ", "", "INSERT B", "    "]);

        let summary = executor(&factory, 1, input.path()).convert().await.unwrap();

        assert_eq!(
            factory.batches(),
            vec![vec!["INSERT A".to_string()], vec!["INSERT B".to_string()]]
        );
        assert_eq!(summary.statements, 2);
    }

    #[tokio::test]
    async fn test_executor_can_run_twice() {
        let factory = ScriptedFactory::new(Script::default());
        let input = input_file(&["INSERT A"]);
        let executor = executor(&factory, 10, input.path());

        executor.convert().await.unwrap();
        executor.convert().await.unwrap();

        assert_eq!(factory.count(&Event::Open(URL.to_string())), 2);
        assert_eq!(factory.count(&Event::Commit), 2);
        assert_eq!(factory.count(&Event::Close), 2);
    }

    #[tokio::test]
    async fn test_close_failure_does_not_fail_the_run() {
        let factory = ScriptedFactory::new(Script {
            fail_close: true,
            ..Script::default()
        });
        let input = input_file(&["INSERT A"]);

        let summary = executor(&factory, 5, input.path()).convert().await.unwrap();

        assert_eq!(summary.statements, 1);
        assert_eq!(factory.count(&Event::Commit), 1);
        assert_eq!(factory.count(&Event::Close), 1);
    }
}

mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_missing_input_rolls_back_and_closes() {
        let factory = ScriptedFactory::new(Script::default());
        let dir = tempfile::tempdir().unwrap();

        let failure = executor(&factory, 2, &dir.path().join("missing.sql"))
            .convert()
            .await
            .unwrap_err();

        assert_eq!(failure.phase(), ExecutionPhase::Read);
        assert!(matches!(failure.error, ExecutionError::InputNotFound { .. }));
        assert_eq!(failure.rollback, RollbackStatus::RolledBack);
        assert_eq!(
            factory.events(),
            vec![
                Event::Open(URL.to_string()),
                Event::Begin,
                Event::Rollback,
                Event::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_unreadable_line_rolls_back_applied_batches() {
        let factory = ScriptedFactory::new(Script::default());
        let input = input_bytes(b"INSERT A\nINSERT B\n\xff\xfe\nINSERT C\n");

        let failure = executor(&factory, 1, input.path())
            .convert()
            .await
            .unwrap_err();

        assert_eq!(failure.phase(), ExecutionPhase::Read);
        assert!(matches!(
            failure.error,
            ExecutionError::InputRead { line: 3, .. }
        ));
        assert_eq!(failure.rollback, RollbackStatus::RolledBack);
        assert_eq!(
            factory.events(),
            vec![
                Event::Open(URL.to_string()),
                Event::Begin,
                batch(&["INSERT A"]),
                batch(&["INSERT B"]),
                Event::Rollback,
                Event::Close,
            ]
        );
        assert_eq!(factory.count(&Event::Commit), 0);
    }

    #[tokio::test]
    async fn test_statement_failure_stops_later_batches() {
        let factory = ScriptedFactory::new(Script {
            fail_on_statement: Some("INSERT B".into()),
            ..Script::default()
        });
        let input = input_file(&["INSERT A", "INSERT B", "INSERT C", "INSERT D", "INSERT E"]);

        let failure = executor(&factory, 2, input.path())
            .convert()
            .await
            .unwrap_err();

        assert_eq!(failure.phase(), ExecutionPhase::Execute);
        assert_eq!(failure.rollback, RollbackStatus::RolledBack);
        assert!(matches!(
            failure.error,
            ExecutionError::StatementExecution { batch: 1, .. }
        ));
        assert_eq!(
            factory.events(),
            vec![
                Event::Open(URL.to_string()),
                Event::Begin,
                batch(&["INSERT A", "INSERT B"]),
                Event::Rollback,
                Event::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_in_final_partial_batch() {
        let factory = ScriptedFactory::new(Script {
            fail_on_statement: Some("INSERT E".into()),
            ..Script::default()
        });
        let input = input_file(&["INSERT A", "INSERT B", "INSERT C", "INSERT D", "INSERT E"]);

        let failure = executor(&factory, 2, input.path())
            .convert()
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            ExecutionError::StatementExecution { batch: 3, .. }
        ));
        assert_eq!(factory.batches().len(), 3);
        assert_eq!(factory.count(&Event::Commit), 0);
        assert_eq!(factory.count(&Event::Rollback), 1);
    }

    #[tokio::test]
    async fn test_rollback_failure_is_reported_and_connection_closed() {
        let factory = ScriptedFactory::new(Script {
            fail_on_statement: Some("INSERT A".into()),
            fail_rollback: true,
            ..Script::default()
        });
        let input = input_file(&["INSERT A"]);

        let failure = executor(&factory, 2, input.path())
            .convert()
            .await
            .unwrap_err();

        assert_eq!(failure.phase(), ExecutionPhase::Execute);
        assert_eq!(
            failure.rollback,
            RollbackStatus::Failed("Transaction error: connection lost".into())
        );
        assert!(failure.rollback_failed());
        assert_eq!(factory.count(&Event::Rollback), 1);
        assert_eq!(factory.count(&Event::Close), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_has_nothing_to_close() {
        let factory = ScriptedFactory::new(Script {
            fail_open: true,
            ..Script::default()
        });
        let input = input_file(&["INSERT A"]);

        let failure = executor(&factory, 2, input.path())
            .convert()
            .await
            .unwrap_err();

        assert_eq!(failure.phase(), ExecutionPhase::Connect);
        assert!(matches!(failure.error, ExecutionError::Connection(_)));
        assert_eq!(failure.rollback, RollbackStatus::NotAttempted);
        assert!(factory.events().is_empty());
    }

    #[tokio::test]
    async fn test_begin_failure_closes_without_rollback() {
        let factory = ScriptedFactory::new(Script {
            fail_begin: true,
            ..Script::default()
        });
        let input = input_file(&["INSERT A"]);

        let failure = executor(&factory, 2, input.path())
            .convert()
            .await
            .unwrap_err();

        assert_eq!(failure.phase(), ExecutionPhase::Connect);
        assert!(matches!(failure.error, ExecutionError::Transaction(_)));
        assert_eq!(failure.rollback, RollbackStatus::NotAttempted);
        assert_eq!(
            factory.events(),
            vec![Event::Open(URL.to_string()), Event::Close]
        );
    }

    #[tokio::test]
    async fn test_commit_failure_rolls_back() {
        let factory = ScriptedFactory::new(Script {
            fail_commit: true,
            ..Script::default()
        });
        let input = input_file(&["INSERT A"]);

        let failure = executor(&factory, 2, input.path())
            .convert()
            .await
            .unwrap_err();

        assert_eq!(failure.phase(), ExecutionPhase::Commit);
        assert_eq!(failure.rollback, RollbackStatus::RolledBack);
        assert_eq!(
            factory.events(),
            vec![
                Event::Open(URL.to_string()),
                Event::Begin,
                batch(&["INSERT A"]),
                Event::Commit,
                Event::Rollback,
                Event::Close,
            ]
        );
    }
}

mod configuration_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let factory = ScriptedFactory::new(Script::default());

        assert!(matches!(
            BatchExecutor::new(factory, 0),
            Err(ExecutionError::InvalidBatchSize(0))
        ));
    }

    #[test]
    fn test_setters_store_configuration() {
        let factory = ScriptedFactory::new(Script::default());
        let executor = executor(&factory, DEFAULT_BATCH_SIZE, Path::new("/data/load.sql"));

        assert_eq!(executor.batch_size(), 1000);
        assert_eq!(executor.url(), Some(URL));
        assert_eq!(executor.input(), Some(Path::new("/data/load.sql")));
    }

    #[tokio::test]
    async fn test_missing_url_fails_before_connecting() {
        let factory = ScriptedFactory::new(Script::default());
        let mut executor = BatchExecutor::new(factory.clone(), 2).unwrap();
        executor.set_input(Path::new("/data/load.sql"));

        let failure = executor.convert().await.unwrap_err();

        assert_eq!(failure.phase(), ExecutionPhase::Configure);
        assert!(matches!(
            failure.error,
            ExecutionError::MissingConfiguration("connection url")
        ));
        assert!(factory.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_path_fails_before_connecting() {
        let factory = ScriptedFactory::new(Script::default());
        let mut executor = BatchExecutor::new(factory.clone(), 2).unwrap();
        executor.set_url(URL);

        let failure = executor.convert().await.unwrap_err();

        assert!(matches!(
            failure.error,
            ExecutionError::MissingConfiguration("input file")
        ));
        assert!(factory.events().is_empty());
    }
}

mod format_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "0 minutes, 0 seconds");
        assert_eq!(format_elapsed(Duration::from_millis(59_900)), "0 minutes, 59 seconds");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2 minutes, 5 seconds");
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "60 minutes, 0 seconds");
    }
}
