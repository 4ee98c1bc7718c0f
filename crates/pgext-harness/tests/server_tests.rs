//! Server lifecycle tests
//!
//! Tests the single engine instance including:
//! - Order enforcement of init/configure/start/stop/cleanup
//! - postgresql.conf contents for a closure
//! - Non-fatal tool failures
//! - Cleanup of the storage area and scratch directory

mod common;

use common::*;
use pgext_core::Error;
use pgext_harness::{ServerManager, ServerState};

#[cfg(test)]
mod server_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_cycle_in_order() {
        let root = TestRoot::new();
        let registry = registry_of(vec![RecordBuilder::contrib("cube").build()]);
        let runner = RecordingRunner::new();
        let log = root.terminal_log(&root.pair_dir("cube", None));

        let mut server = ServerManager::new(&root.config, &registry, &runner);
        assert_eq!(server.state(), ServerState::Absent);

        server.init_storage(&log).await.unwrap();
        assert_eq!(server.state(), ServerState::Initialized);
        server.write_config(&["cube"]).unwrap();
        assert_eq!(server.state(), ServerState::Configured);
        server.start(&log).await.unwrap();
        assert!(server.is_running());
        server.stop(&log).await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        server.cleanup(false).unwrap();
        assert_eq!(server.state(), ServerState::Absent);

        assert_eq!(
            runner.program_sequence(),
            vec!["initdb", "pg_ctl", "pg_ctl"]
        );
        let pg_ctl = runner.calls_to("pg_ctl");
        assert_eq!(pg_ctl[0].args.last().map(String::as_str), Some("start"));
        assert_eq!(pg_ctl[1].args.last().map(String::as_str), Some("stop"));
        assert!(pg_ctl[0].args.contains(&"-l".to_string()));
        assert!(pg_ctl[0]
            .args
            .contains(&root.config.server_log().display().to_string()));

        let capture = std::fs::read_to_string(log.path()).unwrap();
        assert!(capture.contains("initdb -D"));
    }

    #[tokio::test]
    async fn test_out_of_order_operations_fail() {
        let root = TestRoot::new();
        let registry = registry_of(vec![RecordBuilder::contrib("cube").build()]);
        let runner = RecordingRunner::new();
        let log = root.terminal_log(root.root());
        let mut server = ServerManager::new(&root.config, &registry, &runner);

        assert!(matches!(server.start(&log).await, Err(Error::Lifecycle { .. })));
        assert!(matches!(server.write_config(&["cube"]), Err(Error::Lifecycle { .. })));
        assert!(matches!(server.stop(&log).await, Err(Error::Lifecycle { .. })));

        server.init_storage(&log).await.unwrap();
        assert!(matches!(
            server.init_storage(&log).await,
            Err(Error::Lifecycle { .. })
        ));
        assert!(matches!(server.start(&log).await, Err(Error::Lifecycle { .. })));

        server.write_config(&["cube"]).unwrap();
        server.start(&log).await.unwrap();
        assert!(matches!(server.cleanup(true), Err(Error::Lifecycle { .. })));

        // Nothing but the valid calls reached the runner
        assert_eq!(runner.invocation_count("pg_ctl"), 1);
    }

    #[tokio::test]
    async fn test_config_for_closure() {
        let root = TestRoot::new().configure(|config| config.with_port(5433));
        let registry = registry_of(vec![
            RecordBuilder::contrib("cube").no_preload().build(),
            RecordBuilder::git("timescaledb", "https://example.org/timescaledb.git")
                .preload_first()
                .custom_config("timescaledb.telemetry_level = off")
                .build(),
            RecordBuilder::git("pg_ivm", "https://example.org/pg_ivm.git")
                .custom_config("pg_ivm.dir = '$PATH/data'")
                .build(),
            RecordBuilder::staged("plv8_lib").preload_name("plv8").build(),
        ]);
        let runner = RecordingRunner::new();
        let log = root.terminal_log(root.root());
        let mut server = ServerManager::new(&root.config, &registry, &runner);

        std::fs::create_dir_all(root.config.data_dir()).unwrap();
        std::fs::write(
            root.config.data_dir().join("postgresql.conf"),
            "# generated by initdb\n",
        )
        .unwrap();

        server.init_storage(&log).await.unwrap();
        server
            .write_config(&["cube", "pg_ivm", "timescaledb", "plv8_lib"])
            .unwrap();

        let conf =
            std::fs::read_to_string(root.config.data_dir().join("postgresql.conf")).unwrap();
        let expected = format!(
            "# generated by initdb\n\
             port = 5433\n\
             shared_preload_libraries = 'timescaledb,pg_ivm,plv8'\n\
             pg_ivm.dir = '{}/data'\n\
             timescaledb.telemetry_level = off\n",
            root.config.work_dir().join("pg_ivm").display()
        );
        assert_eq!(conf, expected);
    }

    #[tokio::test]
    async fn test_default_port_is_not_written() {
        let root = TestRoot::new();
        let registry = registry_of(vec![RecordBuilder::contrib("cube").build()]);
        let runner = RecordingRunner::new();
        let log = root.terminal_log(root.root());
        let mut server = ServerManager::new(&root.config, &registry, &runner);

        server.init_storage(&log).await.unwrap();
        server.write_config(&["cube"]).unwrap();

        let conf =
            std::fs::read_to_string(root.config.data_dir().join("postgresql.conf")).unwrap();
        assert_eq!(conf, "shared_preload_libraries = 'cube'\n");
    }

    #[tokio::test]
    async fn test_tool_failures_do_not_abort_the_cycle() {
        let root = TestRoot::new();
        let registry = registry_of(vec![RecordBuilder::contrib("cube").build()]);
        let runner = RecordingRunner::new();
        runner.mock_program("initdb", 1, "initdb: error: directory exists\n");
        runner.mock_missing("pg_ctl");
        let log = root.terminal_log(root.root());
        let mut server = ServerManager::new(&root.config, &registry, &runner);

        server.init_storage(&log).await.unwrap();
        server.write_config(&["cube"]).unwrap();
        server.start(&log).await.unwrap();
        assert!(server.is_running());
        server.stop(&log).await.unwrap();

        let capture = std::fs::read_to_string(log.path()).unwrap();
        assert!(capture.contains("directory exists"));
        assert!(capture.contains("Failed to spawn"));
    }

    #[tokio::test]
    async fn test_ensure_stopped_only_stops_running_server() {
        let root = TestRoot::new();
        let registry = registry_of(vec![RecordBuilder::contrib("cube").build()]);
        let runner = RecordingRunner::new();
        let log = root.terminal_log(root.root());
        let mut server = ServerManager::new(&root.config, &registry, &runner);

        server.ensure_stopped(&log).await;
        assert!(!runner.was_invoked("pg_ctl"));

        server.init_storage(&log).await.unwrap();
        server.write_config(&["cube"]).unwrap();
        server.start(&log).await.unwrap();
        server.ensure_stopped(&log).await;
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(runner.invocation_count("pg_ctl"), 2);
    }

    #[tokio::test]
    async fn test_cleanup_removes_storage_and_optionally_work_dir() {
        let root = TestRoot::new();
        let registry = registry_of(vec![RecordBuilder::contrib("cube").build()]);
        let runner = RecordingRunner::new();
        let log = root.terminal_log(&root.pair_dir("cube", None));

        let fetched = root.work_sources("pg_ivm");
        std::fs::write(root.config.server_log(), "LOG: ready\n").unwrap();

        let mut server = ServerManager::new(&root.config, &registry, &runner);
        server.init_storage(&log).await.unwrap();
        server.write_config(&["cube"]).unwrap();
        server.cleanup(false).unwrap();

        assert!(!root.config.data_dir().exists());
        assert!(!root.config.server_log().exists());
        assert!(fetched.exists());

        server.cleanup(true).unwrap();
        assert!(root.config.work_dir().is_dir());
        assert!(!fetched.exists());
    }
}
