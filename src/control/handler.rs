//! Action router
//!
//! Executes a parsed [`Route`] against the configuration and the process
//! delegate. Blocking delegate calls are moved off the async runtime so a
//! long restore never stalls other connections.

use crate::config::Config;
use crate::control::api::{
    ActionKind, ActionRequest, ApiError, BackupsBody, EngineStatus, EnginesBody, OkBody, Route,
};
use crate::control::response::ActionResult;
use crate::delegate::{DelegateError, ProcessDelegate};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Dispatches routes to the delegate and produces results
#[derive(Clone)]
pub struct ActionRouter {
    config: Arc<Config>,
    delegate: ProcessDelegate,
}

impl ActionRouter {
    /// Create a new router
    pub fn new(config: Arc<Config>, delegate: ProcessDelegate) -> Self {
        Self { config, delegate }
    }

    /// Configuration the router validates against
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle a route
    pub async fn dispatch(&self, route: Route) -> ActionResult {
        match route {
            Route::Preflight => ActionResult::no_content(),
            Route::Index => ActionResult::index(),
            Route::NotFound => ActionResult::not_found(),
            Route::ListEngines => ActionResult::ok(&self.engine_statuses().await),
            Route::BadAction { engine } => {
                let err = if self.config.is_engine(&engine) {
                    ApiError::bad_action()
                } else {
                    ApiError::unknown_engine()
                };
                ActionResult::error(&err)
            }
            Route::Action(request) => match self.handle_action(request).await {
                Ok(result) => result,
                Err(e) => {
                    if e.status_code().is_server_error() {
                        error!("Action failed: {}", e);
                    } else {
                        debug!("Action rejected: {}", e);
                    }
                    ActionResult::error(&e)
                }
            },
        }
    }

    /// Snapshot every configured engine, probing them concurrently
    pub async fn engine_statuses(&self) -> EnginesBody {
        let probes: Vec<_> = self
            .config
            .engines
            .iter()
            .map(|name| {
                let delegate = self.delegate.clone();
                let name = name.clone();
                tokio::task::spawn_blocking(move || delegate.probe_status(&name))
            })
            .collect();

        let mut engines = Vec::with_capacity(probes.len());
        for (name, probe) in self.config.engines.iter().zip(probes) {
            let status = probe.await.unwrap_or_else(|e| {
                error!("Status probe task for '{}' failed: {}", name, e);
                crate::delegate::STATUS_UNKNOWN.to_string()
            });
            engines.push(EngineStatus {
                name: name.clone(),
                status,
                browse_url: self.config.browse_url(name).map(str::to_string),
                connect_command: self.config.connect_command(name).to_string(),
                has_backup: self.config.has_backup(name),
            });
        }

        EnginesBody { engines }
    }

    async fn handle_action(&self, request: ActionRequest) -> Result<ActionResult, ApiError> {
        let ActionRequest {
            engine,
            kind,
            backup_id,
        } = request;

        if kind.requires_backup() {
            if !self.config.has_backup(&engine) {
                return Err(ApiError::backup_not_enabled());
            }
        } else if !self.config.is_engine(&engine) {
            return Err(ApiError::unknown_engine());
        }

        match kind {
            ActionKind::Control(action) => {
                info!("{} engine '{}'", action, engine);
                self.blocking(move |d| d.control_unit(&engine, action)).await?;
                Ok(ActionResult::ok(&OkBody::new()))
            }
            ActionKind::BackupList => {
                // listing is a read; every failure is reported as 500
                let backups = self
                    .blocking(move |d| d.list_backups(&engine))
                    .await
                    .map_err(|e| match e {
                        ApiError::UpstreamCommand(msg) => ApiError::Internal(msg),
                        other => other,
                    })?;
                Ok(ActionResult::ok(&BackupsBody { backups }))
            }
            ActionKind::BackupTrigger => {
                info!("Triggering backup of engine '{}'", engine);
                self.blocking(move |d| d.trigger_backup(&engine)).await?;
                Ok(ActionResult::ok(&OkBody::new()))
            }
            ActionKind::BackupRestore => {
                let backup_id = backup_id.unwrap_or_default();
                if backup_id.is_empty() {
                    return Err(ApiError::backup_id_required());
                }
                // passed as a positional argument; must not parse as an option
                if backup_id.starts_with('-') {
                    return Err(ApiError::invalid_backup_id());
                }
                info!("Restoring engine '{}' from backup '{}'", engine, backup_id);
                self.blocking(move |d| d.restore_backup(&engine, &backup_id))
                    .await?;
                Ok(ActionResult::ok(&OkBody::new()))
            }
        }
    }

    /// Run a delegate call on the blocking pool
    async fn blocking<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&ProcessDelegate) -> Result<T, DelegateError> + Send + 'static,
    {
        let delegate = self.delegate.clone();
        tokio::task::spawn_blocking(move || call(&delegate))
            .await
            .map_err(|e| ApiError::Internal(format!("delegate task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::{CommandOutput, CommandRunner, Invocation, RunError};
    use axum::http::{Method, StatusCode};
    use std::sync::Mutex;

    /// Returns a fixed output and records invocations
    struct CannedRunner {
        output: Result<CommandOutput, String>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl CannedRunner {
        fn exit(code: i32, stdout: &str) -> Arc<Self> {
            Arc::new(Self {
                output: Ok(CommandOutput {
                    exit_code: Some(code),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(code: i32, stderr: &str) -> Arc<Self> {
            Arc::new(Self {
                output: Ok(CommandOutput {
                    exit_code: Some(code),
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                }),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn unrunnable() -> Arc<Self> {
            Arc::new(Self {
                output: Err("no such file".to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for CannedRunner {
        fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
            self.calls.lock().unwrap().push(invocation.clone());
            self.output.clone().map_err(|msg| RunError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, msg),
            })
        }
    }

    fn router(runner: Arc<CannedRunner>) -> ActionRouter {
        let mut config = Config::new(
            vec!["pg".to_string(), "redis".to_string()],
            vec!["pg".to_string()],
        );
        config
            .browse_urls
            .insert("pg".to_string(), "http://localhost:8081".to_string());
        let delegate = ProcessDelegate::new(runner, config.commands.clone());
        ActionRouter::new(Arc::new(config), delegate)
    }

    async fn dispatch(router: &ActionRouter, method: Method, path: &str, body: &[u8]) -> ActionResult {
        router.dispatch(Route::parse(&method, path, body)).await
    }

    #[tokio::test]
    async fn test_list_engines() {
        let runner = CannedRunner::exit(0, "active\n");
        let router = router(runner.clone());

        let body = router.engine_statuses().await;
        assert_eq!(body.engines.len(), 2);
        assert_eq!(body.engines[0].name, "pg");
        assert_eq!(body.engines[0].status, "active");
        assert_eq!(body.engines[0].browse_url.as_deref(), Some("http://localhost:8081"));
        assert!(body.engines[0].has_backup);
        assert_eq!(body.engines[1].name, "redis");
        assert!(!body.engines[1].has_backup);
        assert_eq!(body.engines[1].browse_url, None);
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_list_engines_with_broken_probe() {
        let router = router(CannedRunner::unrunnable());
        let body = router.engine_statuses().await;
        assert!(body.engines.iter().all(|e| e.status == "unknown"));
    }

    #[tokio::test]
    async fn test_start_unknown_engine() {
        let runner = CannedRunner::exit(0, "");
        let router = router(runner.clone());

        let result = dispatch(&router, Method::POST, "/api/engines/nosuch/start", b"").await;
        assert_eq!(result.status, StatusCode::NOT_FOUND);
        assert_eq!(result.json_body()["error"], "unknown engine");
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bad_action() {
        let router = router(CannedRunner::exit(0, ""));

        let result = dispatch(&router, Method::POST, "/api/engines/pg/nonaction", b"").await;
        assert_eq!(result.status, StatusCode::BAD_REQUEST);
        assert_eq!(result.json_body()["error"], "bad action");

        let result = dispatch(&router, Method::POST, "/api/engines/nosuch/nonaction", b"").await;
        assert_eq!(result.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_control_success_and_failure() {
        let ok = router(CannedRunner::exit(0, ""));
        let result = dispatch(&ok, Method::POST, "/api/engines/redis/stop", b"").await;
        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.json_body()["ok"], true);

        let failing = router(CannedRunner::exit(1, ""));
        let result = dispatch(&failing, Method::POST, "/api/engines/redis/stop", b"").await;
        assert_eq!(result.status, StatusCode::BAD_GATEWAY);

        let broken = router(CannedRunner::unrunnable());
        let result = dispatch(&broken, Method::POST, "/api/engines/redis/stop", b"").await;
        assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_backup_not_enabled() {
        let runner = CannedRunner::exit(0, "");
        let router = router(runner.clone());

        for (method, path) in [
            (Method::GET, "/api/engines/redis/backups"),
            (Method::POST, "/api/engines/redis/backup"),
            (Method::POST, "/api/engines/redis/restore"),
        ] {
            let result = dispatch(&router, method, path, br#"{"id":"x"}"#).await;
            assert_eq!(result.status, StatusCode::NOT_FOUND, "{}", path);
            assert_eq!(result.json_body()["error"], "backup not enabled");
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restore_requires_id() {
        let runner = CannedRunner::exit(0, "");
        let router = router(runner.clone());

        let bodies: [&[u8]; 4] = [b"{}", b"", b"garbage", br#"{"id":""}"#];
        for body in bodies {
            let result = dispatch(&router, Method::POST, "/api/engines/pg/restore", body).await;
            assert_eq!(result.status, StatusCode::BAD_REQUEST);
            assert_eq!(result.json_body()["error"], "backup id required");
        }
        assert!(runner.calls().is_empty());

        let result = dispatch(&router, Method::POST, "/api/engines/pg/restore", br#"{"id":"b7"}"#).await;
        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(runner.calls()[0].args, vec!["restore", "pg", "b7"]);
    }

    #[tokio::test]
    async fn test_list_backups() {
        let router = router(CannedRunner::exit(0, "b2\n\n b1 \n"));
        let result = dispatch(&router, Method::GET, "/api/engines/pg/backups/", b"").await;
        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.json_body()["backups"], serde_json::json!(["b2", "b1"]));
    }

    #[tokio::test]
    async fn test_restore_rejects_option_like_id() {
        let runner = CannedRunner::exit(0, "");
        let router = router(runner.clone());

        for body in [&br#"{"id":"--force"}"#[..], &br#"{"id":"-x"}"#[..]] {
            let result = dispatch(&router, Method::POST, "/api/engines/pg/restore", body).await;
            assert_eq!(result.status, StatusCode::BAD_REQUEST);
            assert_eq!(result.json_body()["error"], "invalid backup id");
        }
        assert!(runner.calls().is_empty());

        let result =
            dispatch(&router, Method::POST, "/api/engines/pg/restore", br#"{"id":"b-1"}"#).await;
        assert_eq!(result.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_backups_failure_reports_stderr() {
        let router = router(CannedRunner::failing(2, "repository locked\n"));
        let result = dispatch(&router, Method::GET, "/api/engines/pg/backups", b"").await;
        assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = result.json_body()["error"].as_str().unwrap_or_default().to_string();
        assert!(message.contains("repository locked"), "{}", message);
    }

    #[tokio::test]
    async fn test_list_backups_failure_is_internal() {
        let router = router(CannedRunner::exit(3, ""));
        let result = dispatch(&router, Method::GET, "/api/engines/pg/backups", b"").await;
        assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(result.json_body()["error"].is_string());
    }
}
