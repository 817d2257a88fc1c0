//! Scripted in-memory runtime for unit tests.

use crate::exec::ExecSpec;
use crate::runtime::{
    ContainerDetails, ContainerRuntime, ExecHandle, ExecStatus, ExecStream, LogStream,
};
use chrono::{DateTime, Utc};
use dbcell_shared::errors::{DbcellError, DbcellResult};
use dbcell_shared::frame::{StreamKind, encode_frame};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncRead;

/// Runtime calls that can be made to block forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Call {
    ExecCreate,
    ExecAttach,
    ExecStart,
    ExecInspect,
    ContainerInspect,
    ContainerLogs,
}

#[derive(Default)]
pub(crate) struct FakeRuntime {
    stalled: Mutex<HashSet<Call>>,
    stream: Mutex<Option<ExecStream>>,
    exec_status: Mutex<Option<ExecStatus>>,
    logs: Mutex<Option<Result<Vec<u8>, String>>>,
    logs_since: Mutex<Option<DateTime<Utc>>>,
    create_error: Mutex<Option<String>>,
    attach_error: Mutex<Option<String>>,
    inspections: Mutex<VecDeque<DbcellResult<ContainerDetails>>>,
    inspected: Mutex<Vec<String>>,
    created: Mutex<Vec<Vec<String>>>,
    exec_inspect_calls: AtomicUsize,
    detached_starts: AtomicUsize,
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_output(&self, frames: &[(StreamKind, &[u8])]) {
        let bytes = frames
            .iter()
            .flat_map(|(kind, payload)| encode_frame(*kind, payload).to_vec())
            .collect();
        self.set_raw_output(bytes);
    }

    pub(crate) fn set_raw_output(&self, bytes: Vec<u8>) {
        self.set_stream(std::io::Cursor::new(bytes));
    }

    pub(crate) fn set_stream(&self, stream: impl AsyncRead + Send + 'static) {
        *self.stream.lock().unwrap() = Some(Box::pin(stream));
    }

    pub(crate) fn set_exit_code(&self, exit_code: i64) {
        self.set_exec_status(ExecStatus {
            running: false,
            exit_code: Some(exit_code),
        });
    }

    pub(crate) fn set_exec_status(&self, status: ExecStatus) {
        *self.exec_status.lock().unwrap() = Some(status);
    }

    pub(crate) fn set_logs(&self, logs: Result<Vec<u8>, String>) {
        *self.logs.lock().unwrap() = Some(logs);
    }

    pub(crate) fn last_logs_since(&self) -> Option<DateTime<Utc>> {
        *self.logs_since.lock().unwrap()
    }

    pub(crate) fn fail_exec_create(&self, reason: &str) {
        *self.create_error.lock().unwrap() = Some(reason.to_string());
    }

    pub(crate) fn fail_exec_attach(&self, reason: &str) {
        *self.attach_error.lock().unwrap() = Some(reason.to_string());
    }

    /// Queue inspection results. The last one repeats once the queue drains.
    pub(crate) fn push_inspection(&self, result: DbcellResult<ContainerDetails>) {
        self.inspections.lock().unwrap().push_back(result);
    }

    pub(crate) fn inspected(&self) -> Vec<String> {
        self.inspected.lock().unwrap().clone()
    }

    pub(crate) fn created_commands(&self) -> Vec<Vec<String>> {
        self.created.lock().unwrap().clone()
    }

    pub(crate) fn exec_inspect_calls(&self) -> usize {
        self.exec_inspect_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn detached_starts(&self) -> usize {
        self.detached_starts.load(Ordering::SeqCst)
    }

    /// Make `call` never return, like a hung daemon connection.
    pub(crate) fn stall(&self, call: Call) {
        self.stalled.lock().unwrap().insert(call);
    }

    async fn enter(&self, call: Call) {
        let stalled = self.stalled.lock().unwrap().contains(&call);
        if stalled {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn exec_create(&self, _container_id: &str, spec: &ExecSpec) -> DbcellResult<ExecHandle> {
        self.enter(Call::ExecCreate).await;
        if let Some(reason) = self.create_error.lock().unwrap().clone() {
            return Err(DbcellError::Runtime(reason));
        }
        let mut created = self.created.lock().unwrap();
        created.push(spec.command().to_vec());
        Ok(ExecHandle::new(format!("exec-{}", created.len()), spec.is_tty()))
    }

    async fn exec_attach(&self, _exec: &ExecHandle) -> DbcellResult<ExecStream> {
        self.enter(Call::ExecAttach).await;
        if let Some(reason) = self.attach_error.lock().unwrap().clone() {
            return Err(DbcellError::Runtime(reason));
        }
        Ok(self
            .stream
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Box::pin(std::io::Cursor::new(Vec::new()))))
    }

    async fn exec_start_detached(&self, _exec: &ExecHandle) -> DbcellResult<()> {
        self.enter(Call::ExecStart).await;
        self.detached_starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exec_inspect(&self, _exec: &ExecHandle) -> DbcellResult<ExecStatus> {
        self.enter(Call::ExecInspect).await;
        self.exec_inspect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.exec_status.lock().unwrap().unwrap_or(ExecStatus {
            running: false,
            exit_code: Some(0),
        }))
    }

    async fn container_inspect(&self, container: &str) -> DbcellResult<ContainerDetails> {
        self.enter(Call::ContainerInspect).await;
        self.inspected.lock().unwrap().push(container.to_string());
        let mut queue = self.inspections.lock().unwrap();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().map(|result| match result {
                Ok(details) => Ok(details.clone()),
                Err(e) => Err(DbcellError::Runtime(e.to_string())),
            })
        };
        next.unwrap_or_else(|| Err(DbcellError::Runtime(format!("no such container: {}", container))))
    }

    async fn container_logs(
        &self,
        _container_id: &str,
        since: DateTime<Utc>,
    ) -> DbcellResult<LogStream> {
        self.enter(Call::ContainerLogs).await;
        *self.logs_since.lock().unwrap() = Some(since);
        match self.logs.lock().unwrap().clone() {
            Some(Ok(bytes)) => Ok(Box::pin(std::io::Cursor::new(bytes))),
            Some(Err(reason)) => Err(DbcellError::Runtime(reason)),
            None => Ok(Box::pin(std::io::Cursor::new(Vec::new()))),
        }
    }
}
