// Typed accessors for a representative slice of the Unit, Service and
// Socket interfaces. Anything else is reachable through `Unit::get`.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use super::Unit;
use crate::error::CoreError;
use crate::model::{Condition, IoBandwidth, Job, LoadError, timestamp_from_usec};

impl Unit {
    // ── org.freedesktop.systemd1.Unit ────────────────────────────────

    pub async fn id(&self) -> Result<String, CoreError> {
        self.get("Id").await
    }

    pub async fn names(&self) -> Result<Vec<String>, CoreError> {
        self.get("Names").await
    }

    pub async fn description(&self) -> Result<String, CoreError> {
        self.get("Description").await
    }

    pub async fn fragment_path(&self) -> Result<String, CoreError> {
        self.get("FragmentPath").await
    }

    pub async fn unit_file_state(&self) -> Result<String, CoreError> {
        self.get("UnitFileState").await
    }

    pub async fn requires(&self) -> Result<Vec<String>, CoreError> {
        self.get("Requires").await
    }

    pub async fn wants(&self) -> Result<Vec<String>, CoreError> {
        self.get("Wants").await
    }

    pub async fn wanted_by(&self) -> Result<Vec<String>, CoreError> {
        self.get("WantedBy").await
    }

    pub async fn can_start(&self) -> Result<bool, CoreError> {
        self.get("CanStart").await
    }

    pub async fn can_stop(&self) -> Result<bool, CoreError> {
        self.get("CanStop").await
    }

    pub async fn can_reload(&self) -> Result<bool, CoreError> {
        self.get("CanReload").await
    }

    pub async fn can_isolate(&self) -> Result<bool, CoreError> {
        self.get("CanIsolate").await
    }

    /// `None` when loading succeeded.
    pub async fn load_error(&self) -> Result<Option<LoadError>, CoreError> {
        let error: LoadError = self.get("LoadError").await?;
        Ok((!error.is_empty()).then_some(error))
    }

    /// The pending job, if any.
    pub async fn job(&self) -> Result<Option<Job>, CoreError> {
        let job: Job = self.get("Job").await?;
        Ok((!job.is_none()).then_some(job))
    }

    pub async fn conditions(&self) -> Result<Vec<Condition>, CoreError> {
        self.get("Conditions").await
    }

    pub async fn asserts(&self) -> Result<Vec<Condition>, CoreError> {
        self.get("Asserts").await
    }

    pub async fn state_change_timestamp(&self) -> Result<Option<DateTime<Utc>>, CoreError> {
        self.timestamp("StateChangeTimestamp").await
    }

    pub async fn active_enter_timestamp(&self) -> Result<Option<DateTime<Utc>>, CoreError> {
        self.timestamp("ActiveEnterTimestamp").await
    }

    pub async fn active_exit_timestamp(&self) -> Result<Option<DateTime<Utc>>, CoreError> {
        self.timestamp("ActiveExitTimestamp").await
    }

    pub async fn inactive_enter_timestamp(&self) -> Result<Option<DateTime<Utc>>, CoreError> {
        self.timestamp("InactiveEnterTimestamp").await
    }

    pub async fn inactive_exit_timestamp(&self) -> Result<Option<DateTime<Utc>>, CoreError> {
        self.timestamp("InactiveExitTimestamp").await
    }

    /// Invocation ID as 32 lowercase hex digits; empty when the unit has
    /// never run.
    pub async fn invocation_id(&self) -> Result<String, CoreError> {
        let bytes: Vec<u8> = self.get("InvocationID").await?;
        Ok(bytes.iter().fold(String::with_capacity(32), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        }))
    }

    async fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, CoreError> {
        let usec: u64 = self.get(key).await?;
        Ok(timestamp_from_usec(usec))
    }

    // ── org.freedesktop.systemd1.Service ─────────────────────────────

    /// Main process ID; 0 when not running.
    pub async fn main_pid(&self) -> Result<u32, CoreError> {
        self.get("MainPID").await
    }

    pub async fn restart_count(&self) -> Result<u32, CoreError> {
        self.get("NRestarts").await
    }

    pub async fn exec_main_status(&self) -> Result<i32, CoreError> {
        self.get("ExecMainStatus").await
    }

    // ── org.freedesktop.systemd1.Socket ──────────────────────────────

    pub async fn connection_count(&self) -> Result<u32, CoreError> {
        self.get("NConnections").await
    }

    pub async fn accepted_count(&self) -> Result<u32, CoreError> {
        self.get("NAccepted").await
    }

    // ── Resource control (service, socket, mount, swap, slice, scope) ─

    pub async fn io_read_bandwidth_max(&self) -> Result<Vec<IoBandwidth>, CoreError> {
        self.get("IOReadBandwidthMax").await
    }

    pub async fn io_write_bandwidth_max(&self) -> Result<Vec<IoBandwidth>, CoreError> {
        self.get("IOWriteBandwidthMax").await
    }
}
