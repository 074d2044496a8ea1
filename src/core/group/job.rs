// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Windows Job Object holding one spawned process tree.
//!
//! ```text
//! JobObject::new()     --> KILL_ON_JOB_CLOSE
//! assign_pid(pid)      --> OpenProcess + AssignProcessToJobObject
//! terminate(code)      --> TerminateJobObject (whole tree)
//! drop()               --> CloseHandle, kernel kills survivors
//! ```

use crate::error::JobError;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
    JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JobObjectExtendedLimitInformation,
    SetInformationJobObject, TerminateJobObject,
};
use windows::Win32::System::Threading::{OpenProcess, PROCESS_SET_QUOTA, PROCESS_TERMINATE};

fn windows_error_to_io(err: &windows::core::Error) -> std::io::Error {
    std::io::Error::from_raw_os_error(err.code().0)
}

/// A Job Object that kills its processes when closed.
#[derive(Debug)]
pub struct JobObject(HANDLE);

// SAFETY: HANDLE is a pointer-sized value and Job Objects may be used from
// any thread.
unsafe impl Send for JobObject {}
unsafe impl Sync for JobObject {}

impl JobObject {
    /// Creates a Job Object with `JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE`.
    ///
    /// # Errors
    ///
    /// Returns an error if the job could not be created or configured.
    pub fn new() -> Result<Self, JobError> {
        // SAFETY: CreateJobObjectW accepts None for both arguments; the handle
        // is closed on every error path.
        unsafe {
            let job = CreateJobObjectW(None, None)
                .map_err(|e| JobError::CreateFailed(windows_error_to_io(&e)))?;

            let mut info = JOBOBJECT_EXTENDED_LIMIT_INFORMATION::default();
            info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;

            let result = SetInformationJobObject(
                job,
                JobObjectExtendedLimitInformation,
                (&raw const info).cast(),
                u32::try_from(std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>())
                    .unwrap_or(u32::MAX),
            );

            if let Err(e) = result {
                let _ = CloseHandle(job);
                return Err(JobError::ConfigureFailed(windows_error_to_io(&e)));
            }

            Ok(Self(job))
        }
    }

    /// Assigns the process `pid` to this job.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be opened or assigned.
    pub fn assign_pid(&self, pid: u32) -> Result<(), JobError> {
        // SAFETY: OpenProcess fails cleanly for invalid PIDs; the process
        // handle is closed before returning.
        unsafe {
            let process =
                OpenProcess(PROCESS_SET_QUOTA | PROCESS_TERMINATE, false, pid).map_err(|e| {
                    JobError::OpenProcessFailed {
                        pid,
                        source: windows_error_to_io(&e),
                    }
                })?;

            let result = AssignProcessToJobObject(self.0, process);
            let _ = CloseHandle(process);

            result.map_err(|e| JobError::AssignFailed {
                pid,
                source: windows_error_to_io(&e),
            })
        }
    }

    /// Terminates every process in the job.
    ///
    /// # Errors
    ///
    /// Returns an error if termination failed.
    pub fn terminate(&self, exit_code: u32) -> Result<(), JobError> {
        // SAFETY: self.0 is a valid job handle for the lifetime of self.
        unsafe {
            TerminateJobObject(self.0, exit_code)
                .map_err(|e| JobError::TerminateFailed(windows_error_to_io(&e)))
        }
    }
}

impl Drop for JobObject {
    fn drop(&mut self) {
        // SAFETY: the handle is owned and still open.
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}
