//! Copying the source file into engine storage.

use cg_core::{Error, JobId, Result, SourceFile};

use crate::loader::EngineHandle;

/// A source file written into engine storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedInput {
    /// Storage key the engine reads from.
    pub name: String,
    pub size_bytes: u64,
}

/// Storage key for a job's input, keeping the source extension so the
/// engine can probe the container.
pub fn input_key(job_id: JobId, file: &SourceFile) -> String {
    format!("{}-input.{}", job_id.short(), file.extension())
}

/// Read `file` fully and write it into engine storage under `name`,
/// replacing anything already stored there.
pub async fn stage_input(
    handle: &EngineHandle,
    file: &SourceFile,
    name: &str,
) -> Result<StagedInput> {
    if !handle.is_ready() {
        return Err(Error::precondition("engine is not ready"));
    }

    let bytes = file
        .read_bytes()
        .await
        .map_err(|e| Error::Staging(format!("failed to read {}: {e}", file.name())))?;

    handle
        .engine()
        .write_file(name, &bytes)
        .await
        .map_err(Error::staging)?;

    tracing::debug!("Staged {} as {name} ({} bytes)", file.name(), bytes.len());
    Ok(StagedInput {
        name: name.to_string(),
        size_bytes: bytes.len() as u64,
    })
}
