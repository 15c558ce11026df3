use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::error::SlurmError;

/// Thin wrapper around the Slurm command line tools.
#[derive(Debug, Clone)]
pub struct SlurmCli {
    sbatch: PathBuf,
    sacct: PathBuf,
}

impl SlurmCli {
    pub fn new(sbatch: PathBuf, sacct: PathBuf) -> Self {
        Self { sbatch, sacct }
    }

    /// Submits a script with `sbatch --parsable` and returns its raw stdout.
    pub async fn sbatch(&self, script: &Path, working_dir: &Path) -> Result<String, SlurmError> {
        run(&self.sbatch, working_dir, ["--parsable".as_ref(), script.as_os_str()]).await
    }

    /// Queries accounting for one job (or array) with allocation-level records only.
    pub async fn sacct(&self, job_id: &str, fields: &str) -> Result<String, SlurmError> {
        run(&self.sacct, Path::new("."), ["-j", job_id, "-n", "-P", "-X", "-o", fields]).await
    }
}

async fn run<I, S>(program: &Path, working_dir: &Path, args: I) -> Result<String, SlurmError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| SlurmError::Spawn { program: program.to_path_buf(), source })?;

    if !output.status.success() {
        return Err(SlurmError::CommandFailed {
            program: program.to_path_buf(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    tracing::trace!(program = %program.display(), "Slurm command succeeded");
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Recursively copies `source` into `destination`, creating directories as needed.
pub async fn copy_dir_all(source: &Path, destination: &Path) -> Result<u64, SlurmError> {
    let mut copied = 0u64;
    let mut stack = vec![(source.to_path_buf(), destination.to_path_buf())];

    while let Some((from, to)) = stack.pop() {
        tokio::fs::create_dir_all(&to)
            .await
            .map_err(|e| SlurmError::file(format!("creating {}", to.display()), e))?;
        let mut entries = tokio::fs::read_dir(&from)
            .await
            .map_err(|e| SlurmError::file(format!("reading {}", from.display()), e))?;

        while let Some(entry) =
            entries.next_entry().await.map_err(|e| SlurmError::file(format!("reading {}", from.display()), e))?
        {
            let file_type =
                entry.file_type().await.map_err(|e| SlurmError::file("inspecting directory entry", e))?;
            let target = to.join(entry.file_name());
            if file_type.is_dir() {
                stack.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), &target)
                    .await
                    .map_err(|e| SlurmError::file(format!("copying to {}", target.display()), e))?;
                copied += 1;
            }
        }
    }
    Ok(copied)
}
