use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use orchestrator_scheduler_client_interface::JobSpec;

/// Name of the batch script written into the job's working directory.
pub const SCRIPT_FILE_NAME: &str = "job.sbatch";
/// Directory (relative to the working directory) jobs write their outputs into.
pub const OUTPUT_DIR_NAME: &str = "output";

/// Formats a wall time as `D-HH:MM:SS`, rounding partial seconds up.
pub fn format_wall_time(wall_time: Duration) -> String {
    let mut secs = wall_time.as_secs();
    if wall_time.subsec_nanos() > 0 {
        secs += 1;
    }
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{days}-{hours:02}:{minutes:02}:{seconds:02}")
}

/// Renders the sbatch script for a job.
///
/// Array sub-tasks write into `output/<index>`, plain jobs into `output`.
pub fn render_script(
    spec: &JobSpec,
    partition: Option<&str>,
    account: Option<&str>,
    extra_directives: &[String],
) -> String {
    let workdir = spec.working_dir.display();
    let mut script = String::from("#!/bin/bash\n");

    // Writing into a String cannot fail.
    let _ = writeln!(script, "#SBATCH --job-name={}", spec.name);
    let _ = writeln!(script, "#SBATCH --time={}", format_wall_time(spec.wall_time));
    let _ = writeln!(script, "#SBATCH --ntasks={}", spec.ranks.max(1));
    let _ = writeln!(script, "#SBATCH --chdir={workdir}");
    if let Some(partition) = partition {
        let _ = writeln!(script, "#SBATCH --partition={partition}");
    }
    if let Some(account) = account {
        let _ = writeln!(script, "#SBATCH --account={account}");
    }
    match spec.array_size {
        Some(size) if size > 0 => {
            let _ = writeln!(script, "#SBATCH --array=0-{}", size - 1);
            let _ = writeln!(script, "#SBATCH --output={workdir}/slurm-%A_%a.out");
        }
        _ => {
            let _ = writeln!(script, "#SBATCH --output={workdir}/slurm-%j.out");
        }
    }
    for directive in extra_directives {
        let _ = writeln!(script, "#SBATCH {directive}");
    }

    script.push('\n');
    let inputs = spec.inputs.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(":");
    let _ = writeln!(script, "export ORCHESTRATOR_INPUTS=\"{inputs}\"");
    let _ = writeln!(
        script,
        "export ORCHESTRATOR_OUTPUT_DIR=\"{workdir}/{OUTPUT_DIR_NAME}${{SLURM_ARRAY_TASK_ID:+/$SLURM_ARRAY_TASK_ID}}\""
    );
    script.push_str("mkdir -p \"$ORCHESTRATOR_OUTPUT_DIR\"\n\n");
    script.push_str(&spec.command);
    script.push('\n');
    script
}

/// Remote output directory of a job handle, given its working directory.
pub fn output_dir_for(working_dir: &Path, array_index: Option<u32>) -> std::path::PathBuf {
    let base = working_dir.join(OUTPUT_DIR_NAME);
    match array_index {
        Some(index) => base.join(index.to_string()),
        None => base,
    }
}
