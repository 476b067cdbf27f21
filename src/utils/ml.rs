//! Opaque process boundary to the ML collaborator.
//!
//! The contract is request/response only: a script invoked with
//! positional arguments must print a single JSON value and exit 0.
//! Anything else is a hard failure of that call alone.

use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::error::AppError;

async fn spawn_script(config: &Config, script: &str, args: &[&str]) -> Result<Output, AppError> {
    let script_path = Path::new(&config.ml_scripts_dir).join(script);

    debug!(script, ?args, "invoking ML script");
    Command::new(&config.ml_python_bin)
        .arg(&script_path)
        .args(args)
        .output()
        .await
        .map_err(|e| AppError::internal(format!("Failed to spawn ML script {script}: {e}")))
}

/// Runs a prediction script and parses its stdout as JSON.
pub async fn run_script(
    config: &Config,
    script: &str,
    args: &[&str],
) -> Result<serde_json::Value, AppError> {
    let output = spawn_script(config, script, args).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::internal(format!(
            "ML script {script} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|_| AppError::internal(format!("ML script {script} produced unparsable output")))
}

/// Runs a training script, returning its combined diagnostic output.
/// Training scripts log rather than answer, so stdout is not parsed.
pub async fn run_training(config: &Config, script: &str) -> anyhow::Result<String> {
    let output = spawn_script(config, script, &[]).await?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        anyhow::bail!(
            "training script {script} exited with {}: {}",
            output.status,
            combined.trim()
        );
    }
    Ok(combined)
}

/// Anomaly detection for one calendar day; the date argument is required.
pub async fn daily_anomalies(config: &Config, date: &str) -> Result<serde_json::Value, AppError> {
    if date.is_empty() {
        return Err(AppError::validation(
            "A date is required for anomaly detection",
        ));
    }
    run_script(config, "detect_anomalies.py", &[date]).await
}

/// Behavioral clusters computed over all time.
pub async fn employee_clusters(config: &Config) -> Result<serde_json::Value, AppError> {
    run_script(config, "predict_clusters.py", &[]).await
}
