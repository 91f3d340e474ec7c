use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::forecast::{BuildingProfile, WastePredictor};

/// Runs an external model script and reads the prediction from its stdout.
pub struct CommandPredictor {
    command: String,
    script: String,
    timeout: Duration,
}

impl CommandPredictor {
    pub fn new(command: impl Into<String>, script: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            script: script.into(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    fn args(&self, profile: &BuildingProfile) -> Vec<String> {
        vec![
            self.script.clone(),
            "-u".to_string(),
            profile.usage.code().to_string(),
            profile.gfa.to_string(),
            profile.effective_volume().to_string(),
            profile.floors.to_string(),
        ]
    }
}

#[async_trait]
impl WastePredictor for CommandPredictor {
    fn name(&self) -> &str {
        "command"
    }

    async fn predict(&self, profile: &BuildingProfile) -> Result<f64> {
        let args = self.args(profile);
        debug!(command = %self.command, ?args, "running waste model");
        let child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| anyhow!("waste model timed out after {:?}", self.timeout))?
            .with_context(|| format!("failed spawning waste model: {}", self.command))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let preview: String = stderr.chars().take(180).collect();
            bail!("waste model exited with {}: {preview}", output.status);
        }
        parse_prediction(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Asks a model service over HTTP.
pub struct HttpPredictor {
    client: Client,
    url: String,
}

impl HttpPredictor {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        if url.trim().is_empty() {
            bail!("forecast.url must be set when forecast.mode = \"http\"");
        }
        let client = Client::builder()
            .user_agent("waste-ledger/0.1")
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .context("failed to build forecast HTTP client")?;
        Ok(Self {
            client,
            url: url.trim().to_string(),
        })
    }
}

#[async_trait]
impl WastePredictor for HttpPredictor {
    fn name(&self) -> &str {
        "http"
    }

    async fn predict(&self, profile: &BuildingProfile) -> Result<f64> {
        let body = json!({
            "usage": profile.usage.code(),
            "gfa": profile.gfa,
            "volume": profile.effective_volume(),
            "floor": profile.floors,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed POST request: {}", self.url))?
            .error_for_status()?;
        let value: Value = response
            .json()
            .await
            .with_context(|| format!("invalid JSON response: {}", self.url))?;
        prediction_from_json(&value)
    }
}

pub struct DisabledPredictor;

#[async_trait]
impl WastePredictor for DisabledPredictor {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn predict(&self, _profile: &BuildingProfile) -> Result<f64> {
        Err(anyhow!("waste forecasting is disabled in the configuration"))
    }
}

/// Reads the first number printed by the model. Keras prints scalars
/// either bare or wrapped in brackets.
pub fn parse_prediction(stdout: &str) -> Result<f64> {
    let token = stdout
        .split_whitespace()
        .map(|t| t.trim_matches(|c| c == '[' || c == ']'))
        .find(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("waste model printed nothing"))?;
    let value: f64 = token
        .parse()
        .with_context(|| format!("waste model printed a non-number: {token}"))?;
    if !value.is_finite() {
        bail!("waste model returned a non-finite value");
    }
    Ok(value)
}

pub fn prediction_from_json(value: &Value) -> Result<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("total_waste").and_then(Value::as_f64),
        _ => None,
    };
    number
        .filter(|n| n.is_finite())
        .ok_or_else(|| anyhow!("forecast service response has no total_waste"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::forecast::BuildingUsage;

    fn profile() -> BuildingProfile {
        BuildingProfile {
            usage: BuildingUsage::Office,
            gfa: 9526.0,
            volume: Some(33341.0),
            floors: 5.0,
        }
    }

    #[test]
    fn parses_bare_and_bracketed_output() {
        assert_eq!(parse_prediction("191.25\n").unwrap(), 191.25);
        assert_eq!(parse_prediction("[[12.5]]").unwrap(), 12.5);
        assert!(parse_prediction("").is_err());
        assert!(parse_prediction("Traceback (most recent call last)").is_err());
    }

    #[test]
    fn reads_number_or_total_waste_field() {
        assert_eq!(prediction_from_json(&json!(42.0)).unwrap(), 42.0);
        assert_eq!(
            prediction_from_json(&json!({ "total_waste": 7.5 })).unwrap(),
            7.5
        );
        assert!(prediction_from_json(&json!({ "other": 1 })).is_err());
    }

    #[test]
    fn passes_model_arguments_in_order() {
        let predictor = CommandPredictor::new("python3", "./utils/use_model.py", 5);
        assert_eq!(
            predictor.args(&profile()),
            ["./utils/use_model.py", "-u", "2", "9526", "33341", "5"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_predictor_reads_stdout() {
        // echo prints the script argument first, standing in for the model
        let predictor = CommandPredictor::new("echo", "191.5", 5);
        assert_eq!(predictor.predict(&profile()).await.unwrap(), 191.5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_predictor_reports_failed_exit() {
        let predictor = CommandPredictor::new("false", "ignored", 5);
        assert!(predictor.predict(&profile()).await.is_err());
    }

    #[test]
    fn disabled_predictor_always_fails() {
        let result = tokio_test::block_on(DisabledPredictor.predict(&profile()));
        assert!(result.is_err());
    }
}
