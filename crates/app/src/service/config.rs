use std::env;

use anyhow::{anyhow, bail, Context, Result};

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub camera_uri: String,
    pub width: i32,
    pub height: i32,
    pub jpeg_quality: i32,
    pub poll_interval_ms: u64,
    pub http_port: u16,
    pub confidence_threshold: f32,
    pub verbose: bool,
}

/// Credentials and collaborator endpoints, read from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub detector_url: String,
    pub signer_url: String,
    pub signer_token: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
}

const USAGE: &str = "Usage: greenseed [--source <uri>] [--width <px>] [--height <px>] \
[--jpeg-quality <1-100>] [--interval-ms <ms>] [--port <port>] [--confidence <0-1>] \
[--verbose]\n\nPositional form is also supported: greenseed <camera-uri>";

impl ServiceConfig {
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut camera_uri: Option<String> = None;
        let mut width: Option<i32> = None;
        let mut height: Option<i32> = None;
        let mut jpeg_quality: Option<i32> = None;
        let mut poll_interval_ms: Option<u64> = None;
        let mut http_port: Option<u16> = None;
        let mut confidence_threshold: Option<f32> = None;
        let mut verbose = false;

        let mut idx = 1;
        while idx < args.len() {
            match args[idx].as_str() {
                "--source" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--source requires a value"))?
                        .clone();
                    camera_uri = Some(value);
                    idx += 1;
                }
                "--width" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--width requires a value"))?
                        .parse::<i32>()
                        .with_context(|| "--width must be an integer".to_string())?;
                    if value <= 0 {
                        bail!("--width must be a positive integer");
                    }
                    width = Some(value);
                    idx += 1;
                }
                "--height" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--height requires a value"))?
                        .parse::<i32>()
                        .with_context(|| "--height must be an integer".to_string())?;
                    if value <= 0 {
                        bail!("--height must be a positive integer");
                    }
                    height = Some(value);
                    idx += 1;
                }
                "--jpeg-quality" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--jpeg-quality requires a value"))?
                        .parse::<i32>()
                        .with_context(|| {
                            "--jpeg-quality must be an integer between 1 and 100".to_string()
                        })?;
                    if !(1..=100).contains(&value) {
                        bail!("--jpeg-quality must be an integer between 1 and 100");
                    }
                    jpeg_quality = Some(value);
                    idx += 1;
                }
                "--interval-ms" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--interval-ms requires a value"))?
                        .parse::<u64>()
                        .with_context(|| "--interval-ms must be a positive integer".to_string())?;
                    if value == 0 {
                        bail!("--interval-ms must be at least 1");
                    }
                    poll_interval_ms = Some(value);
                    idx += 1;
                }
                "--port" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--port requires a value"))?
                        .parse::<u16>()
                        .with_context(|| "--port must be a valid TCP port".to_string())?;
                    http_port = Some(value);
                    idx += 1;
                }
                "--confidence" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--confidence requires a value"))?
                        .parse::<f32>()
                        .with_context(|| "--confidence must be a number".to_string())?;
                    if !(0.0..=1.0).contains(&value) {
                        bail!("--confidence must be between 0 and 1");
                    }
                    confidence_threshold = Some(value);
                    idx += 1;
                }
                "--help" | "-h" => {
                    bail!(USAGE);
                }
                "--verbose" => {
                    verbose = true;
                    idx += 1;
                }
                arg if arg.starts_with('-') => {
                    bail!("Unrecognised flag: {arg}\n\n{USAGE}");
                }
                other => {
                    if camera_uri.is_some() {
                        bail!("Unexpected positional argument: {other}\n\n{USAGE}");
                    }
                    camera_uri = Some(other.to_string());
                    idx += 1;
                }
            }
        }

        let camera_uri = camera_uri.unwrap_or_else(|| "0".to_string());

        Ok(Self {
            camera_uri,
            width: width.unwrap_or(640),
            height: height.unwrap_or(480),
            jpeg_quality: jpeg_quality.unwrap_or(85),
            poll_interval_ms: poll_interval_ms.unwrap_or(100),
            http_port: http_port.unwrap_or(5000),
            confidence_threshold: confidence_threshold.unwrap_or(0.25),
            verbose,
        })
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            detector_url: require_env("DETECTOR_URL")?,
            signer_url: require_env("SIGNER_URL")?,
            signer_token: require_env("SIGNER_TOKEN")?,
            supabase_url: require_env("SUPABASE_URL")?,
            supabase_service_key: require_env("SUPABASE_SERVICE_ROLE_KEY")?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    let value =
        env::var(name).with_context(|| format!("missing environment variable {name}"))?;
    if value.trim().is_empty() {
        bail!("environment variable {name} is empty");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ServiceConfig> {
        let args: Vec<String> = std::iter::once("greenseed")
            .chain(args.iter().copied())
            .map(String::from)
            .collect();
        ServiceConfig::from_args(&args)
    }

    #[test]
    fn defaults_when_no_flags() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.camera_uri, "0");
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.jpeg_quality, 85);
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.http_port, 5000);
        assert!(!config.verbose);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--source",
            "rtsp://cam/stream",
            "--width",
            "1280",
            "--height",
            "720",
            "--port",
            "8080",
            "--confidence",
            "0.5",
            "--verbose",
        ])
        .unwrap();
        assert_eq!(config.camera_uri, "rtsp://cam/stream");
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.confidence_threshold, 0.5);
        assert!(config.verbose);
    }

    #[test]
    fn positional_source_is_accepted() {
        let config = parse(&["/dev/video2"]).unwrap();
        assert_eq!(config.camera_uri, "/dev/video2");
    }

    #[test]
    fn invalid_quality_is_rejected() {
        assert!(parse(&["--jpeg-quality", "0"]).is_err());
        assert!(parse(&["--jpeg-quality", "101"]).is_err());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse(&["--frames"]).is_err());
    }
}
