use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::tracker::trigger_threshold_frames;
use crate::zplane::{
    ZPlaneMethod, ZPlaneThresholds, DEFAULT_DEPTH_DIFF_THRESHOLD, DEFAULT_KEYPOINT_CONFIDENCE,
    DEFAULT_RATIO_THRESHOLD,
};

const DEFAULT_FRAME_INTERVAL: u32 = 1;
const DEFAULT_INTERACTION_SECS: f64 = 2.0;
const DEFAULT_BENCHMARK_METHODS: [ZPlaneMethod; 2] = [ZPlaneMethod::Hybrid, ZPlaneMethod::Mde];

#[derive(Debug, Deserialize, Default)]
struct FilterConfigFile {
    method: Option<ZPlaneMethod>,
    frame_interval: Option<u32>,
    interaction_duration_secs: Option<f64>,
    z_plane: Option<ZPlaneConfigFile>,
    report: Option<ReportConfigFile>,
    benchmark: Option<BenchmarkConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ZPlaneConfigFile {
    keypoint_confidence: Option<f32>,
    ratio_threshold: Option<f32>,
    depth_diff_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ReportConfigFile {
    json_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct BenchmarkConfigFile {
    methods: Option<Vec<ZPlaneMethod>>,
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub method: ZPlaneMethod,
    /// Process every Nth source frame.
    pub frame_interval: u32,
    /// Sustained interaction needed before a trigger.
    pub interaction_duration_secs: f64,
    pub z_plane: ZPlaneThresholds,
    pub report: ReportSettings,
    pub benchmark_methods: Vec<ZPlaneMethod>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportSettings {
    /// Write the JSON report here at the end of a run.
    pub json_path: Option<PathBuf>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            method: ZPlaneMethod::default(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            interaction_duration_secs: DEFAULT_INTERACTION_SECS,
            z_plane: ZPlaneThresholds::default(),
            report: ReportSettings::default(),
            benchmark_methods: DEFAULT_BENCHMARK_METHODS.to_vec(),
        }
    }
}

impl FilterConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("INTERACTION_FILTER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FilterConfigFile) -> Self {
        let z_plane = file.z_plane.unwrap_or_default();
        Self {
            method: file.method.unwrap_or_default(),
            frame_interval: file.frame_interval.unwrap_or(DEFAULT_FRAME_INTERVAL),
            interaction_duration_secs: file
                .interaction_duration_secs
                .unwrap_or(DEFAULT_INTERACTION_SECS),
            z_plane: ZPlaneThresholds {
                keypoint_confidence: z_plane
                    .keypoint_confidence
                    .unwrap_or(DEFAULT_KEYPOINT_CONFIDENCE),
                ratio_threshold: z_plane.ratio_threshold.unwrap_or(DEFAULT_RATIO_THRESHOLD),
                depth_diff_threshold: z_plane
                    .depth_diff_threshold
                    .unwrap_or(DEFAULT_DEPTH_DIFF_THRESHOLD),
            },
            report: ReportSettings {
                json_path: file.report.and_then(|report| report.json_path),
            },
            benchmark_methods: file
                .benchmark
                .and_then(|bench| bench.methods)
                .unwrap_or_else(|| DEFAULT_BENCHMARK_METHODS.to_vec()),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(method) = std::env::var("IFILTER_METHOD") {
            if !method.trim().is_empty() {
                self.method = method.parse()?;
            }
        }
        if let Ok(interval) = std::env::var("IFILTER_FRAME_INTERVAL") {
            self.frame_interval = interval.trim().parse().map_err(|_| {
                anyhow!("IFILTER_FRAME_INTERVAL must be a positive integer (got '{}')", interval)
            })?;
        }
        if let Ok(secs) = std::env::var("IFILTER_INTERACTION_SECS") {
            self.interaction_duration_secs = secs.trim().parse().map_err(|_| {
                anyhow!("IFILTER_INTERACTION_SECS must be a number of seconds (got '{}')", secs)
            })?;
        }
        if let Ok(conf) = std::env::var("IFILTER_KEYPOINT_CONFIDENCE") {
            self.z_plane.keypoint_confidence = conf.trim().parse().map_err(|_| {
                anyhow!("IFILTER_KEYPOINT_CONFIDENCE must be a number (got '{}')", conf)
            })?;
        }
        if let Ok(path) = std::env::var("IFILTER_REPORT_PATH") {
            if !path.trim().is_empty() {
                self.report.json_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(methods) = std::env::var("IFILTER_BENCH_METHODS") {
            let parsed = split_csv(&methods)
                .iter()
                .map(|m| m.parse())
                .collect::<Result<Vec<ZPlaneMethod>>>()?;
            if !parsed.is_empty() {
                self.benchmark_methods = parsed;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_interval == 0 {
            return Err(anyhow!("frame_interval must be at least 1"));
        }
        if !self.interaction_duration_secs.is_finite() || self.interaction_duration_secs <= 0.0 {
            return Err(anyhow!(
                "interaction_duration_secs must be positive (got {})",
                self.interaction_duration_secs
            ));
        }
        let z = &self.z_plane;
        if !(0.0..=1.0).contains(&z.keypoint_confidence) {
            return Err(anyhow!(
                "keypoint_confidence must be within [0, 1] (got {})",
                z.keypoint_confidence
            ));
        }
        if !z.ratio_threshold.is_finite() || z.ratio_threshold <= 1.0 {
            return Err(anyhow!(
                "ratio_threshold must be greater than 1 (got {})",
                z.ratio_threshold
            ));
        }
        if !(z.depth_diff_threshold > 0.0 && z.depth_diff_threshold <= 1.0) {
            return Err(anyhow!(
                "depth_diff_threshold must be within (0, 1] (got {})",
                z.depth_diff_threshold
            ));
        }
        if self.benchmark_methods.is_empty() {
            return Err(anyhow!("benchmark methods must not be empty"));
        }
        Ok(())
    }

    /// Trigger threshold in processed frames for a source running at `fps`.
    pub fn trigger_threshold_frames(&self, fps: f64) -> u32 {
        trigger_threshold_frames(self.interaction_duration_secs, fps, self.frame_interval)
    }
}

fn read_config_file(path: &Path) -> Result<FilterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
