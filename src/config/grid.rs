use crate::error::{GridError, Result};
use crate::scale::{InterlineScale, Scale};
use crate::sheet::GridParams;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where to write the JSON report; printed to stdout when absent.
    pub json_out: Option<PathBuf>,
}

/// Sheet scale as measured by an upstream stage, in pixels.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ScaleConfig {
    pub interline: i32,
    pub line_thickness: f64,
    #[serde(default)]
    pub min_interline: Option<i32>,
    #[serde(default)]
    pub max_interline: Option<i32>,
    #[serde(default)]
    pub max_line_thickness: Option<i32>,
    /// Interline of cue staves, if the sheet has some.
    #[serde(default)]
    pub small_interline: Option<i32>,
}

impl ScaleConfig {
    pub fn to_scale(&self) -> Scale {
        let mut scale = Scale::new(self.interline, self.line_thickness).with_interline_range(
            self.min_interline.unwrap_or(self.interline),
            self.max_interline.unwrap_or(self.interline),
        );
        if let Some(max) = self.max_line_thickness {
            scale = scale.with_max_line_thickness(max);
        }
        if let Some(small) = self.small_interline {
            scale = scale.with_small_interline(InterlineScale::new(small));
        }
        scale
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    pub input_path: PathBuf,
    /// Gray level below which a pixel is foreground.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    pub scale: ScaleConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub grid_params: GridParams,
}

fn default_threshold() -> u8 {
    128
}

pub fn parse_config(contents: &str, origin: &Path) -> Result<RuntimeConfig> {
    serde_json::from_str(contents)
        .map_err(|e| GridError::Config(format!("Failed to parse config {}: {e}", origin.display())))
}

pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|e| GridError::Io(format!("Failed to read config {}: {e}", path.display())))?;
    parse_config(&contents, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let json = r#"{
            "input_path": "page.png",
            "scale": { "interline": 20, "line_thickness": 2.5, "min_interline": 18 },
            "grid_params": { "switches": { "force_separate_parts": true } }
        }"#;
        let config = parse_config(json, Path::new("demo.json")).unwrap();
        assert_eq!(config.threshold, 128);
        assert!(config.output.json_out.is_none());
        assert!(config.grid_params.switches.force_separate_parts);

        let scale = config.scale.to_scale();
        assert_eq!(scale.interline, InterlineScale::with_range(18, 20, 20));
        assert_eq!(scale.max_line_thickness, 4);
        assert!(!scale.is_multi_interline());
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let err = parse_config("{ \"scale\": 3 }", Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, GridError::Config(_)));
    }
}
