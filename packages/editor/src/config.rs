use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::undo_stack::DEFAULT_HISTORY_CAPACITY;

pub const DEFAULT_CONFIG_NAME: &str = "sop.config.json";

/// A4 height in CSS pixels at 96 dpi (297mm)
pub const A4_HEIGHT_PX: f64 = 1122.5;

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Undo levels kept in history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Quiet period before a local draft is written
    #[serde(default = "default_draft_debounce_ms")]
    pub draft_debounce_ms: u64,

    /// Quiet period before page breaks are recomputed
    #[serde(default = "default_pagination_debounce_ms")]
    pub pagination_debounce_ms: u64,

    /// Pointer travel needed before a press turns into a drag
    #[serde(default = "default_drag_threshold_px")]
    pub drag_threshold_px: f64,

    /// Height of the before/after drop strips around each row
    #[serde(default = "default_drop_zone_edge_px")]
    pub drop_zone_edge_px: f64,

    #[serde(default)]
    pub page: PageGeometry,

    #[serde(default)]
    pub equalize: EqualizeConfig,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_draft_debounce_ms() -> u64 {
    1000
}

fn default_pagination_debounce_ms() -> u64 {
    120
}

fn default_drag_threshold_px() -> f64 {
    8.0
}

fn default_drop_zone_edge_px() -> f64 {
    16.0
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            draft_debounce_ms: default_draft_debounce_ms(),
            pagination_debounce_ms: default_pagination_debounce_ms(),
            drag_threshold_px: default_drag_threshold_px(),
            drop_zone_edge_px: default_drop_zone_edge_px(),
            page: PageGeometry::default(),
            equalize: EqualizeConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults when the file is absent
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(DEFAULT_CONFIG_NAME);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: EditorConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(EditorConfig::default())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Printed page geometry in CSS pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    #[serde(default = "default_page_height")]
    pub page_height_px: f64,

    #[serde(default = "default_margin")]
    pub margin_top_px: f64,

    #[serde(default = "default_margin")]
    pub margin_bottom_px: f64,

    /// Reserved on the first page only
    #[serde(default = "default_header_height")]
    pub header_height_px: f64,

    /// Footer variant name → reserved height
    #[serde(default = "default_footer_heights")]
    pub footer_heights_px: BTreeMap<String, f64>,

    /// Variant used by pages without an explicit entry
    #[serde(default = "default_footer_variant")]
    pub default_footer_variant: String,
}

fn default_page_height() -> f64 {
    A4_HEIGHT_PX
}

fn default_margin() -> f64 {
    38.0
}

fn default_header_height() -> f64 {
    96.0
}

fn default_footer_heights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("standard".to_string(), 48.0),
        ("minimal".to_string(), 24.0),
        ("signature".to_string(), 140.0),
    ])
}

fn default_footer_variant() -> String {
    "standard".to_string()
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_height_px: default_page_height(),
            margin_top_px: default_margin(),
            margin_bottom_px: default_margin(),
            header_height_px: default_header_height(),
            footer_heights_px: default_footer_heights(),
            default_footer_variant: default_footer_variant(),
        }
    }
}

impl PageGeometry {
    /// Geometry with a flat content budget and nothing reserved
    pub fn flat(budget_px: f64) -> Self {
        Self {
            page_height_px: budget_px,
            margin_top_px: 0.0,
            margin_bottom_px: 0.0,
            header_height_px: 0.0,
            footer_heights_px: BTreeMap::new(),
            default_footer_variant: default_footer_variant(),
        }
    }

    /// Configured footer height for a variant; unknown variants reserve nothing
    pub fn footer_height(&self, variant: &str) -> f64 {
        self.footer_heights_px.get(variant).copied().unwrap_or(0.0)
    }
}

/// Auto-equalize heuristic parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EqualizeConfig {
    pub max_iterations: u32,
    pub tolerance_px: f64,
    /// Fraction of the distance to the target applied per iteration
    pub damping: f64,
    pub min_ratio: f64,
    pub max_ratio: f64,
    /// Animation frames to wait before re-measuring
    pub frames_between: u32,
}

impl Default for EqualizeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 4,
            tolerance_px: 15.0,
            damping: 0.7,
            min_ratio: 0.33,
            max_ratio: 0.67,
            frames_between: 2,
        }
    }
}
