use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ContextError;
use crate::layout::{PAGE_HEIGHT, PAGE_WIDTH};

/// The configuration of the rendering pipeline. Every field has a default, so
/// a settings file only needs to name the values it wants to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Where the shared texts and the logo URL file live.
    pub data_directory: PathBuf,
    /// Where the downloaded and the prepared logo are kept.
    pub images_directory: PathBuf,
    /// Where the rendered invoices are written.
    pub output_directory: PathBuf,
    /// Overrides the URL read from the data directory when set.
    pub logo_url: Option<String>,
    /// The page size in millimeters.
    pub page_width: f64,
    pub page_height: f64,
    /// Prefixed to every monetary amount on the page.
    pub currency_symbol: String,
    /// Draws a twenty millimeter grid under the content, an aid for placing
    /// the invoice regions.
    pub draw_debug_grid: bool,
}

impl Default for RenderSettings {
    fn default() -> RenderSettings {
        RenderSettings {
            data_directory: PathBuf::from("data"),
            images_directory: PathBuf::from("images"),
            output_directory: PathBuf::from("invoices"),
            logo_url: None,
            page_width: PAGE_WIDTH,
            page_height: PAGE_HEIGHT,
            currency_symbol: "£".to_string(),
            draw_debug_grid: false,
        }
    }
}

impl RenderSettings {
    /// Loads the settings from a JSON file.
    pub fn from_path(path: &Path) -> Result<RenderSettings, ContextError> {
        let settings_content = std::fs::read_to_string(path).map_err(|error| {
            ContextError::with_error(
                format!("Failed to read the settings file {:?}", path),
                &error,
            )
        })?;
        serde_json::from_str(&settings_content).map_err(|error| {
            ContextError::with_error(
                format!("Failed to parse the settings file {:?}", path),
                &error,
            )
        })
    }
}
