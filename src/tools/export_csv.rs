use crate::{error::Result,
            export::ProductCsvOptions,
            tools::{Tool, ToolContext, ToolResult}};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Parameters for the export_csv tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExportCsvParams {
    /// Directory the CSV files are written to (default: current directory)
    #[serde(default = "default_dir")]
    pub output_dir: String,

    /// Add the materials_care_json column to the product CSV
    #[serde(default)]
    pub include_materials_care: bool,

    /// Empty the store once the files are written (default: true)
    #[serde(default = "default_clear")]
    pub clear_after: bool,
}

fn default_dir() -> String {
    ".".to_string()
}

fn default_clear() -> bool {
    true
}

/// Write stored reviews and products to CSV
#[derive(Default)]
pub struct ExportCsvTool;

impl Tool for ExportCsvTool {
    type Params = ExportCsvParams;

    fn name(&self) -> &str {
        "export_csv"
    }

    fn description(&self) -> &str {
        "Export stored reviews and product details to timestamped CSV files"
    }

    fn execute_typed(&self, params: ExportCsvParams, context: &mut ToolContext) -> Result<ToolResult> {
        let options = ProductCsvOptions {
            include_materials_care: params.include_materials_care,
        };

        let summary = context.store.export(&params.output_dir, &options)?;
        if summary.is_empty() {
            return Ok(ToolResult::failure("No data to export"));
        }

        if params.clear_after {
            context.store.clear();
            context.store.save()?;
        }

        Ok(ToolResult::success_with(json!({
            "reviews_file": summary.reviews_path,
            "products_file": summary.products_path,
            "reviews": summary.reviews,
            "products": summary.products,
            "cleared": params.clear_after,
        })))
    }
}
