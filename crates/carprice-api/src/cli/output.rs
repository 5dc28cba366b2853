//! Output formatting for the CLI
//!
//! Results render as JSON, YAML, or a colored human-readable table.

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};

use carprice_core::{
    schema::FieldDomain, EvaluationReport, FieldError, ModelInfo, PredictionResult,
    SchemaDescription, ValidatedInput, ValidationErrors,
};

use super::CliError;

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
    /// YAML format
    Yaml,
}

/// Human-readable rendering of a result
pub trait TableView {
    fn write_table(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Render `value` in `format` to `out`
pub fn render<T>(value: &T, format: OutputFormat, out: &mut dyn Write) -> Result<(), CliError>
where
    T: Serialize + TableView,
{
    let written = match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| CliError::Output(e.to_string()))?;
            writeln!(out, "{}", json)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(value).map_err(|e| CliError::Output(e.to_string()))?;
            write!(out, "{}", yaml)
        }
        OutputFormat::Table => value.write_table(out),
    };
    written
        .and_then(|_| out.flush())
        .map_err(|e| CliError::Output(e.to_string()))
}

fn header(out: &mut dyn Write, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", title.cyan().bold())?;
    writeln!(out, "{}", "=".repeat(60))
}

/// Outcome of a single CLI prediction
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PredictionOutput {
    Success {
        success: bool,
        predicted_price: f64,
        formatted_price: String,
        confidence: f64,
        input_features: ValidatedInput,
    },
    Rejected {
        success: bool,
        error_type: String,
        errors: Vec<FieldError>,
    },
}

impl PredictionOutput {
    pub fn success(result: PredictionResult) -> Self {
        PredictionOutput::Success {
            success: true,
            predicted_price: result.price,
            formatted_price: result.formatted_price,
            confidence: result.confidence,
            input_features: result.input,
        }
    }

    pub fn rejected(errors: &ValidationErrors) -> Self {
        PredictionOutput::Rejected {
            success: false,
            error_type: "ValidationError".to_string(),
            errors: errors.fields().to_vec(),
        }
    }
}

impl TableView for PredictionOutput {
    fn write_table(&self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            PredictionOutput::Success {
                formatted_price,
                confidence,
                input_features,
                ..
            } => {
                header(out, "Price Prediction")?;
                writeln!(out)?;
                writeln!(out, "{} {}", "+".green(), formatted_price.green().bold())?;
                writeln!(out, "  {} {:.1}%", "Confidence:".dimmed(), confidence * 100.0)?;
                writeln!(out)?;
                writeln!(out, "{}", "Input:".cyan().bold())?;
                for (field, value) in input_features.iter() {
                    writeln!(out, "  {:<14} {}", field, value)?;
                }
            }
            PredictionOutput::Rejected { errors, .. } => {
                header(out, "Price Prediction")?;
                writeln!(out)?;
                writeln!(out, "{} Input rejected ({} problem(s))", "x".red(), errors.len())?;
                writeln!(out)?;
                for error in errors {
                    writeln!(out, "  {} {}: {}", "x".red(), error.field.bold(), error.message)?;
                }
            }
        }
        Ok(())
    }
}

impl TableView for SchemaDescription {
    fn write_table(&self, out: &mut dyn Write) -> io::Result<()> {
        header(out, "Feature Schema")?;
        for (name, description) in &self.fields {
            writeln!(out)?;
            let required = if description.required { "required" } else { "optional" };
            writeln!(
                out,
                "{} {} {}",
                name.bold(),
                description.kind.cyan(),
                format!("({})", required).dimmed()
            )?;
            match &description.domain {
                FieldDomain::Categorical { valid_values } => {
                    writeln!(out, "  {} {}", "Values:".dimmed(), valid_values.join(", "))?;
                }
                FieldDomain::Numeric {
                    min_value,
                    max_value,
                } => {
                    let max = max_value.map_or_else(|| "unbounded".to_string(), |m| m.to_string());
                    writeln!(out, "  {} {} .. {}", "Range:".dimmed(), min_value, max)?;
                }
            }
        }
        Ok(())
    }
}

impl TableView for ModelInfo {
    fn write_table(&self, out: &mut dyn Write) -> io::Result<()> {
        header(out, "Model")?;
        writeln!(out)?;
        let rows = [
            ("Type", self.model_type.clone()),
            ("Estimator", self.estimator.clone()),
            ("Source", self.source_path.clone()),
            ("Loaded at", self.loaded_at.to_rfc3339()),
            (
                "Trained at",
                self.trained_at.clone().unwrap_or_else(|| "-".to_string()),
            ),
            ("Estimators", self.n_estimators.to_string()),
            ("Features", self.n_features.to_string()),
            ("SHA-256", self.sha256.clone()),
        ];
        for (label, value) in rows {
            writeln!(out, "  {:<12} {}", format!("{}:", label).dimmed(), value)?;
        }
        if let Some(metrics) = &self.metrics {
            writeln!(out)?;
            writeln!(out, "{}", "Training metrics:".cyan().bold())?;
            for (label, value) in [("R2", metrics.r2), ("RMSE", metrics.rmse), ("MAE", metrics.mae)] {
                if let Some(value) = value {
                    writeln!(out, "  {:<6} {:.4}", label, value)?;
                }
            }
        }
        Ok(())
    }
}

impl TableView for EvaluationReport {
    fn write_table(&self, out: &mut dyn Write) -> io::Result<()> {
        header(out, "Evaluation")?;
        writeln!(out)?;
        writeln!(out, "  {:<8} {}", "Samples:".dimmed(), self.samples)?;
        if self.skipped > 0 {
            writeln!(out, "  {:<8} {}", "Skipped:".dimmed(), self.skipped.to_string().yellow())?;
        }
        writeln!(out, "  {:<8} {:.4}", "R2:".dimmed(), self.r2)?;
        writeln!(out, "  {:<8} {:.2}", "RMSE:".dimmed(), self.rmse)?;
        writeln!(out, "  {:<8} {:.2}", "MAE:".dimmed(), self.mae)?;
        match self.mape {
            Some(mape) => writeln!(out, "  {:<8} {:.2}%", "MAPE:".dimmed(), mape)?,
            None => writeln!(out, "  {:<8} -", "MAPE:".dimmed())?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carprice_core::FeatureSchema;

    fn render_to_string<T: Serialize + TableView>(value: &T, format: OutputFormat) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        render(value, format, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_features_table() {
        let text = render_to_string(&FeatureSchema::vehicle().describe(), OutputFormat::Table);
        assert!(text.contains("Feature Schema"));
        assert!(text.contains("Values: Toyota, Honda"));
        assert!(text.contains("Range: 0 .. unbounded"));
    }

    #[test]
    fn test_features_json_and_yaml() {
        let json = render_to_string(&FeatureSchema::vehicle().describe(), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Year"]["max_value"], 2030);

        let yaml = render_to_string(&FeatureSchema::vehicle().describe(), OutputFormat::Yaml);
        assert!(yaml.contains("Brand:"));
    }

    #[test]
    fn test_rejected_output() {
        let errors = ValidationErrors::from(vec![FieldError::new("Year", "must be between 1900 and 2030")]);
        let output = PredictionOutput::rejected(&errors);

        let text = render_to_string(&output, OutputFormat::Table);
        assert!(text.contains("Input rejected (1 problem(s))"));
        assert!(text.contains("Year: must be between 1900 and 2030"));

        let json: serde_json::Value =
            serde_json::from_str(&render_to_string(&output, OutputFormat::Json)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"][0]["field"], "Year");
    }

    #[test]
    fn test_evaluation_table() {
        let report = EvaluationReport {
            samples: 10,
            skipped: 0,
            r2: 0.9,
            rmse: 1200.0,
            mae: 800.0,
            mape: None,
        };
        let text = render_to_string(&report, OutputFormat::Table);
        assert!(text.contains("0.9000"));
        assert!(!text.contains("Skipped"));
    }
}
