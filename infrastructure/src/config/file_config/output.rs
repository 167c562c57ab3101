//! Reply rendering settings (`[output]` section)

use council_domain::OutputFormat;
use serde::{Deserialize, Serialize};

/// How replies are printed
///
/// ```toml
/// [output]
/// format = "json"
/// color = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    pub format: Option<OutputFormat>,
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
        }
    }
}

impl FileOutputConfig {
    /// A format given on the command line wins over the file.
    pub fn resolve_format(&self, requested: Option<OutputFormat>) -> OutputFormat {
        requested.or(self.format).unwrap_or_default()
    }

    /// JSON replies are never colored.
    pub fn use_color(&self, format: OutputFormat) -> bool {
        self.color && format == OutputFormat::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_format_wins() {
        let config = FileOutputConfig {
            format: Some(OutputFormat::Json),
            ..Default::default()
        };
        assert_eq!(config.resolve_format(None), OutputFormat::Json);
        assert_eq!(
            config.resolve_format(Some(OutputFormat::Text)),
            OutputFormat::Text
        );
        assert_eq!(
            FileOutputConfig::default().resolve_format(None),
            OutputFormat::Text
        );
    }

    #[test]
    fn test_json_disables_color() {
        let config = FileOutputConfig::default();
        assert!(config.use_color(OutputFormat::Text));
        assert!(!config.use_color(OutputFormat::Json));

        let plain = FileOutputConfig {
            color: false,
            ..Default::default()
        };
        assert!(!plain.use_color(OutputFormat::Text));
    }
}
