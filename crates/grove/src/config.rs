//
// config.rs
//
// Server settings from initializationOptions and didChangeConfiguration
//

use std::collections::HashSet;

use tower_lsp::lsp_types::DiagnosticSeverity;

use crate::diagnostics::lint::ALL_RULES;
use crate::diagnostics::scheduler::{SchedulerConfig, MAX_INTER_FILE_DELAY_MS};
use crate::diagnostics::DiagnosticsOptions;

/// External compiler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElmMakeConfig {
    /// Run the compiler on save
    pub enabled: bool,
    /// Compiler executable
    pub path: String,
}

impl Default for ElmMakeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "elm".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
    pub scheduler: SchedulerConfig,
    pub elm_make: ElmMakeConfig,
    pub diagnostics: DiagnosticsOptions,
}

impl ServerConfig {
    /// Read settings from a client payload. Keys may sit under `grove` or
    /// at the top level; missing keys keep their defaults.
    ///
    /// ```text
    /// {
    ///   "grove": {
    ///     "diagnostics": { "debounceMs": 300, "interFileDelayMs": 20 },
    ///     "elmMake": { "enabled": true, "path": "/usr/local/bin/elm" },
    ///     "lint": { "disabledRules": ["missing_type_annotation"], "severity": "information" }
    ///   }
    /// }
    /// ```
    pub fn from_settings(settings: &serde_json::Value) -> Self {
        let settings = settings.get("grove").unwrap_or(settings);
        let mut config = ServerConfig::default();

        if let Some(diagnostics) = settings.get("diagnostics") {
            if let Some(v) = diagnostics.get("debounceMs").and_then(|v| v.as_u64()) {
                config.scheduler.debounce_ms = v;
            }
            if let Some(v) = diagnostics.get("interFileDelayMs").and_then(|v| v.as_u64()) {
                if v > MAX_INTER_FILE_DELAY_MS {
                    log::warn!(
                        "diagnostics.interFileDelayMs {} exceeds {}, clamping",
                        v,
                        MAX_INTER_FILE_DELAY_MS
                    );
                }
                config.scheduler.inter_file_delay_ms = v.min(MAX_INTER_FILE_DELAY_MS);
            }
        }

        if let Some(elm_make) = settings.get("elmMake") {
            if let Some(v) = elm_make.get("enabled").and_then(|v| v.as_bool()) {
                config.elm_make.enabled = v;
            }
            if let Some(v) = elm_make.get("path").and_then(|v| v.as_str()) {
                if !v.is_empty() && !v.contains('\0') {
                    config.elm_make.path = v.to_string();
                }
            }
        }

        if let Some(lint) = settings.get("lint") {
            if let Some(rules) = lint.get("disabledRules").and_then(|v| v.as_array()) {
                config.diagnostics.disabled_rules = rules
                    .iter()
                    .filter_map(|r| r.as_str())
                    .filter(|r| {
                        let known = ALL_RULES.contains(r);
                        if !known {
                            log::warn!("Unknown lint rule in lint.disabledRules: {}", r);
                        }
                        known
                    })
                    .map(str::to_string)
                    .collect::<HashSet<_>>();
            }
            if let Some(sev) = lint.get("severity").and_then(|v| v.as_str()) {
                config.diagnostics.suggestion_severity = parse_severity(sev);
            }
        }

        log::info!("Configuration loaded from LSP settings:");
        log::info!("  debounce_ms: {}", config.scheduler.debounce_ms);
        log::info!(
            "  inter_file_delay_ms: {}",
            config.scheduler.inter_file_delay_ms
        );
        log::info!("  elm_make.enabled: {}", config.elm_make.enabled);
        log::info!("  elm_make.path: {}", config.elm_make.path);
        let mut disabled: Vec<&String> = config.diagnostics.disabled_rules.iter().collect();
        disabled.sort();
        log::info!("  lint.disabled_rules: {:?}", disabled);
        log::info!(
            "  lint.severity: {:?}",
            config.diagnostics.suggestion_severity
        );
        config
    }
}

fn parse_severity(s: &str) -> DiagnosticSeverity {
    match s.to_lowercase().as_str() {
        "warning" => DiagnosticSeverity::WARNING,
        "information" | "info" => DiagnosticSeverity::INFORMATION,
        "hint" => DiagnosticSeverity::HINT,
        other => {
            log::warn!("Unknown lint severity {:?}, using hint", other);
            DiagnosticSeverity::HINT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_settings(&json!({}));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.scheduler.debounce_ms, 200);
        assert_eq!(config.scheduler.inter_file_delay_ms, 50);
        assert!(config.elm_make.enabled);
        assert_eq!(config.elm_make.path, "elm");
        assert_eq!(
            config.diagnostics.suggestion_severity,
            DiagnosticSeverity::HINT
        );
    }

    #[test]
    fn test_nested_under_grove() {
        let config = ServerConfig::from_settings(&json!({
            "grove": {
                "diagnostics": { "debounceMs": 500, "interFileDelayMs": 10 },
                "elmMake": { "enabled": false, "path": "/opt/elm" },
                "lint": { "disabledRules": ["bool_case", "no_such_rule"], "severity": "warning" }
            }
        }));
        assert_eq!(config.scheduler.debounce_ms, 500);
        assert_eq!(config.scheduler.inter_file_delay_ms, 10);
        assert!(!config.elm_make.enabled);
        assert_eq!(config.elm_make.path, "/opt/elm");
        assert_eq!(config.diagnostics.disabled_rules.len(), 1);
        assert!(config.diagnostics.disabled_rules.contains("bool_case"));
        assert_eq!(
            config.diagnostics.suggestion_severity,
            DiagnosticSeverity::WARNING
        );
    }

    #[test]
    fn test_top_level_keys_and_clamp() {
        let config = ServerConfig::from_settings(&json!({
            "diagnostics": { "interFileDelayMs": 1000 },
            "lint": { "severity": "error" }
        }));
        assert_eq!(config.scheduler.inter_file_delay_ms, 200);
        assert_eq!(
            config.diagnostics.suggestion_severity,
            DiagnosticSeverity::HINT
        );
    }

    #[test]
    fn test_parse_severity() {
        assert_eq!(parse_severity("Information"), DiagnosticSeverity::INFORMATION);
        assert_eq!(parse_severity("info"), DiagnosticSeverity::INFORMATION);
        assert_eq!(parse_severity("hint"), DiagnosticSeverity::HINT);
    }
}
