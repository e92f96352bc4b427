//! Command execution.

use colored::Colorize;
use flowchart_core::{
    is_reserved, CoreError, DefinitionFormat, Flow, FlowDefinition, MemoryAsset, Transitioned,
};
use std::path::Path;

/// Reads a definition file, picking the format from its extension.
pub fn load_definition(path: &Path) -> Result<FlowDefinition, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;
    let definition = FlowDefinition::parse(&text, DefinitionFormat::from_path(path))?;
    tracing::debug!(
        path = %path.display(),
        flow = %definition.name,
        stages = definition.stages.len(),
        transitions = definition.transitions.len(),
        "definition loaded"
    );
    Ok(definition)
}

/// Validates a definition and summarizes it.
pub fn check(path: &Path, strict: bool) -> Result<String, Box<dyn std::error::Error>> {
    let builder = load_definition(path)?.into_builder()?;
    let (flow, diagnostics) = if strict {
        (builder.seal_strict()?, Vec::new())
    } else {
        builder.seal_with_diagnostics()
    };

    let mut output = String::new();
    for diag in &diagnostics {
        output.push_str(&format!("{}: {}\n", "Warning".yellow(), diag));
    }

    output.push_str(&format!(
        "{} flow {} ({} stages, {} transitions, checksum: {})",
        if diagnostics.is_empty() {
            "Valid".green()
        } else {
            "Loaded".yellow()
        },
        flow.name().cyan(),
        flow.stages().count(),
        flow.transitions().count(),
        flow.checksum()?
    ));
    Ok(output)
}

/// Re-encodes a definition in canonical form.
pub fn export(path: &Path, format: DefinitionFormat) -> Result<String, Box<dyn std::error::Error>> {
    let flow = load_definition(path)?.build(false)?;
    Ok(flow.definition().render(format)?)
}

/// A `run` that stopped at a failing action.
#[derive(Debug)]
pub struct RunError {
    /// Transitions applied before the failure.
    pub transcript: Vec<String>,
    pub error: CoreError,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&describe_error(&self.error))
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Applies `actions` in order to `asset`.
///
/// Stops at the first failing action; the error carries the transcript of
/// every action that succeeded before it.
pub fn run(
    flow: &Flow,
    asset: &mut MemoryAsset,
    actions: &[String],
) -> Result<String, RunError> {
    let mut transcript = Vec::new();
    for action in actions {
        match flow.take_action(asset, action) {
            Ok(result) => transcript.push(format_transition(&result)),
            Err(error) => return Err(RunError { transcript, error }),
        }
    }
    transcript.push(format!("{} {}", "Final stage:".bold(), asset.stage().yellow()));
    Ok(transcript.join("\n"))
}

pub fn format_transition(result: &Transitioned) -> String {
    format!(
        "{} {} → {}",
        result.action.cyan(),
        result.from,
        result.to.yellow()
    )
}

/// Renders an engine error with its code.
pub fn describe_error(e: &CoreError) -> String {
    let mut text = format!("[{}] {}", e.error_code(), e);
    if let CoreError::Persist { .. } = e {
        text.push_str(" (the asset's stage is unchanged as far as the flow knows)");
    }
    text
}

/// Parses `name`, `name=true` or `name=false`.
pub fn parse_flag(s: &str) -> Result<(String, bool), String> {
    let (name, value) = match s.split_once('=') {
        Some((name, value)) => {
            let value = value
                .parse::<bool>()
                .map_err(|_| format!("invalid value '{}' for flag '{}'", value, name))?;
            (name, value)
        }
        None => (s, true),
    };
    check_flag_name(name)?;
    Ok((name.to_string(), value))
}

/// Rejects flag names a user may not set.
pub fn check_flag_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty flag name".to_string());
    }
    if is_reserved(name) {
        return Err(format!("flag name '{}' is reserved", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BUTTERFLY_YAML: &str = r#"
name: butterfly
stages:
  - name: egg
    actions: [hatch]
  - name: caterpillar
  - name: moth
transitions:
  - name: hatch
    outcomes:
      - when: {isBrown: true}
        to: moth
      - when: {isBrown: false}
        to: caterpillar
"#;

    fn definition_file(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_check_valid_file() {
        colored::control::set_override(false);
        let file = definition_file(BUTTERFLY_YAML, ".yaml");

        let output = check(file.path(), true).unwrap();
        assert!(output.starts_with("Valid flow butterfly (3 stages, 1 transitions"));
    }

    #[test]
    fn test_check_strict_rejects_overlap() {
        let overlapping = BUTTERFLY_YAML.replace("{isBrown: false}", "{}");
        let file = definition_file(&overlapping, ".yml");

        assert!(check(file.path(), true).is_err());
        let output = check(file.path(), false).unwrap();
        assert_eq!(output.matches("overlap").count(), 1);
    }

    #[test]
    fn test_export_json() {
        let file = definition_file(BUTTERFLY_YAML, ".yaml");
        let json = export(file.path(), DefinitionFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stages"][0]["name"], "caterpillar");
        assert_eq!(value["transitions"][0]["outcomes"][0]["when"], "isBrown:true");
    }

    #[test]
    fn test_run_stops_at_first_error() {
        let flow = FlowDefinition::parse(BUTTERFLY_YAML, DefinitionFormat::Yaml)
            .unwrap()
            .build(true)
            .unwrap();

        let mut asset = MemoryAsset::new("egg").with_flag("isBrown", true);
        let output = run(&flow, &mut asset, &["hatch".to_string()]).unwrap();
        assert!(output.contains("moth"));
        assert_eq!(asset.stage(), "moth");

        let mut asset = MemoryAsset::new("egg").with_flag("isBrown", false);
        let err = run(&flow, &mut asset, &["hatch".to_string(), "hatch".to_string()])
            .unwrap_err();
        assert!(err.to_string().starts_with("[ILLEGAL_ACTION]"));
        assert_eq!(err.transcript.len(), 1);
        assert!(err.transcript[0].contains("caterpillar"));
        assert!(matches!(err.error, CoreError::IllegalAction { .. }));
        assert_eq!(asset.stage(), "caterpillar");
    }

    #[test]
    fn test_demo_life_cycle() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/butterfly.yaml");
        let flow = load_definition(&path).unwrap().build(true).unwrap();
        let age = vec!["age".to_string(); 3];

        let mut moth = MemoryAsset::new("egg").with_flag("isBrown", true);
        run(&flow, &mut moth, &age).unwrap();
        assert_eq!(moth.stage(), "moth");

        let mut butterfly = MemoryAsset::new("egg").with_flag("isBrown", false);
        run(&flow, &mut butterfly, &age).unwrap();
        assert_eq!(butterfly.stage(), "butterfly");
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("isBrown").unwrap(), ("isBrown".to_string(), true));
        assert_eq!(parse_flag("isBrown=false").unwrap(), ("isBrown".to_string(), false));
        assert!(parse_flag("isBrown=maybe").is_err());
        assert!(parse_flag("=true").is_err());
        assert!(parse_flag("@origin.egg").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_definition(Path::new("/nonexistent/flow.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
