//! Interactive REPL.

use crate::commands::{check_flag_name, describe_error, format_transition};
use colored::Colorize;
use flowchart_core::{Flow, MemoryAsset};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::path::Path;

const HELP_TEXT: &str = r#"
Available commands:
  help                    Show this help

  status                  Show the asset's current stage
  flags                   Show the asset's flags
  set <flag> <bool>       Set a flag on the asset

  actions                 List actions legal from the current stage
  try <action>            Resolve an action without applying it
  do <action>             Apply an action

  history                 Show applied actions
  reset                   Restore the asset to its starting state

  quit, exit              Exit the REPL
"#;

/// A flow and the asset being driven through it.
pub struct Session {
    flow: Flow,
    initial: MemoryAsset,
    asset: MemoryAsset,
}

impl Session {
    pub fn new(flow: Flow, asset: MemoryAsset) -> Self {
        Self {
            flow,
            initial: asset.clone(),
            asset,
        }
    }
}

pub fn run(mut session: Session, history_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "{} {}",
        "flowchart".bold().cyan(),
        session.flow.name().bold()
    );

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;
    let _ = rl.load_history(history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", format!("[{}]>", session.asset.stage()).cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&mut session, line) {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break,
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(history_path) {
        tracing::debug!("failed to save history to {}: {}", history_path.display(), e);
    }

    Ok(())
}

fn execute_repl_command(
    session: &mut Session,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(Some(String::new()));
    }

    let cmd = parts[0].to_lowercase();
    let args = &parts[1..];

    match cmd.as_str() {
        "help" | "?" => Ok(Some(HELP_TEXT.to_string())),

        "quit" | "exit" | "q" => Ok(None),

        "status" | "s" => Ok(Some(format!(
            "Stage: {}",
            session.asset.stage().yellow()
        ))),

        "flags" | "f" => {
            let flags = session.asset.flags();
            if flags.is_empty() {
                return Ok(Some("No flags".yellow().to_string()));
            }
            let lines: Vec<String> = flags
                .iter()
                .map(|(name, value)| format!("  {} = {}", name.cyan(), value))
                .collect();
            Ok(Some(lines.join("\n")))
        }

        "set" => {
            if args.len() != 2 {
                return Ok(Some("Usage: set <flag> <true|false>".to_string()));
            }
            check_flag_name(args[0])?;
            let value: bool = args[1].parse()?;
            session.asset.set_flag(args[0], value);
            Ok(Some(format!("{} = {}", args[0].cyan(), value)))
        }

        "actions" | "a" => {
            let actions = match session.flow.legal_actions(session.asset.stage()) {
                Ok(actions) => actions,
                Err(e) => return Ok(Some(describe_error(&e).red().to_string())),
            };
            let mut output = Vec::new();
            for action in actions {
                match session.flow.preview(&session.asset, action) {
                    Ok(result) => output.push(format!("  {}", format_transition(&result))),
                    Err(e) => output.push(format!(
                        "  {} {}",
                        action.cyan(),
                        format!("✗ {}", e.error_code()).dimmed()
                    )),
                }
            }
            if output.is_empty() {
                return Ok(Some("No legal actions".yellow().to_string()));
            }
            Ok(Some(output.join("\n")))
        }

        "try" | "t" => {
            if args.len() != 1 {
                return Ok(Some("Usage: try <action>".to_string()));
            }
            match session.flow.preview(&session.asset, args[0]) {
                Ok(result) => Ok(Some(format!("{} (not applied)", format_transition(&result)))),
                Err(e) => Ok(Some(describe_error(&e).red().to_string())),
            }
        }

        "do" | "d" => {
            if args.len() != 1 {
                return Ok(Some("Usage: do <action>".to_string()));
            }
            match session.flow.take_action(&mut session.asset, args[0]) {
                Ok(result) => Ok(Some(format_transition(&result))),
                Err(e) => Ok(Some(describe_error(&e).red().to_string())),
            }
        }

        "history" | "h" => {
            let history = session.asset.history();
            if history.is_empty() {
                return Ok(Some("No actions applied".yellow().to_string()));
            }
            let lines: Vec<String> = history
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    format!(
                        "[{}] {} {} → {}",
                        i.to_string().cyan(),
                        entry.action,
                        entry.from,
                        entry.to.yellow()
                    )
                })
                .collect();
            Ok(Some(lines.join("\n")))
        }

        "reset" => {
            session.asset = session.initial.clone();
            Ok(Some(format!(
                "{} to {}",
                "Reset".green(),
                session.asset.stage().yellow()
            )))
        }

        _ => Ok(Some(format!(
            "Unknown command: {}. Type 'help' for help.",
            cmd
        ))),
    }
}
