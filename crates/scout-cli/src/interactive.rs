//! Interactive research session with readline support.

use anyhow::Result;
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{Config as EditorConfig, Editor};

use scout_research::{ResearchOutcome, ResearchPipeline};

use crate::config::Config;

/// Session commands
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand {
    Quit,
    Help,
    History,
    Show(String),
    Export(String),
    Research(String), // Plain input is a company name
}

fn parse_command(input: &str) -> SessionCommand {
    let trimmed = input.trim();

    if !trimmed.starts_with('/') {
        return SessionCommand::Research(trimmed.to_string());
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts.get(1).map(|s| s.trim().to_string()).unwrap_or_default();

    match cmd.as_str() {
        "/quit" | "/exit" | "/q" => SessionCommand::Quit,
        "/history" | "/h" => SessionCommand::History,
        "/help" | "/?" => SessionCommand::Help,
        "/show" | "/s" => SessionCommand::Show(arg),
        "/export" | "/e" => SessionCommand::Export(arg),
        _ => {
            eprintln!("Unknown command: {}. Type /help for available commands.", cmd);
            SessionCommand::Research(String::new())
        }
    }
}

/// A history number (1-based) or a company name.
fn resolve_name(arg: &str, history: &[String]) -> Option<String> {
    let arg = arg.trim();
    if arg.is_empty() {
        return None;
    }

    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => history.get(n - 1).cloned(),
        _ => Some(arg.to_string()),
    }
}

fn print_help() {
    println!(
        r#"
Commands:
  <company name>        Research a company
  /history, /h          List previously searched companies
  /show <n|name>        Print a stored report
  /export <n|name>      Save a stored report as a Word document
  /help, /?             Show this help message
  /quit, /exit          Exit

Tips:
  - Press Ctrl+C to cancel the current line
  - Press Ctrl+D to exit
  - Up/Down arrows navigate input history
"#
    );
}

fn print_history(history: &[String]) {
    if history.is_empty() {
        println!("No companies researched yet.\n");
        return;
    }

    println!("Previously searched:");
    for (i, name) in history.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    println!();
}

/// Run the interactive session
pub async fn run(pipeline: &ResearchPipeline, config: &Config) -> Result<()> {
    let editor_config = EditorConfig::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)?
        .build();

    let history_path = get_history_path();
    let mut rl: Editor<(), FileHistory> = Editor::with_config(editor_config)?;

    if let Some(path) = &history_path {
        let _ = rl.load_history(path);
    }

    println!("Company research. Enter a company name, /help for commands, /quit to exit.\n");

    loop {
        match rl.readline("company> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);

                match parse_command(&line) {
                    SessionCommand::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    SessionCommand::Help => print_help(),
                    SessionCommand::History => match pipeline.history() {
                        Ok(history) => print_history(&history),
                        Err(e) => eprintln!("Error: {}\n", e),
                    },
                    SessionCommand::Show(arg) => {
                        let history = pipeline.history().unwrap_or_default();
                        let Some(name) = resolve_name(&arg, &history) else {
                            println!("Usage: /show <n|name>\n");
                            continue;
                        };
                        match pipeline.recall(&name) {
                            Ok(Some(report)) => println!("\n{}\n", report),
                            Ok(None) => println!("No stored report for '{}'.\n", name),
                            Err(e) => eprintln!("Error: {}\n", e),
                        }
                    }
                    SessionCommand::Export(arg) => {
                        let history = pipeline.history().unwrap_or_default();
                        let Some(name) = resolve_name(&arg, &history) else {
                            println!("Usage: /export <n|name>\n");
                            continue;
                        };
                        match crate::export_report(pipeline.store().as_ref(), config, &name, None, None) {
                            Ok(path) => println!("Saved {}\n", path.display()),
                            Err(e) => eprintln!("Error: {:#}\n", e),
                        }
                    }
                    SessionCommand::Research(name) => {
                        if name.is_empty() {
                            continue;
                        }

                        println!("Researching {}...\n", name);
                        match pipeline.run(&name).await {
                            Ok(ResearchOutcome::Report(report)) => println!("{}\n", report.text),
                            Ok(ResearchOutcome::Failed { message, .. }) => eprintln!("{}\n", message),
                            Err(e) => eprintln!("Error: {}\n", e),
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}

fn get_history_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scout").join("research_history"))
}
