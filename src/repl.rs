// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL for inspecting and resolving modules.

use bundlehost_runtime::{Host, ModuleError, ModuleRegistry, Value};
use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};
use std::path::{Path, PathBuf};

/// REPL configuration constants
const HISTORY_FILE: &str = ".bundlehost_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    List,
    Lazy,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        let rest = input.strip_prefix('.')?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            "list" | "ls" => Some((ReplCommand::List, arg)),
            "lazy" => Some((ReplCommand::Lazy, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Load a bundle manifest"),
            (".list", "List registered modules"),
            (".lazy <id>", "Create a deferred handle and force it"),
        ]
    }
}

/// Completion and hints over registered module ids and REPL commands
struct ReplHelper {
    registry: ModuleRegistry,
}

impl ReplHelper {
    fn candidates(&self) -> Vec<String> {
        let mut words: Vec<String> = ReplCommand::all_commands()
            .iter()
            .map(|(cmd, _)| cmd.split_whitespace().next().unwrap_or(cmd).to_string())
            .collect();
        words.extend(self.registry.ids().into_iter().map(|id| id.to_string()));
        words
    }
}

/// Candidates extending `word`, paired with the missing suffix
fn complete_word(candidates: &[String], word: &str) -> Vec<Pair> {
    candidates
        .iter()
        .filter(|c| c.starts_with(word))
        .map(|c| Pair {
            display: c.clone(),
            replacement: c[word.len()..].to_string(),
        })
        .collect()
}

/// Start of the word under the cursor; ids may contain any non-space char
fn word_start(line: &str) -> usize {
    line.rfind(char::is_whitespace).map(|i| i + 1).unwrap_or(0)
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[word_start(&line[..pos])..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }
        Ok((pos, complete_word(&self.candidates(), word)))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = &line[word_start(line)..];
        if word.len() < 2 {
            return None;
        }

        complete_word(&self.candidates(), word)
            .into_iter()
            .find(|pair| !pair.replacement.is_empty())
            .map(|pair| pair.replacement.dimmed().to_string())
    }
}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

impl Helper for ReplHelper {}

/// The interactive REPL over a module host
pub struct Repl {
    host: &'static Host,
    editor: Editor<ReplHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(host: &'static Host) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ReplHelper {
            registry: host.registry().clone(),
        }));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bundlehost")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let _ = editor.load_history(&history_path);

        Ok(Self {
            host,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "bundlehost>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();

                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    if trimmed.starts_with('.') {
                        eprintln!(
                            "{}: unknown command '{}'",
                            "Error".red().bold(),
                            trimmed.cyan()
                        );
                        continue;
                    }

                    self.resolve_and_print(trimmed);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {} {}",
            "bundlehost".bright_cyan().bold(),
            "v".dimmed(),
            bundlehost_runtime::VERSION.bright_yellow()
        );
        println!(
            "  {} {} {}",
            self.host.registry().len().to_string().yellow(),
            "modules in".dimmed(),
            self.host.registry().namespace().cyan()
        );
        println!(
            "  {} {} {}",
            "Type a module id to resolve it, or".dimmed(),
            ".help".cyan(),
            "for commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => {
                println!(
                    "{}: {}",
                    "bundlehost".bright_cyan().bold(),
                    bundlehost_runtime::VERSION.yellow()
                );
            }
            ReplCommand::List => crate::print_modules(self.host),
            ReplCommand::Load => match arg {
                Some(path) => self.load_manifest(Path::new(path)),
                None => print_usage(".load", "requires a file path"),
            },
            ReplCommand::Lazy => match arg {
                Some(id) => self.force_lazy(id),
                None => print_usage(".lazy", "requires a module id"),
            },
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();

        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:16} {}", cmd.cyan(), desc.dimmed());
        }

        println!();
        println!("{}", "Keyboard Shortcuts:".white().bold());
        println!();
        println!("  {:16} {}", "Ctrl+C".yellow(), "Cancel current input".dimmed());
        println!("  {:16} {}", "Ctrl+D".yellow(), "Exit REPL".dimmed());
        println!("  {:16} {}", "Tab".yellow(), "Complete module ids".dimmed());
        println!();
    }

    fn load_manifest(&self, path: &Path) {
        match self.host.load_manifest(path) {
            Ok(loader) => println!(
                "{} '{}' ({} modules)",
                "Loaded".green(),
                loader.name(),
                loader.modules().len()
            ),
            Err(e) => print_error(&e),
        }
    }

    fn force_lazy(&self, id: &str) {
        let handle = self.host.dynamic_require(id);
        let ready = if handle.is_ready() {
            "registered".green().to_string()
        } else {
            "not registered".yellow().to_string()
        };
        println!("{} '{}' ({})", "Deferred".dimmed(), handle.id(), ready);
        match handle.resolve() {
            Ok(value) => println!("{}", format_value(&value)),
            Err(e) => print_error(&e),
        }
    }

    fn resolve_and_print(&self, id: &str) {
        match self.host.require(id) {
            Ok(value) => println!("{}", format_value(&value)),
            Err(e) => print_error(&e),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

fn print_usage(cmd: &str, what: &str) {
    eprintln!("{}: {} {}", "Error".red().bold(), cmd.cyan(), what.dimmed());
}

/// Format a value for display with coloring; object members one level deep.
/// Getter-backed exports are shown as `[Getter]` and not evaluated.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Object(exports) => {
            if exports.is_empty() {
                return "{}".to_string();
            }
            let members: Vec<String> = exports
                .keys()
                .into_iter()
                .map(|key| {
                    let shown = if exports.is_getter(&key) {
                        "[Getter]".cyan().to_string()
                    } else {
                        match exports.get(&key) {
                            Ok(Some(member)) => format_scalar(&member),
                            Ok(None) => format_scalar(&Value::Undefined),
                            Err(_) => "[Error]".red().to_string(),
                        }
                    };
                    format!("{}: {}", key, shown)
                })
                .collect();
            format!("{{ {} }}", members.join(", "))
        }
        other => format_scalar(other),
    }
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".blue().dimmed().to_string(),
        Value::Null => "null".blue().to_string(),
        Value::Boolean(b) => b.to_string().yellow().to_string(),
        Value::Number(n) => {
            if n.is_nan() {
                "NaN".yellow().to_string()
            } else if n.is_infinite() {
                if *n > 0.0 {
                    "Infinity".yellow().to_string()
                } else {
                    "-Infinity".yellow().to_string()
                }
            } else {
                n.to_string().yellow().to_string()
            }
        }
        Value::String(s) => format!("'{}'", s).green().to_string(),
        Value::Array(items) => format!("[Array({})]", items.len()).cyan().to_string(),
        Value::Object(_) => "[Object]".cyan().to_string(),
        Value::Function(func) => format!("[Function: {}]", func.name()).magenta().to_string(),
    }
}

/// Print a formatted error message
fn print_error(error: &ModuleError) {
    let error_str = error.to_string();

    if let Some(colon_pos) = error_str.find(':') {
        let (error_type, message) = error_str.split_at(colon_pos);
        eprintln!("{}{}", error_type.red().bold(), message);
    } else {
        eprintln!("{}", error_str.red());
    }
}
