//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Atlas CLI.

use crate::graph::{Plan, StepType};
use owo_colors::OwoColorize;
use std::io::{self, BufRead, Write};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Atlas banner
    pub fn banner(&self) {
        let art = [
            "    _  _____ _      _   ___ ",
            "   /_\\|_   _| |    /_\\ / __|",
            "  / _ \\ | | | |__ / _ \\\\__ \\",
            " /_/ \\_\\|_| |____/_/ \\_\\___/",
        ];
        if self.colored {
            println!();
            for (i, line) in art.iter().enumerate() {
                if i < 2 {
                    println!("   {}", line.bright_cyan().bold());
                } else {
                    println!("   {}", line.blue().bold());
                }
            }
            println!(
                "\n   {} {}\n",
                "Multi-agent deep research".bright_white().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!();
            for line in art {
                println!("   {}", line);
            }
            println!(
                "\n   Multi-agent deep research v{}\n",
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a directory creation message
    pub fn created_dir(&self, path: &str) {
        self.created("directory", path);
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print completion message with next steps
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print a research plan for review
    pub fn plan(&self, plan: &Plan) {
        self.header(&format!("Plan: {}", plan.title));
        if !plan.thought.is_empty() {
            self.kv("thought", &plan.thought);
        }
        for (i, step) in plan.steps.iter().enumerate() {
            let kind = match step.step_type {
                StepType::Research => "research",
                StepType::Processing => "processing",
                StepType::Unknown => "unknown",
            };
            if self.colored {
                println!(
                    "    {} {} {}",
                    format!("{}.", i + 1).dimmed(),
                    step.title.bright_white().bold(),
                    format!("[{}]", kind).cyan()
                );
            } else {
                println!("    {}. {} [{}]", i + 1, step.title, kind);
            }
            if !step.description.is_empty() {
                println!("       {}", step.description);
            }
        }
    }

    /// Print the final report
    pub fn report(&self, report: &str) {
        self.header("Report");
        println!();
        println!("{}", report);
    }

    /// Ask for a line of input; `None` on EOF or read error
    pub fn prompt(&self, message: &str) -> Option<String> {
        if self.colored {
            print!("  {} {} ", "?".bright_yellow().bold(), message.bright_white());
        } else {
            print!("  [?] {} ", message);
        }
        io::stdout().flush().ok();

        let mut input = String::new();
        match io::stdin().lock().read_line(&mut input) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(input.trim().to_string()),
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header: String = columns
            .iter()
            .map(|c| format!("{:<15}", c))
            .collect::<Vec<_>>()
            .join(" ");
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 16).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 16));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        let row: String = values
            .iter()
            .map(|v| format!("{:<15}", v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("    {}", row);
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}
