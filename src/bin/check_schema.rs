//! Validate packet field schemas (JSON) and optionally rewrite them in canonical form.
//!
//! Usage:
//!   check_schema [OPTIONS] [FILE.json ...]
//!   check_schema < schema.json
//!
//! A schema file is either an array of root fields or an object with a `fields` array.
//!
//! Options:
//!   --fix, -f          Rewrite each file as normalized canonical JSON (stdin: print it).
//!   --human, -H        Human-readable output
//!   --tree, -t         Print the field tree before the findings
//!   --config FILE      Engine configuration (TOML)
//!
//! Exit code 1 if any file fails to load or has violations. Set `RUST_LOG=debug`
//! to trace coercions and id assignment while loading.

use anyhow::Context;
use packet_schema::dump::render_tree;
use packet_schema::{EngineConfig, FieldTree, Violation};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

fn format_violation(path: &str, v: &Violation, style: OutputStyle) -> String {
    match style {
        OutputStyle::Compact => format!(
            "{}:{}: {} ({}): {}",
            path,
            v.path,
            v.name,
            v.field_type,
            v.labels().join(", ")
        ),
        OutputStyle::Human => format!("  {} {}", path, v),
    }
}

fn take_flag(args: &mut Vec<String>, long: &str, short: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == long || a == short) {
        args.remove(pos);
        true
    } else {
        false
    }
}

fn take_option(args: &mut Vec<String>, long: &str) -> anyhow::Result<Option<String>> {
    match args.iter().position(|a| a == long) {
        Some(pos) => {
            args.remove(pos);
            if pos >= args.len() {
                anyhow::bail!("{} needs a value", long);
            }
            Ok(Some(args.remove(pos)))
        }
        None => Ok(None),
    }
}

fn pretty(tree: &FieldTree) -> anyhow::Result<String> {
    let mut out = serde_json::to_string_pretty(&tree.to_canonical())?;
    out.push('\n');
    Ok(out)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let fix = take_flag(&mut args, "--fix", "-f");
    let style = if take_flag(&mut args, "--human", "-H") {
        OutputStyle::Human
    } else {
        OutputStyle::Compact
    };
    let show_tree = take_flag(&mut args, "--tree", "-t");
    let config = match take_option(&mut args, "--config")? {
        Some(path) => EngineConfig::load(Path::new(&path))
            .with_context(|| format!("loading config {}", path))?,
        None => EngineConfig::default(),
    };

    let mut has_error = false;
    let mut total = 0usize;

    let inputs: Vec<Option<PathBuf>> = if args.is_empty() {
        vec![None]
    } else {
        args.iter().map(|a| Some(PathBuf::from(a))).collect()
    };

    for input in inputs {
        let display_path = input
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<stdin>".to_string());
        let src = match &input {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{}: {}", display_path, e);
                    has_error = true;
                    continue;
                }
            },
            None => {
                let mut s = String::new();
                io::stdin().read_to_string(&mut s)?;
                s
            }
        };
        let doc: serde_json::Value = match serde_json::from_str(&src) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("{}: {}", display_path, e);
                has_error = true;
                continue;
            }
        };
        let tree = match FieldTree::from_canonical(&doc, config.clone()) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("{}: {}", display_path, e);
                has_error = true;
                continue;
            }
        };

        if fix {
            let fixed = pretty(&tree)?;
            match &input {
                Some(path) => {
                    if fixed != src {
                        std::fs::write(path, &fixed)
                            .with_context(|| format!("{}: write failed", display_path))?;
                        eprintln!("{}: fixed", display_path);
                    }
                }
                None => io::stdout().write_all(fixed.as_bytes())?,
            }
        }

        // stdout carries the fixed document when fixing stdin
        let report_to_stderr = fix && input.is_none();
        let report = |line: String| {
            if report_to_stderr {
                eprintln!("{}", line);
            } else {
                println!("{}", line);
            }
        };

        if show_tree {
            report(render_tree(&tree, false));
        }

        let violations = tree.validate();
        info!(file = %display_path, fields = tree.flatten().len(), violations = violations.len(), "checked");
        for v in &violations {
            report(format_violation(&display_path, v, style));
        }
        total += violations.len();
        if !violations.is_empty() {
            has_error = true;
        }
    }

    if total > 0 {
        eprintln!("check_schema: {} violation(s)", total);
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
