//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand, ValueEnum,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::source::Theme;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Declarative stylesheet loader
#[derive(Parser)]
#[command(
    name = "stylesync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Load, watch and combine stylesheets from files, directories and URLs",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ stylesync init\n  $ stylesync resolve\n  $ stylesync build --output combined.css\n  $ stylesync watch --json"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .stylesync directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .stylesync/settings.toml")]
    Config,

    /// Classify the configured sources without loading them
    #[command(about = "Show how each configured source resolves")]
    Resolve {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one pass and print the combined stylesheet
    #[command(
        about = "Load every source once and combine the result",
        after_help = "Examples:\n  stylesync build\n  stylesync build --theme dark --output dark.css"
    )]
    Build {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only include sources active for this theme
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
    },

    /// Keep sources loaded and report changes as they happen
    #[command(
        about = "Watch sources and the settings file, printing events",
        after_help = "Events:\n  {\"type\":\"add\",\"file\":{...}}\n  {\"type\":\"remove\",\"path\":\"...\"}\n  {\"type\":\"removeDir\",\"path\":\"...\"}"
    )]
    Watch {
        /// Print one JSON object per event
        #[arg(long)]
        json: bool,
    },
}

/// Theme selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}
