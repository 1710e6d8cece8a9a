//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use media_control::Platform;

/// Control YouTube, Spotify or TikTok with hand gestures.
#[derive(Parser, Debug)]
#[command(name = "gesture-media")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug-level logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the pipeline and print what it does
    Run {
        /// Platform to activate first (youtube, spotify, tiktok)
        #[arg(short, long)]
        platform: Option<Platform>,

        /// Simulation script, e.g. "fist:10,none:20,swipe-up:12"
        #[arg(short, long, default_value = DEFAULT_SCRIPT)]
        script: String,

        /// Simulated camera frame rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Read hands from a Leap Motion controller instead of the script
        /// (needs a build with the `leap` feature)
        #[arg(long)]
        leap: bool,
    },

    /// Print the gesture → command table
    Gestures,

    /// Show or check configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Load and validate the configuration
    Validate,
    /// Write the default configuration to a file
    Init {
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Two passes through the default gesture set.
pub const DEFAULT_SCRIPT: &str = "none:15,open-palm:12,none:20,thumbs-up:12,none:20,peace:12,none:20,\
     swipe-right:10,none:20,swipe-up:10,none:20,pinch:12,none:20,point-up:12,none:30";
