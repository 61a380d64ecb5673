use clap::Parser;

/// Path queried when no arguments are given
pub const DEFAULT_PATH: &str = "/";

#[derive(Parser)]
#[command(name = "freespace")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Show important and opportunistic free space for each volume",
    long_about = "Show important and opportunistic free space for each volume.\n\n\
        I: space usable without the OS reclaiming anything (what Finder shows)\n\
        O: space usable if every purgeable allocation is freed\n\n\
        Put paths that start with '-' after '--', e.g. freespace -- -data"
)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Paths to query; any file or directory on the volume works [default: /]
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,
}

impl Cli {
    /// Paths to query, in argument order. No arguments means the root volume.
    pub fn targets(&self) -> Vec<String> {
        if self.paths.is_empty() {
            vec![DEFAULT_PATH.to_string()]
        } else {
            self.paths.clone()
        }
    }
}
