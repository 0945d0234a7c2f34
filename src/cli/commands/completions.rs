//! Completions command - generate shell completion scripts.

use clap::Command;
use clap_complete::{generate, Shell};
use std::io;

/// Arguments for the completions command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence completions bash > ~/.local/share/bash-completion/completions/evidence\n    \
    evidence completions zsh > ~/.zfunc/_evidence\n    \
    evidence completions fish > ~/.config/fish/completions/evidence.fish")]
pub struct Args {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Writes completions for `cmd` to stdout.
///
/// Called from main.rs, which owns the top-level clap command.
pub fn generate_completions(cmd: &mut Command, shell: Shell) {
    generate(shell, cmd, "evidence", &mut io::stdout());
}
