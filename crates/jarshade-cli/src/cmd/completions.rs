use clap::CommandFactory;

/// Print a completion script for `shell` to stdout.
pub fn completions(shell: clap_complete::Shell) {
    let mut cmd = crate::Cli::command();
    clap_complete::generate(shell, &mut cmd, "jarshade", &mut std::io::stdout());
}
