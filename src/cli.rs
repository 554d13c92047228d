//! CLI argument parsing with clap.

use clap::Parser;

use crate::command::ChatCommand;

/// Seedream image generation add-on, driven from the terminal.
#[derive(Parser, Debug)]
#[command(name = "seedream", version, about)]
pub struct Cli {
    /// Prompt describing the desired image (without the trigger phrase).
    #[arg(conflicts_with = "shell")]
    pub prompt: Option<String>,

    /// User the command is issued as.
    #[arg(short, long, default_value = "local")]
    pub user: String,

    /// Reference image URL; repeat for several.
    #[arg(short, long = "image", value_name = "URL")]
    pub images: Vec<String>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Keep generated images when the process exits.
    #[arg(long)]
    pub keep_images: bool,

    /// Read `<user> <message>` lines from stdin, like a chat room.
    #[arg(long)]
    pub shell: bool,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The single command described by the positional prompt and flags.
    #[must_use]
    pub fn command(&self) -> ChatCommand {
        ChatCommand::new(
            self.user.as_str(),
            "cli",
            self.prompt.clone().unwrap_or_default(),
            self.images.clone(),
        )
    }
}

/// Parse one shell line: `<user> <message>`.
///
/// Returns `None` for blank lines, comments and messages not starting with
/// `trigger`.
#[must_use]
pub fn parse_shell_line(line: &str, line_no: usize, trigger: &str) -> Option<ChatCommand> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (user, message) = line.split_once(char::is_whitespace)?;
    ChatCommand::parse(user, &format!("line-{line_no}"), message, trigger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_prompt() {
        let cli = Cli::parse_from(["seedream", "a cat"]);
        assert_eq!(cli.prompt.as_deref(), Some("a cat"));
        let cmd = cli.command();
        assert_eq!(cmd.prompt, "a cat");
        assert_eq!(cmd.user_id, "local");
    }

    #[test]
    fn default_values() {
        let cli = Cli::parse_from(["seedream"]);
        assert!(cli.prompt.is_none());
        assert!(cli.images.is_empty());
        assert!(cli.config.is_none());
        assert!(!cli.keep_images);
        assert!(!cli.shell);
        assert!(!cli.verbose);
        assert!(cli.command().is_empty());
    }

    #[test]
    fn all_options() {
        let cli = Cli::parse_from([
            "seedream",
            "-u",
            "alice",
            "-i",
            "https://x/a.png",
            "--image",
            "https://x/b.png",
            "--config",
            "c.toml",
            "--keep-images",
            "-v",
            "night sky",
        ]);
        assert_eq!(cli.user, "alice");
        assert_eq!(cli.images, vec!["https://x/a.png", "https://x/b.png"]);
        assert_eq!(cli.config.as_deref(), Some("c.toml"));
        assert!(cli.keep_images);
        assert!(cli.verbose);
        assert_eq!(cli.command().images.len(), 2);
    }

    #[test]
    fn shell_conflicts_with_prompt() {
        assert!(Cli::try_parse_from(["seedream", "--shell", "a cat"]).is_err());
        assert!(Cli::parse_from(["seedream", "--shell"]).shell);
    }

    #[test]
    fn shell_line_parsing() {
        let cmd = parse_shell_line("bob seedream a red fox", 3, "seedream").unwrap();
        assert_eq!(cmd.user_id, "bob");
        assert_eq!(cmd.message_id, "line-3");
        assert_eq!(cmd.prompt, "a red fox");

        assert!(parse_shell_line("bob hello", 1, "seedream").is_none());
        assert!(parse_shell_line("   ", 1, "seedream").is_none());
        assert!(parse_shell_line("# comment", 1, "seedream").is_none());
        assert!(parse_shell_line("lonely", 1, "seedream").is_none());
    }
}
