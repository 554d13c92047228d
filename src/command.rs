//! Chat-side types: the incoming command and the reply handed back to the host.

use std::path::PathBuf;

/// Marker a host can use to attach an image URL inside message text.
const IMAGE_MARKER: &str = "[image:";

/// One image command as delivered by the chat host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCommand {
    /// Sender identifier; the unit of rate limiting.
    pub user_id: String,
    /// Identifier of the triggering message, echoed in the reply.
    pub message_id: String,
    /// Free-text prompt, trigger phrase already removed.
    pub prompt: String,
    /// URLs of images attached to the message.
    pub images: Vec<String>,
}

impl ChatCommand {
    /// Build a command from parts the host already split out.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        message_id: impl Into<String>,
        prompt: impl Into<String>,
        images: Vec<String>,
    ) -> Self {
        Self { user_id: user_id.into(), message_id: message_id.into(), prompt: prompt.into(), images }
    }

    /// Parse raw message text that starts with `trigger`.
    ///
    /// `[image:URL]` markers are pulled out of the text into
    /// [`images`](Self::images). Returns `None` when the text is not addressed
    /// to this command.
    #[must_use]
    pub fn parse(user_id: &str, message_id: &str, text: &str, trigger: &str) -> Option<Self> {
        let rest = text.trim_start().strip_prefix(trigger)?;
        if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
            return None;
        }

        let mut prompt = String::new();
        let mut images = Vec::new();
        let mut remaining = rest;
        while let Some(start) = remaining.find(IMAGE_MARKER) {
            prompt.push_str(&remaining[..start]);
            let after = &remaining[start + IMAGE_MARKER.len()..];
            match after.find(']') {
                Some(end) => {
                    let url = after[..end].trim();
                    if !url.is_empty() {
                        images.push(url.to_string());
                    }
                    remaining = &after[end + 1..];
                }
                None => {
                    prompt.push_str(&remaining[start..]);
                    remaining = "";
                }
            }
        }
        prompt.push_str(remaining);

        let prompt = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(Self::new(user_id, message_id, prompt, images))
    }

    /// True when there is nothing to generate from.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompt.trim().is_empty() && self.images.is_empty()
    }
}

/// A successfully generated image ready to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The message being answered.
    pub reply_to: String,
    /// Local file holding the image.
    pub path: PathBuf,
    /// Caption naming the prompt used.
    pub caption: String,
}

/// What the host should post back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text: rejections and failures.
    Text(String),
    /// The generated picture.
    Image(Delivery),
}

impl Reply {
    /// The text of a plain reply, or the caption of an image reply.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Image(delivery) => &delivery.caption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_trigger() {
        let cmd = ChatCommand::parse("u1", "m1", "seedream  blue sky ", "seedream").unwrap();
        assert_eq!(cmd.prompt, "blue sky");
        assert!(cmd.images.is_empty());
        assert_eq!(cmd.user_id, "u1");
        assert_eq!(cmd.message_id, "m1");
    }

    #[test]
    fn parse_ignores_other_messages() {
        assert!(ChatCommand::parse("u", "m", "hello there", "seedream").is_none());
        assert!(ChatCommand::parse("u", "m", "seedreamer cats", "seedream").is_none());
    }

    #[test]
    fn parse_bare_trigger_is_empty_command() {
        let cmd = ChatCommand::parse("u", "m", "seedream", "seedream").unwrap();
        assert!(cmd.is_empty());
    }

    #[test]
    fn parse_extracts_image_markers() {
        let cmd = ChatCommand::parse(
            "u",
            "m",
            "seedream make it [image:https://x/a.png] night [image: https://x/b.png ]",
            "seedream",
        )
        .unwrap();
        assert_eq!(cmd.prompt, "make it night");
        assert_eq!(cmd.images, vec!["https://x/a.png", "https://x/b.png"]);
        assert!(!cmd.is_empty());
    }

    #[test]
    fn unterminated_marker_stays_in_prompt() {
        let cmd = ChatCommand::parse("u", "m", "seedream a [image:oops", "seedream").unwrap();
        assert_eq!(cmd.prompt, "a [image:oops");
        assert!(cmd.images.is_empty());
    }

    #[test]
    fn parse_supports_non_ascii_trigger() {
        let cmd = ChatCommand::parse("u", "m", "画图豆包 星空下的大海", "画图豆包").unwrap();
        assert_eq!(cmd.prompt, "星空下的大海");
    }

    #[test]
    fn images_only_is_not_empty() {
        let cmd = ChatCommand::new("u", "m", "  ", vec!["https://x/a.png".into()]);
        assert!(!cmd.is_empty());
    }
}
