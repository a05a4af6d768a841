use std::{fmt, time::Duration};

/// Kind tag of a [`Payload`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Text,
    Photo,
    Video,
    Sticker,
    Animation,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Text => "text",
            PayloadKind::Photo => "photo",
            PayloadKind::Video => "video",
            PayloadKind::Sticker => "sticker",
            PayloadKind::Animation => "animation",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message to fan out, replayed verbatim to every recipient.
///
/// Media variants reference a file already uploaded to the platform by its
/// platform-assigned id, so the bytes are never re-sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Text {
        text: String,
    },
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    Video {
        file_id: String,
        caption: Option<String>,
    },
    Sticker {
        file_id: String,
    },
    Animation {
        file_id: String,
        caption: Option<String>,
    },
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text { text: text.into() }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Text { .. } => PayloadKind::Text,
            Payload::Photo { .. } => PayloadKind::Photo,
            Payload::Video { .. } => PayloadKind::Video,
            Payload::Sticker { .. } => PayloadKind::Sticker,
            Payload::Animation { .. } => PayloadKind::Animation,
        }
    }

    /// Short human description for logs and the audit trail.
    pub fn describe(&self) -> String {
        match self {
            Payload::Text { text } => text.clone(),
            Payload::Photo { caption, .. }
            | Payload::Video { caption, .. }
            | Payload::Animation { caption, .. } => match caption {
                Some(c) => format!("[{}] {c}", self.kind()),
                None => format!("[{}]", self.kind()),
            },
            Payload::Sticker { .. } => "[sticker]".to_string(),
        }
    }
}

/// Classified result of a single send attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// The platform asked us to back off before trying again.
    RateLimited(Duration),
    /// The recipient revoked access or no longer exists. Drives the purge.
    PermanentlyUnreachable { reason: String },
    /// Anything else. Possibly a payload problem, so the recipient is kept.
    TransientFailure { reason: String },
}

impl Outcome {
    pub fn permanent(reason: impl Into<String>) -> Self {
        Outcome::PermanentlyUnreachable {
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Outcome::TransientFailure {
            reason: reason.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_includes_caption_for_media() {
        let p = Payload::Photo {
            file_id: "AgAD".to_string(),
            caption: Some("launch day".to_string()),
        };
        assert_eq!(p.kind(), PayloadKind::Photo);
        assert_eq!(p.describe(), "[photo] launch day");

        let s = Payload::Sticker {
            file_id: "CAAC".to_string(),
        };
        assert_eq!(s.describe(), "[sticker]");
        assert_eq!(Payload::text("hi").describe(), "hi");
    }
}
