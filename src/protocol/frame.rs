//! Frame tag tables and the tagged-variant encode/decode step.
//!
//! Every known tag lives in exactly one place: the `TAGS` table of
//! [`CommandKind`] or [`ReportKind`]. Decoding walks that table and falls
//! through to [`Decoded::Unknown`] when nothing matches, so adding a frame
//! kind is a one-line change and an old peer simply ignores it.
//!
//! # Wire format
//!
//! | Direction | Tag                  | Payload |
//! |-----------|----------------------|---------|
//! | command   | `SHOW_MESSAGE`       | text    |
//! | command   | `FAKE_CALL`          | caller  |
//! | command   | `GET_LOCATION`       | none    |
//! | command   | `GET_DEVICE_INFO`    | none    |
//! | command   | `CAPTURE_SCREENSHOT` | none    |
//! | command   | `GET_WHATSAPP_CHATS` | none    |
//! | report    | `DEVICE_CONNECTED`   | label   |
//! | report    | `LOCATION`           | text    |
//! | report    | `DEVICE_INFO`        | text    |
//! | report    | `SCREENSHOT`         | text    |
//! | report    | `WHATSAPP_CHATS`     | text    |
//! | report    | `HEARTBEAT`          | label   |
//!
//! Payload-bearing frames are `TAG:payload`; the others are the bare tag.
//! Payloads are escaped so that a multi-line payload stays one frame:
//! `\` → `\\`, LF → `\n`, CR → `\r`. A peer that sends raw newlines
//! instead splits the payload: every continuation line arrives as a frame
//! of its own and usually decodes as [`Decoded::Unknown`].

use std::fmt::Debug;

/// A closed set of frame tags for one direction of the protocol.
pub trait FrameKind: Copy + Eq + Debug + Send + Sync + 'static {
    /// Every known kind together with its wire tag.
    const TAGS: &'static [(Self, &'static str)];

    /// Whether frames of this kind carry a `:payload` suffix.
    fn takes_payload(self) -> bool;

    /// The wire tag for this kind.
    fn tag(self) -> &'static str {
        Self::TAGS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("", |(_, tag)| *tag)
    }
}

/// Coordinator → agent command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Show a text message to the agent's user.
    ShowMessage,
    /// Show a simulated incoming-call notification.
    FakeCall,
    /// Request a [`ReportKind::Location`] report.
    GetLocation,
    /// Request a [`ReportKind::DeviceInfo`] report.
    GetDeviceInfo,
    /// Request a [`ReportKind::Screenshot`] report.
    CaptureScreenshot,
    /// Request a [`ReportKind::WhatsappChats`] report.
    GetWhatsappChats,
}

impl CommandKind {
    /// The report an agent sends back for this command, if any.
    #[must_use]
    pub fn expected_report(self) -> Option<ReportKind> {
        match self {
            Self::ShowMessage | Self::FakeCall => None,
            Self::GetLocation => Some(ReportKind::Location),
            Self::GetDeviceInfo => Some(ReportKind::DeviceInfo),
            Self::CaptureScreenshot => Some(ReportKind::Screenshot),
            Self::GetWhatsappChats => Some(ReportKind::WhatsappChats),
        }
    }
}

impl FrameKind for CommandKind {
    const TAGS: &'static [(Self, &'static str)] = &[
        (Self::ShowMessage, "SHOW_MESSAGE"),
        (Self::FakeCall, "FAKE_CALL"),
        (Self::GetLocation, "GET_LOCATION"),
        (Self::GetDeviceInfo, "GET_DEVICE_INFO"),
        (Self::CaptureScreenshot, "CAPTURE_SCREENSHOT"),
        (Self::GetWhatsappChats, "GET_WHATSAPP_CHATS"),
    ];

    fn takes_payload(self) -> bool {
        matches!(self, Self::ShowMessage | Self::FakeCall)
    }
}

/// Agent → coordinator report kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Sent once right after connecting; payload is the agent label.
    DeviceConnected,
    /// Simulated location.
    Location,
    /// Simulated device description.
    DeviceInfo,
    /// Simulated screenshot notice.
    Screenshot,
    /// Simulated chat log; may span several lines.
    WhatsappChats,
    /// Periodic liveness signal; payload is the agent label.
    Heartbeat,
}

impl FrameKind for ReportKind {
    const TAGS: &'static [(Self, &'static str)] = &[
        (Self::DeviceConnected, "DEVICE_CONNECTED"),
        (Self::Location, "LOCATION"),
        (Self::DeviceInfo, "DEVICE_INFO"),
        (Self::Screenshot, "SCREENSHOT"),
        (Self::WhatsappChats, "WHATSAPP_CHATS"),
        (Self::Heartbeat, "HEARTBEAT"),
    ];

    fn takes_payload(self) -> bool {
        true
    }
}

/// One relay frame: a known kind plus its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<K> {
    kind: K,
    payload: Option<String>,
}

/// A coordinator → agent frame.
pub type Command = Frame<CommandKind>;

/// An agent → coordinator frame.
pub type Report = Frame<ReportKind>;

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<F> {
    /// The line matched a known tag.
    Frame(F),
    /// The tag is not in the table for this direction; the caller ignores it.
    Unknown {
        /// The leading tag as received (text before the first `:`).
        tag: String,
    },
}

impl<K: FrameKind> Frame<K> {
    /// Build a frame, normalising the payload to the kind's shape.
    ///
    /// Payload-bearing kinds always carry a payload (empty when `payload`
    /// is `None`); bare kinds drop any payload given.
    #[must_use]
    pub fn new(kind: K, payload: Option<String>) -> Self {
        let payload = if kind.takes_payload() {
            Some(payload.unwrap_or_default())
        } else {
            None
        };
        Self { kind, payload }
    }

    /// Build a bare frame of `kind`.
    #[must_use]
    pub fn bare(kind: K) -> Self {
        Self::new(kind, None)
    }

    /// Build a frame of `kind` carrying `text`.
    #[must_use]
    pub fn with_payload(kind: K, text: impl Into<String>) -> Self {
        Self::new(kind, Some(text.into()))
    }

    /// The frame kind.
    #[must_use]
    pub fn kind(&self) -> K {
        self.kind
    }

    /// The unescaped payload, if this kind carries one.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Render the frame as a single wire line without the trailing `\n`.
    #[must_use]
    pub fn encode(&self) -> String {
        match &self.payload {
            Some(payload) => format!("{}:{}", self.kind.tag(), escape_payload(payload)),
            None => self.kind.tag().to_owned(),
        }
    }

    /// Decode one wire line (without its `\n`).
    ///
    /// A known tag whose payload shape does not match the table (a bare
    /// tag sent with `:payload`, or a payload tag sent bare) is treated as
    /// unknown.
    #[must_use]
    pub fn decode(line: &str) -> Decoded<Self> {
        let (tag, payload) = match line.split_once(':') {
            Some((tag, payload)) => (tag, Some(payload)),
            None => (line, None),
        };

        K::TAGS
            .iter()
            .find(|(kind, known)| *known == tag && kind.takes_payload() == payload.is_some())
            .map_or_else(
                || Decoded::Unknown {
                    tag: tag.to_owned(),
                },
                |(kind, _)| {
                    Decoded::Frame(Self {
                        kind: *kind,
                        payload: payload.map(unescape_payload),
                    })
                },
            )
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn escape_payload(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    for ch in payload.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_payload`]. Unknown escapes and a trailing lone `\` are
/// kept as-is, so single-line text from a peer that never escapes passes
/// through intact.
fn unescape_payload(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
