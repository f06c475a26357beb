//! Config schema for the mirror, the Telegram transport and metrics.

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Deserializer, Serialize},
};

/// Root configuration, one section per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChanmirrorConfig {
    pub mirror: MirrorSettings,
    pub telegram: TelegramSettings,
    pub metrics: MetricsSettings,
}

/// Which channels are mirrored where, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorSettings {
    /// Channels whose posts are copied.
    #[serde(deserialize_with = "channel_ids")]
    pub source_channels: Vec<i64>,

    /// Channels every source post is copied into.
    #[serde(alias = "destinations", deserialize_with = "channel_ids")]
    pub destination_channels: Vec<i64>,

    /// Propagate source deletions to the copies.
    pub sync_deletions: bool,

    /// Window in which a repeated new-message event for the same source
    /// message is ignored.
    pub dedup_window_seconds: u64,

    /// Number of source messages whose copies stay editable.
    pub max_mapping_entries: usize,

    /// When false, new posts are not relayed. Edits and deletions of
    /// already mirrored posts still are.
    pub reposting_active: bool,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            source_channels: Vec::new(),
            destination_channels: Vec::new(),
            sync_deletions: false,
            dedup_window_seconds: 60,
            max_mapping_entries: 50,
            reposting_active: true,
        }
    }
}

/// Telegram Bot API credentials and polling behaviour.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Long-polling timeout passed to `getUpdates`.
    pub poll_timeout_secs: u32,

    /// Override for the Bot API base URL, e.g. a local Bot API server.
    pub api_url: Option<String>,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: 30,
            api_url: None,
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Prometheus exporter settings. Only honoured when the binary is built with
/// the `prometheus` feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "127.0.0.1:9464".into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChannelId {
    Number(i64),
    Text(String),
}

/// Channel ids may be written as numbers or as numeric strings.
fn channel_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
    Vec::<RawChannelId>::deserialize(deserializer)?
        .into_iter()
        .map(|raw| match raw {
            RawChannelId::Number(id) => Ok(id),
            RawChannelId::Text(text) => text.trim().parse().map_err(|_| {
                serde::de::Error::custom(format!("invalid channel id \"{text}\""))
            }),
        })
        .collect()
}
