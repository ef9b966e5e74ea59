//! Configuration management for notifan
//!
//! This module defines the main `Config` struct and its sub-structs. Settings
//! are layered with `figment`: built-in defaults, an optional TOML file, the
//! environment variables of older deployments, `NOTIFAN_`-prefixed
//! environment variables, and finally the command line.

use crate::cli::Cli;
use crate::dispatcher::DispatchConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map, Value},
    Error, Figment, Metadata, Profile, Provider,
};
use serde::{Deserialize, Deserializer, Serialize};

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Dispatch timing, concurrency and retry settings.
    pub dispatch: DispatchConfig,
    /// Optional quote appended to every message.
    pub hitokoto: HitokotoConfig,
    /// Per-channel credentials.
    pub channels: ChannelsConfig,
}

/// Configuration for the hitokoto quote service.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct HitokotoConfig {
    pub enabled: bool,
    pub url: String,
    pub timeout_seconds: u64,
}

impl Default for HitokotoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "https://v1.hitokoto.cn/".to_string(),
            timeout_seconds: 5,
        }
    }
}

/// Settings for every built-in channel. A channel without its required
/// settings is left out of dispatches.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ChannelsConfig {
    pub console: ConsoleConfig,
    pub bark: BarkConfig,
    pub dingtalk: DingTalkConfig,
    pub gotify: GotifyConfig,
    pub telegram: TelegramConfig,
    pub smtp: SmtpConfig,
    pub pushplus: PushPlusConfig,
    pub serverchan: ServerChanConfig,
    pub wecom_app: WeComAppConfig,
    pub wecom_bot: WeComBotConfig,
    pub pushdeer: PushDeerConfig,
    pub qmsg: QmsgConfig,
    pub igot: IGotConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Print to stderr, leaving stdout to the JSON summary
    pub stderr: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stderr: false,
        }
    }
}

/// Bark push. `push` is either a device key or a full server URL with key.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct BarkConfig {
    pub push: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub archive: Option<String>,
    pub group: Option<String>,
    pub sound: Option<String>,
    pub icon: Option<String>,
}

/// DingTalk group robot with request signing enabled.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DingTalkConfig {
    /// The robot's `access_token`
    pub token: Option<String>,
    /// The `SEC...` signing secret
    pub secret: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct GotifyConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub priority: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    /// Alternative API host, e.g. a reverse proxy for api.telegram.org
    pub api_host: Option<String>,
    pub proxy_host: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub proxy_port: Option<String>,
    /// `user:password` for the proxy
    pub proxy_auth: Option<String>,
}

/// Mail to yourself: the message is sent from and to `email`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SmtpConfig {
    /// `host` or `host:port`
    pub server: Option<String>,
    /// Implicit TLS (port 465 by default) instead of plain SMTP (port 25)
    pub ssl: bool,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Display name on the From and To headers
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct PushPlusConfig {
    pub token: Option<String>,
    pub topic: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ServerChanConfig {
    /// `SCT...` keys use the Turbo API, anything else the legacy one
    pub key: Option<String>,
    pub url: Option<String>,
}

/// WeCom application messages, sent with an access token fetched per send.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct WeComAppConfig {
    pub corp_id: Option<String>,
    pub corp_secret: Option<String>,
    /// Recipients, `@all` when unset
    pub to_user: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub agent_id: Option<String>,
    /// Thumbnail media; when set the message is sent as mpnews
    pub media_id: Option<String>,
    /// API base, `https://qyapi.weixin.qq.com/cgi-bin` by default
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct WeComBotConfig {
    pub key: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct PushDeerConfig {
    pub key: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct QmsgConfig {
    pub key: Option<String>,
    /// `send` for private messages, `group` for groups
    pub kind: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct IGotConfig {
    pub key: Option<String>,
    pub url: Option<String>,
}

/// Accepts strings as well as bare numbers and booleans, since figment parses
/// `TG_USER_ID=12345` from the environment as a number.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Uint(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Uint(u) => u.to_string(),
        Raw::Float(f) => f.to_string(),
        Raw::Bool(b) => b.to_string(),
    }))
}

impl Config {
    /// Loads the application configuration from all layered sources.
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::figment(cli, LegacyEnv::from_env()).extract().map_err(Into::into)
    }

    /// Builds the layered figment. Exposed so tests can substitute the legacy
    /// environment.
    pub fn figment(cli: &Cli, legacy: LegacyEnv) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(legacy)
            // e.g. NOTIFAN_DISPATCH__TIMEOUT_SECONDS=60
            .merge(Env::prefixed("NOTIFAN_").split("__"))
            .merge(cli)
    }

    /// Checks settings the type system cannot.
    pub fn validate(&self) -> Result<()> {
        self.dispatch.retry.to_policy()?;
        if self.dispatch.timeout_seconds == 0 {
            anyhow::bail!("dispatch.timeout_seconds must be greater than zero");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dispatch: DispatchConfig::default(),
            hitokoto: HitokotoConfig::default(),
            channels: ChannelsConfig::default(),
        }
    }
}

// =============================================================================
// Legacy environment variables
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum LegacyKind {
    Str,
    Int,
    Float,
    Bool,
    /// Newline-separated list
    Lines,
    /// Comma-separated values spread over the named keys of one table. The
    /// trailing keys are optional.
    Fields {
        keys: &'static [&'static str],
        required: usize,
    },
}

/// (variable, config path, kind)
const LEGACY_VARS: &[(&str, &str, LegacyKind)] = &[
    ("NOTIFICATION_TIMEOUT", "dispatch.timeout_seconds", LegacyKind::Int),
    ("MAX_CONCURRENT_NOTIFICATIONS", "dispatch.max_concurrency", LegacyKind::Int),
    ("NOTIFICATION_RETRY_ATTEMPTS", "dispatch.retry.max_attempts", LegacyKind::Int),
    ("NOTIFICATION_RETRY_DELAY", "dispatch.retry.base_delay_seconds", LegacyKind::Float),
    ("NOTIFICATION_MAX_RETRY_DELAY", "dispatch.retry.max_delay_seconds", LegacyKind::Float),
    ("SKIP_PUSH_TITLE", "dispatch.skip_titles", LegacyKind::Lines),
    ("HITOKOTO", "hitokoto.enabled", LegacyKind::Bool),
    ("CONSOLE", "channels.console.enabled", LegacyKind::Bool),
    ("BARK_PUSH", "channels.bark.push", LegacyKind::Str),
    ("BARK_ARCHIVE", "channels.bark.archive", LegacyKind::Str),
    ("BARK_GROUP", "channels.bark.group", LegacyKind::Str),
    ("BARK_SOUND", "channels.bark.sound", LegacyKind::Str),
    ("BARK_ICON", "channels.bark.icon", LegacyKind::Str),
    ("DD_BOT_TOKEN", "channels.dingtalk.token", LegacyKind::Str),
    ("DD_BOT_SECRET", "channels.dingtalk.secret", LegacyKind::Str),
    ("GOTIFY_URL", "channels.gotify.url", LegacyKind::Str),
    ("GOTIFY_TOKEN", "channels.gotify.token", LegacyKind::Str),
    ("GOTIFY_PRIORITY", "channels.gotify.priority", LegacyKind::Int),
    ("TG_BOT_TOKEN", "channels.telegram.bot_token", LegacyKind::Str),
    ("TG_USER_ID", "channels.telegram.user_id", LegacyKind::Str),
    ("TG_API_HOST", "channels.telegram.api_host", LegacyKind::Str),
    ("TG_PROXY_HOST", "channels.telegram.proxy_host", LegacyKind::Str),
    ("TG_PROXY_PORT", "channels.telegram.proxy_port", LegacyKind::Str),
    ("TG_PROXY_AUTH", "channels.telegram.proxy_auth", LegacyKind::Str),
    ("SMTP_SERVER", "channels.smtp.server", LegacyKind::Str),
    ("SMTP_SSL", "channels.smtp.ssl", LegacyKind::Bool),
    ("SMTP_EMAIL", "channels.smtp.email", LegacyKind::Str),
    ("SMTP_PASSWORD", "channels.smtp.password", LegacyKind::Str),
    ("SMTP_NAME", "channels.smtp.name", LegacyKind::Str),
    ("PUSH_PLUS_TOKEN", "channels.pushplus.token", LegacyKind::Str),
    ("PUSH_PLUS_USER", "channels.pushplus.topic", LegacyKind::Str),
    // SCKEY is the older name; PUSH_KEY wins when both are set.
    ("SCKEY", "channels.serverchan.key", LegacyKind::Str),
    ("PUSH_KEY", "channels.serverchan.key", LegacyKind::Str),
    // corpid,corpsecret,touser,agentid[,media_id]
    (
        "QYWX_AM",
        "channels.wecom_app",
        LegacyKind::Fields {
            keys: &["corp_id", "corp_secret", "to_user", "agent_id", "media_id"],
            required: 4,
        },
    ),
    ("QYWX_KEY", "channels.wecom_bot.key", LegacyKind::Str),
    ("DEER_KEY", "channels.pushdeer.key", LegacyKind::Str),
    ("DEER_URL", "channels.pushdeer.url", LegacyKind::Str),
    ("QMSG_KEY", "channels.qmsg.key", LegacyKind::Str),
    ("QMSG_TYPE", "channels.qmsg.kind", LegacyKind::Str),
    ("IGOT_PUSH_KEY", "channels.igot.key", LegacyKind::Str),
];

/// Every unprefixed variable [`LegacyEnv`] reads.
pub fn legacy_variable_names() -> impl Iterator<Item = &'static str> {
    LEGACY_VARS.iter().map(|(name, _, _)| *name)
}

/// A figment provider for the unprefixed variables older deployments set.
#[derive(Debug, Clone, Default)]
pub struct LegacyEnv {
    vars: Vec<(String, String)>,
}

impl LegacyEnv {
    /// Reads the known variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Uses the given variables instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }
}

fn legacy_value(raw: &str, kind: LegacyKind) -> Value {
    match kind {
        LegacyKind::Str => Value::from(raw.to_string()),
        LegacyKind::Int => match raw.trim().parse::<i64>() {
            Ok(n) => Value::from(n),
            // Left as a string so extraction reports the bad value.
            Err(_) => Value::from(raw.to_string()),
        },
        LegacyKind::Float => match raw.trim().parse::<f64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(raw.to_string()),
        },
        LegacyKind::Bool => Value::from(raw.trim().eq_ignore_ascii_case("true")),
        LegacyKind::Lines => Value::from(
            raw.split('\n')
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>(),
        ),
        // Spread by `insert_fields`.
        LegacyKind::Fields { .. } => Value::from(raw.to_string()),
    }
}

/// Splits a comma-separated variable into the keys of the table at `path`.
fn insert_fields(
    dict: &mut Dict,
    name: &str,
    path: &str,
    raw: &str,
    keys: &[&str],
    required: usize,
) -> Result<(), Error> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() < required || parts.len() > keys.len() {
        return Err(Error::from(format!(
            "{} must have {} to {} comma-separated values, got {}",
            name,
            required,
            keys.len(),
            parts.len()
        )));
    }
    for (key, part) in keys.iter().zip(parts) {
        if !part.is_empty() {
            insert_path(dict, &format!("{}.{}", path, key), Value::from(part.to_string()));
        }
    }
    Ok(())
}

/// Inserts `value` at a dotted `path`, creating intermediate tables.
fn insert_path(dict: &mut Dict, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            dict.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = dict
                .entry(head.to_string())
                .or_insert_with(|| Value::from(Dict::new()));
            if let Value::Dict(_, child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

impl Provider for LegacyEnv {
    fn metadata(&self) -> Metadata {
        Metadata::named("Legacy Environment Variables")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();
        for (name, path, kind) in LEGACY_VARS {
            let Some(raw) = self.lookup(name) else {
                continue;
            };
            match *kind {
                LegacyKind::Fields { keys, required } => {
                    insert_fields(&mut dict, name, path, raw, keys, required)?
                }
                kind => insert_path(&mut dict, path, legacy_value(raw, kind)),
            }
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
