use std::{
    env, fs,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    broadcast::BroadcastConfig, dispatch::DispatchConfig, errors::Error,
    store::DEFAULT_LOCK_TIMEOUT, Result,
};

const DEFAULT_PORT: u16 = 10_000;

/// Typed configuration for the relay, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub admin_ids: Vec<i64>,

    // Recipient stores
    pub groups_file: PathBuf,
    pub users_file: PathBuf,
    pub store_lock_timeout: Duration,

    // Fan-out
    pub send_pacing: Duration,
    pub broadcast_to_users: bool,

    // Transport: long polling unless a webhook URL is known
    pub webhook_url: Option<String>,
    pub listen_addr: SocketAddr,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("TOKEN"))
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;
        let admin_ids = parse_csv_i64(get("ADMIN_ID"))?;
        if admin_ids.is_empty() {
            return Err(Error::Config(
                "ADMIN_ID environment variable is required".to_string(),
            ));
        }

        let groups_file = PathBuf::from(get("GROUPS_FILE").unwrap_or("groups.json".to_string()));
        let users_file = PathBuf::from(get("USERS_FILE").unwrap_or("users.json".to_string()));
        let store_lock_timeout = parse_u64(&get, "STORE_LOCK_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT);

        let send_pacing = parse_u64(&get, "SEND_PACING_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DispatchConfig::default().pacing);
        let broadcast_to_users = get("BROADCAST_TO_USERS").map(|s| is_truthy(&s)).unwrap_or(false);

        // Hosting platforms such as Render only expose the external hostname.
        let webhook_url = get("WEBHOOK_URL").or_else(|| {
            get("RENDER_EXTERNAL_HOSTNAME").map(|host| format!("https://{host}/webhook"))
        });
        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got {raw:?}")))?,
            None => DEFAULT_PORT,
        };
        let listen_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let audit_log_path = PathBuf::from(
            get("AUDIT_LOG_PATH").unwrap_or("/tmp/broadcast-relay-audit.log".to_string()),
        );
        let audit_log_json = get("AUDIT_LOG_JSON").map(|s| is_truthy(&s)).unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            admin_ids,
            groups_file,
            users_file,
            store_lock_timeout,
            send_pacing,
            broadcast_to_users,
            webhook_url,
            listen_addr,
            audit_log_path,
            audit_log_json,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn broadcast(&self) -> BroadcastConfig {
        BroadcastConfig {
            dispatch: DispatchConfig {
                pacing: self.send_pacing,
            },
            include_users: self.broadcast_to_users,
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn is_truthy(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

fn parse_csv_i64(v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("ADMIN_ID entries must be integers, got {s:?}")))
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_with_only_required_vars() {
        let cfg = Config::from_lookup(lookup(&[("TOKEN", "t"), ("ADMIN_ID", "42")])).unwrap();
        assert_eq!(cfg.telegram_bot_token, "t");
        assert_eq!(cfg.admin_ids, vec![42]);
        assert_eq!(cfg.groups_file, PathBuf::from("groups.json"));
        assert_eq!(cfg.users_file, PathBuf::from("users.json"));
        assert_eq!(cfg.store_lock_timeout, Duration::from_secs(5));
        assert_eq!(cfg.send_pacing, Duration::from_millis(300));
        assert!(!cfg.broadcast_to_users);
        assert!(cfg.webhook_url.is_none());
        assert_eq!(cfg.listen_addr.port(), 10_000);
        assert!(cfg.is_admin(42));
        assert!(!cfg.is_admin(43));
    }

    #[test]
    fn missing_token_or_admin_is_fatal() {
        let err = Config::from_lookup(lookup(&[("ADMIN_ID", "1")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err =
            Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "t"), ("ADMIN_ID", "abc")]))
                .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn webhook_url_derived_from_render_hostname() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("ADMIN_ID", "1, 2"),
            ("RENDER_EXTERNAL_HOSTNAME", "relay.onrender.com"),
            ("PORT", "8080"),
            ("BROADCAST_TO_USERS", "yes"),
            ("SEND_PACING_MS", "100"),
        ]))
        .unwrap();
        assert_eq!(cfg.admin_ids, vec![1, 2]);
        assert_eq!(
            cfg.webhook_url.as_deref(),
            Some("https://relay.onrender.com/webhook")
        );
        assert_eq!(cfg.listen_addr.port(), 8080);

        let b = cfg.broadcast();
        assert!(b.include_users);
        assert_eq!(b.dispatch.pacing, Duration::from_millis(100));
    }

    #[test]
    fn explicit_webhook_url_wins() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("ADMIN_ID", "1"),
            ("WEBHOOK_URL", "https://example.org/hook"),
            ("RENDER_EXTERNAL_HOSTNAME", "ignored.example"),
        ]))
        .unwrap();
        assert_eq!(cfg.webhook_url.as_deref(), Some("https://example.org/hook"));
    }

    #[test]
    fn strips_matching_quotes_only() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("\"abc'"), "\"abc'");
    }
}
