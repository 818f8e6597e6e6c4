use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
};

use crate::{
    commands::{CommandSettings, DEFAULT_WELCOME_STICKER},
    dispatcher::PendingPolicy,
    errors::Error,
    Result,
};

pub const TOKEN_VAR: &str = "STICKFIX_TOKEN";
pub const TEST_TOKEN_VAR: &str = "TELEGRAM_TEST_TOKEN";
pub const ROOT_VAR: &str = "STICKFIX_PATH";

/// Typed process configuration.
#[derive(Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub root_dir: PathBuf,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub help_path: PathBuf,
    pub welcome_sticker: String,
    pub pending_policy: PendingPolicy,
}

impl Config {
    /// Loads from the environment (and `./.env` if present). `test_mode`
    /// selects the test bot's token variable.
    pub fn load(test_mode: bool) -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(test_mode, |key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup and creates the
    /// data and log directories.
    pub fn from_lookup(test_mode: bool, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token_var = if test_mode { TEST_TOKEN_VAR } else { TOKEN_VAR };
        let telegram_bot_token = lookup(token_var)
            .and_then(non_empty)
            .ok_or_else(|| Error::Config(format!("{token_var} environment variable is required")))?;

        let root_dir = lookup(ROOT_VAR)
            .and_then(non_empty)
            .map(PathBuf::from)
            .ok_or_else(|| Error::Config(format!("{ROOT_VAR} environment variable is required")))?;

        let data_dir = root_dir.join("data");
        let log_dir = root_dir.join("logs");
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&log_dir)?;

        let welcome_sticker = lookup("STICKFIX_WELCOME_STICKER")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_WELCOME_STICKER.to_string());

        let pending_policy = if lookup("STICKFIX_CANCEL_PENDING_ON_COMMAND")
            .map(|v| parse_bool(&v))
            .unwrap_or(false)
        {
            PendingPolicy::Cancel
        } else {
            PendingPolicy::Keep
        };

        Ok(Self {
            telegram_bot_token,
            database_path: data_dir.join("data.db"),
            log_dir,
            help_path: root_dir.join("messages").join("help.md"),
            root_dir,
            welcome_sticker,
            pending_policy,
        })
    }

    pub fn command_settings(&self) -> CommandSettings {
        CommandSettings {
            welcome_sticker: self.welcome_sticker.clone(),
            help_path: self.help_path.clone(),
            pending_policy: self.pending_policy,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("root_dir", &self.root_dir)
            .field("database_path", &self.database_path)
            .field("log_dir", &self.log_dir)
            .field("help_path", &self.help_path)
            .field("welcome_sticker", &self.welcome_sticker)
            .field("pending_policy", &self.pending_policy)
            .finish()
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
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

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
