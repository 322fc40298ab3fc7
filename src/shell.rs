//! Shell session setup.
//!
//! `promptline init <shell>` gives each interactive shell its own session
//! id, exported as `PROMPTLINE_SESSION_ID`. The id scopes the render cache
//! so that repeated prompts in one terminal share cached values while
//! separate terminals don't.

/// Environment variable carrying the session id.
pub const SESSION_ID_VAR: &str = "PROMPTLINE_SESSION_ID";

/// Session used when the shell was never initialized.
pub const NO_SESSION: &str = "nosession";

/// Supported shells
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
    Pwsh,
    Nu,
    Elvish,
    Xonsh,
}

impl Shell {
    /// A statement that sets `name` to `value` in the current session.
    pub fn export(&self, name: &str, value: &str) -> String {
        match self {
            Shell::Bash | Shell::Zsh => format!("export {name}=\"{value}\""),
            Shell::Fish => format!("set -gx {name} \"{value}\""),
            Shell::Powershell | Shell::Pwsh => format!("$env:{name} = \"{value}\""),
            Shell::Nu => format!("$env.{name} = \"{value}\""),
            Shell::Elvish => format!("set-env {name} \"{value}\""),
            Shell::Xonsh => format!("${name} = \"{value}\""),
        }
    }
}

/// A fresh random session id.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Session id from the environment, or [`NO_SESSION`].
pub fn current_session_id() -> String {
    std::env::var(SESSION_ID_VAR)
        .ok()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| NO_SESSION.to_string())
}

/// The script `promptline init` prints.
pub struct ShellInit {
    pub shell: Shell,
    pub session_id: String,
}

impl ShellInit {
    pub fn new(shell: Shell) -> Self {
        Self {
            shell,
            session_id: new_session_id(),
        }
    }

    pub fn generate(&self) -> String {
        self.shell.export(SESSION_ID_VAR, &self.session_id)
    }
}
