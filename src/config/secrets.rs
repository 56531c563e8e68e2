//! Environment-sourced secrets and switches
//!
//! Nothing in here is ever read from the JSON config file, so the file can be
//! committed or printed without leaking credentials.
//!
//! ```bash
//! export SAFETY_ADMIN_KEY="..."        # required to leave sandbox mode or resume
//! export SAFETY_APPROVAL_CODE="..."    # optional; confirmation tickets then need it
//! export REAL_TRADING_ENABLED="false"  # overrides safety.real_trading_enabled
//! ```

use secrecy::{ExposeSecret, SecretString};

/// Environment variable names
pub mod env_vars {
    pub const ADMIN_KEY: &str = "SAFETY_ADMIN_KEY";
    pub const APPROVAL_CODE: &str = "SAFETY_APPROVAL_CODE";
    pub const REAL_TRADING_ENABLED: &str = "REAL_TRADING_ENABLED";
}

/// Credentials used by the sandbox gate and the confirmation broker
#[derive(Debug, Default)]
pub struct SafetySecrets {
    /// Key required by `disable_sandbox_mode` and `resume`
    pub admin_key: Option<SecretString>,
    /// Code an operator must present when approving a confirmation ticket
    pub approval_code: Option<SecretString>,
    /// Override for `SafetyConfig::real_trading_enabled`
    pub real_trading_enabled: Option<bool>,
}

impl SafetySecrets {
    /// Read secrets from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read secrets through an arbitrary lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let admin_key = non_empty(env_vars::ADMIN_KEY).map(SecretString::from);
        if admin_key.is_none() {
            tracing::debug!("{} not set; sandbox mode cannot be disabled", env_vars::ADMIN_KEY);
        }

        let approval_code = non_empty(env_vars::APPROVAL_CODE).map(SecretString::from);

        let real_trading_enabled = non_empty(env_vars::REAL_TRADING_ENABLED).and_then(|raw| {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                other => {
                    tracing::warn!(
                        value = other,
                        "Unrecognised {} value, ignoring",
                        env_vars::REAL_TRADING_ENABLED
                    );
                    None
                }
            }
        });

        Self {
            admin_key,
            approval_code,
            real_trading_enabled,
        }
    }

    /// Set the admin key explicitly
    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.admin_key = Some(SecretString::from(key.into()));
        self
    }

    /// Set the approval code explicitly
    pub fn with_approval_code(mut self, code: impl Into<String>) -> Self {
        self.approval_code = Some(SecretString::from(code.into()));
        self
    }
}

/// `false` when no secret is configured
pub(crate) fn matches_secret(secret: Option<&SecretString>, candidate: &str) -> bool {
    match secret {
        Some(secret) => secret.expose_secret() == candidate,
        None => false,
    }
}
