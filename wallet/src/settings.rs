use serde::{Deserialize, Serialize};

use utils::xlogging::LoggingSettings;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WalletSettings {
    /// Prefixes labels of outbound payments and integration state.
    #[serde(default = "default_service_id")]
    pub service_id: String,
    /// Public URL of the service (façade connection strings).
    pub service_url: String,
    /// Secret the façade credentials are derived from (the bot token).
    pub service_secret: String,
    /// url to the postgres database.
    pub psql_url: String,
    /// url to the ephemeral store.
    pub redis_url: String,
    #[serde(default = "default_invoice_timeout")]
    pub invoice_timeout_secs: i64,
    #[serde(default = "default_pay_confirm_timeout")]
    pub pay_confirm_timeout_secs: i64,
    #[serde(default = "default_give_away_timeout")]
    pub give_away_timeout_secs: i64,
    #[serde(default = "default_hidden_message_timeout")]
    pub hidden_message_timeout_secs: i64,
    #[serde(default = "default_qr_dir")]
    pub qr_dir: String,
    pub logging_settings: LoggingSettings,
}

fn default_service_id() -> String {
    "lnchat".to_string()
}

fn default_invoice_timeout() -> i64 {
    24 * 3600
}

fn default_pay_confirm_timeout() -> i64 {
    5 * 3600
}

fn default_give_away_timeout() -> i64 {
    5 * 3600
}

fn default_hidden_message_timeout() -> i64 {
    5 * 24 * 3600
}

fn default_qr_dir() -> String {
    "/tmp".to_string()
}

#[cfg(test)]
impl WalletSettings {
    pub fn test_defaults() -> Self {
        Self {
            service_id: default_service_id(),
            service_url: "https://wallet.example".to_string(),
            service_secret: "testsecret".to_string(),
            psql_url: String::new(),
            redis_url: String::new(),
            invoice_timeout_secs: default_invoice_timeout(),
            pay_confirm_timeout_secs: default_pay_confirm_timeout(),
            give_away_timeout_secs: default_give_away_timeout(),
            hidden_message_timeout_secs: default_hidden_message_timeout(),
            qr_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            logging_settings: LoggingSettings {
                stdout: false,
                level: "debug".to_string(),
                log_path: None,
                name: "wallet-test".to_string(),
            },
        }
    }
}
