use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use cln_connector::ClnConnectorSettings;
use core_types::ChatAdapter;
use wallet::chat_log::LogOnlyChat;
use wallet::settings::WalletSettings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings =
        utils::config::get_config_from_env::<WalletSettings>().expect("Failed to load settings.");
    let cln_settings = utils::config::get_config_from_env::<ClnConnectorSettings>()
        .expect("Failed to load settings.");
    let api_settings =
        utils::config::get_config_from_env::<api::ApiSettings>().expect("Failed to load settings.");

    let (msg_tx, msg_rx) = mpsc::channel(1024);
    let (resp_tx, _engine_responses) = broadcast::channel(1024);

    // the façade runs in its own actix system; channels bridge the runtimes
    {
        let api_tx = msg_tx.clone();
        let api_resp = resp_tx.clone();
        std::thread::spawn(move || {
            actix_rt::System::new()
                .block_on(api::start(api_settings, api_tx, api_resp))
                .expect("facade server failed");
        });
    }

    let chat_logger = utils::xlogging::init_log(&settings.logging_settings);
    let chat: Arc<dyn ChatAdapter> = Arc::new(LogOnlyChat::new(chat_logger));

    wallet::start(settings, cln_settings, chat, msg_tx, msg_rx, resp_tx).await
}
