use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use farmplot_core::{
    AppConfig, FarmApi, HttpFarmApi, MockFarmApi, SessionContext, TokenSource, config_path,
    targets,
};
use farmplot_ui::logging::{LogLevel, LogStore, init_logging};
use farmplot_ui::{Flags, UiResult, run};

const LOG_CAPACITY: usize = 2000;

fn main() -> UiResult {
    let path = config_path();
    let loaded = AppConfig::load_or_default(&path);
    let log_level = loaded
        .as_ref()
        .map(|config| LogLevel::from_config(&config.log_level))
        .unwrap_or_default();

    let log_store = LogStore::new(LOG_CAPACITY);
    let reload_handle = init_logging(log_store.clone(), log_level);

    let config = match loaded {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(
                target: targets::STORAGE,
                path = %path.display(),
                error = %error.technical_detail(),
                "Config unreadable; using defaults"
            );
            AppConfig::default()
        }
    };

    let token_source = config.token_source();
    let session = load_session(&token_source);
    let api: Arc<dyn FarmApi> = if config.offline_demo {
        tracing::info!(target: targets::API, "Offline demo mode; serving built-in data");
        Arc::new(MockFarmApi::with_demo_data())
    } else {
        tracing::info!(target: targets::API, base_url = %config.api_base_url, "Using farm server");
        Arc::new(HttpFarmApi::new(config.api_config()).with_session(session.clone()))
    };

    tracing::info!(target: targets::UI, config = %path.display(), "Farm plot pricing starting");

    run(Flags {
        log_store,
        reload_handle,
        log_level,
        config,
        api,
        session,
        token_source,
        config_path: path,
    })
}

fn load_session(source: &TokenSource) -> SessionContext {
    let token = match source.read() {
        Ok(Some(token)) => token,
        Ok(None) => {
            tracing::info!(target: targets::SESSION, source = ?source, "No id token; read-only session");
            return SessionContext::anonymous();
        }
        Err(error) => {
            tracing::warn!(
                target: targets::SESSION,
                error = %error.technical_detail(),
                "Token source unreadable; read-only session"
            );
            return SessionContext::anonymous();
        }
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0);
    match SessionContext::from_id_token(&token, now) {
        Ok(session) => session,
        Err(error) => {
            tracing::warn!(
                target: targets::SESSION,
                error = %error.technical_detail(),
                "Id token rejected; read-only session"
            );
            SessionContext::anonymous()
        }
    }
}
