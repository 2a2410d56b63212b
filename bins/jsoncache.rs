use cache::{CacheOptions, CacheRegistry};
use dotenvy::dotenv;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

fn init_logging() {
    // .env first so RUST_LOG from it takes effect
    dotenv().ok();
    // LOG_FORMAT=json switches to structured output
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => common::utils::logging::init_logging_json(),
        _ => common::utils::logging::init_logging_default(),
    }
    info!(service = "jsoncache", event = "logger_init", "tracing subscriber initialized");
}

fn load_config() -> configs::AppConfig {
    match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "failed to load config file, using defaults");
            configs::AppConfig::default()
        }
    }
}

fn main() -> std::process::ExitCode {
    init_logging();

    let run_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(
            service = "jsoncache",
            event = "panic",
            %run_id,
            pid,
            message = %info,
            "unhandled panic occurred"
        );
    }));

    let config = load_config();
    // the demo always flushes on the way out
    let options = CacheOptions { ejectable: true, ..config.cache.options.clone() };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "jsoncache", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(
        service = "jsoncache",
        event = "start",
        %run_id,
        pid,
        version,
        path = %config.cache.path.display(),
        "jsoncache demo starting"
    );

    rt.block_on(async move {
        let registry = CacheRegistry::new();
        let store = match registry.get_or_create(&config.cache.path, options) {
            Ok(store) => store,
            Err(e) => {
                error!(service = "jsoncache", event = "open_failed", error = %e, "cannot open cache");
                return std::process::ExitCode::FAILURE;
            }
        };
        // flushes on every return path below
        let _guard = registry.eject_guard();

        let runs = match store.update_item("runs", |v| {
            let next = v.as_u64().unwrap_or(0) + 1;
            *v = json!(next);
            next
        }) {
            Ok(runs) => runs,
            Err(e) => {
                error!(service = "jsoncache", event = "update_failed", error = %e, "cannot record run");
                return std::process::ExitCode::FAILURE;
            }
        };
        if let Err(e) = store.set_item("last_run", run_id.to_string()) {
            error!(service = "jsoncache", event = "update_failed", error = %e, "cannot record run id");
            return std::process::ExitCode::FAILURE;
        }
        info!(service = "jsoncache", event = "recorded", runs, "run recorded; press Ctrl+C to flush and exit");

        // the ejection hook exits the process after flushing on Ctrl+C
        std::future::pending::<()>().await;
        std::process::ExitCode::SUCCESS
    })
}
