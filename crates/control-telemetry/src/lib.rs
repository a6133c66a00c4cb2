//! Structured logging setup shared by every control-plane binary.
//!
//! Development gets a compact, human-readable formatter; anything built
//! without `debug_assertions` gets flattened JSON lines suitable for log
//! ingestion. A global panic hook logs through `tracing` instead of letting
//! the default handler write straight to stderr, so panics end up in the
//! same stream as everything else.

use std::panic;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber and panic hook for `service_name`.
///
/// `RUST_LOG` is honored verbatim when set; otherwise defaults to `debug`
/// for this service's own spans in debug builds (`info` in release) and
/// `warn`/`error` for the noisiest dependencies.
///
/// # Panics
/// Panics if a global subscriber has already been installed.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
        format!("{service_name}={default_level},tower_http=warn,hyper=warn,libsql=error").into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    install_panic_hook(service_name);

    info!(service = service_name, "tracing initialized");
}

fn install_panic_hook(service_name: &str) {
    let service_name = service_name.to_string();

    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");

        error!(
            target: "panic",
            service = %service_name,
            location = %location,
            "thread panicked: {message}"
        );
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_panic_hook_does_not_panic_on_install() {
        install_panic_hook("test-service");
    }
}
