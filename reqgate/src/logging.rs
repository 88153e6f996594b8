//! Tracing subscriber setup for hosts that don't install their own.
//!
//! `RUST_LOG` wins when set. Otherwise `REQGATE_LOG` picks the level for the
//! reqgate crates (`debug`, `warn`/`warning`, `error`, default `info`).
//! `LOG_FORMAT=json` switches to JSON lines. Output goes to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn filter() -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    let level = match std::env::var("REQGATE_LOG").as_deref() {
        Ok("debug") => "debug",
        Ok("trace") => "trace",
        Ok("warn") | Ok("warning") => "warn",
        Ok("error") => "error",
        _ => "info",
    };
    EnvFilter::new(format!("reqgate={level},reqgate_http={level}"))
}

/// Install a global subscriber. A second call (or a host that already
/// installed one) is a no-op.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }
}
