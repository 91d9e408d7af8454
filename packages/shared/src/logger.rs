//! Logger setup shared by the Nebula binaries.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when it is set. Otherwise the filter enables
/// `default_level` for the calling crate and for `tower_http`, and `warn`
/// for everything else.
///
/// # Arguments
///
/// * `bin_name` - Binary name (usually `env!("CARGO_BIN_NAME")`)
/// * `default_level` - Level used when `RUST_LOG` is not set
pub fn setup_logger(bin_name: &str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(bin_name, default_level)));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Build the default filter directive for a binary.
fn default_filter(bin_name: &str, default_level: &str) -> String {
    let crate_name = bin_name.replace('-', "_");
    let mut directives = vec![format!("{crate_name}={default_level}")];
    for target in ["nebula_client", "nebula_server", "tower_http"] {
        if target != crate_name {
            directives.push(format!("{target}={default_level}"));
        }
    }
    directives.push("warn".to_string());
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_crate_name() {
        // テスト項目: バイナリ名のハイフンがアンダースコアに変換される
        // when (操作):
        let filter = default_filter("nebula-client", "debug");

        // then (期待する結果):
        assert!(filter.starts_with("nebula_client=debug"));
        assert!(filter.ends_with(",warn"));
    }

    #[test]
    fn test_default_filter_lists_each_target_once() {
        // テスト項目: バイナリ自身のクレートが重複して指定されない
        // when (操作):
        let filter = default_filter("nebula-client", "info");

        // then (期待する結果):
        assert_eq!(filter.matches("nebula_client=").count(), 1);
        assert_eq!(
            filter,
            "nebula_client=info,nebula_server=info,tower_http=info,warn"
        );
    }

    #[test]
    fn test_setup_logger_twice_does_not_panic() {
        // テスト項目: 2 回目の初期化でもパニックしない
        setup_logger("nebula-test", "info");
        setup_logger("nebula-test", "debug");
    }
}
