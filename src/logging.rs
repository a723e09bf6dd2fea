use eyre::{
    Context as _,
    Result,
};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

const CRATES: [&str; 3] = [
    "marklogic_metrics",
    "marklogic_metrics_collector",
    "marklogic_metrics_config",
];

/// `RUST_LOG` wins; otherwise our crates log at info (debug with `--verbose`) and everything else at warn.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(verbose)).context("Invalid default log filter")?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(filter))
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .context("Failed to initialize tracing subscriber")
}

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|krate| format!("{krate}={level}")));
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_our_crates_only() {
        assert_eq!(
            default_directives(false),
            "warn,marklogic_metrics=info,marklogic_metrics_collector=info,marklogic_metrics_config=info"
        );
        assert!(default_directives(true).starts_with("warn,marklogic_metrics=debug"));
        assert!(EnvFilter::try_new(default_directives(true)).is_ok());
    }
}
