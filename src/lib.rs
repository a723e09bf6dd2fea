#[macro_use]
extern crate tracing;

mod app;
mod errors;
mod logging;

pub use app::App;
pub use errors::init_errors;
pub use logging::init_logging;
pub use marklogic_metrics_config::Args;
