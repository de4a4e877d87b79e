pub mod logging;
pub mod metrics;

pub use logging::{init_logging, mask_amount, mask_payment_number, LogConfig, LogFormat};
pub use metrics::{get_metrics, init_metrics, LatencyTimer, Metrics, METRICS};
