pub mod email;
pub mod metrics;
pub mod notify;

pub use email::{
    EmailMessage, EmailProvider, HttpEmailProvider, MockEmailProvider, ProviderError,
    ProviderResponse, SmtpProvider,
};
pub use metrics::{get_metrics, init_metrics};
