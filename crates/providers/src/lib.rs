//! Outbound calls to the explanation provider.

pub mod qianfan;
pub mod transport;

pub use qianfan::TranslationClient;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
