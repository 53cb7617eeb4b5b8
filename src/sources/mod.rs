//! Datafile source implementations.

mod datafile_source;
mod transport;

pub use datafile_source::{DatafileSource, UrlBuilder};
pub use transport::{ReqwestTransport, ReqwestTransportBuilder, Transport, TransportResponse};
