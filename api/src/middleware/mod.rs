pub mod cors;
pub mod security_headers;
pub mod sweep;
