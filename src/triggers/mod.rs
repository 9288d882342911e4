mod http;

pub use http::{notify, vapid_public_key, NotifyResponse, PublicKeyResponse};
