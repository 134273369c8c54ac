//! DNS provider API clients. Cloudflare is the only provider.

pub mod cloudflare;
