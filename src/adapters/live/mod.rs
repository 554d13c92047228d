//! Live adapters that talk to the real provider over HTTP.

pub mod ark;
pub mod download;

#[cfg(test)]
mod test_server;
