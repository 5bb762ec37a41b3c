//! Integration tests: consensus scenarios, provider adapters over HTTP
//! and the resolution API.

mod mock_oracle;
mod scenarios;
