//! Every adapter against a mock of its vendor's wire protocol.

mod generation_e2e;
mod providers;
