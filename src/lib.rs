// Library root
// -----------
// The binary (`main.rs`) wires these modules into the interactive CLI;
// the workflow itself is usable without any terminal.
//
// Module responsibilities:
// - `api`: HTTP calls to the key backend, Pinata, the mint backend,
//   Crossmint status and the OpenSea refresh endpoint.
// - `workflow`: the upload -> mint -> confirm sequence and its state.
// - `pending`: upload keys still waiting to be revoked.
// - `ui`: terminal form, spinner and result screens.
pub mod api;
pub mod config;
pub mod error;
pub mod logger;
pub mod pending;
pub mod ui;
pub mod workflow;

pub use error::{MintError, Result};
