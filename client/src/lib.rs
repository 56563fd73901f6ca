//! Native client for the marketplace REST API.
//!
//! | Module | Role |
//! |--------|------|
//! | [`api`] | The transport trait and its HTTP implementation |
//! | [`driver`] | Connects the wizard core to a transport, with local fallback |
//! | [`resources`] | Thin list/read/create wrappers for marketplace resources |
//! | [`store`] | Session-state stores backing the wizard's persistence |

pub mod api;
pub mod driver;
pub mod resources;
pub mod store;

pub use api::{Api, ApiError, HttpApi, OfflineApi};
pub use driver::WizardDriver;
pub use resources::{Resource, ResourceClient};
pub use store::JsonFileStore;
