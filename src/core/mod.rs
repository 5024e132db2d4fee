pub mod bus;
pub mod codec;
pub mod host;
pub mod links;
pub mod markup;
pub(crate) mod scope;
pub mod script;
pub mod state;
pub mod store;
pub mod story;
