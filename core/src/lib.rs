//! Backbone-style models and collections synchronized over JSON REST.
//!
//! # Overview
//! A [`Model`] holds one entity's attributes with change tracking and a
//! validation gate; a [`Collection`] holds an ordered list of models with
//! client-side sorting. Both sync against a REST API through a shared
//! [`Context`] carrying the origin, default headers and a [`Transport`].
//!
//! # Design
//! - The core performs no I/O itself: requests and responses are plain
//!   data ([`HttpRequest`], [`HttpResponse`]) and the round-trip is delegated
//!   to the injected `Transport`.
//! - Per-entity behaviour (endpoint, defaults, identity field, validation)
//!   lives on the [`Resource`] trait.
//! - Configuration is shared by reference through `Context` clones and read
//!   on every call, so reconfiguring affects existing instances.
//! - Mutations fire [`ModelEvent`] / [`CollectionEvent`] for UI bindings.

pub mod collection;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod model;

#[cfg(test)]
pub(crate) mod testing;

pub use collection::{compare_values, Collection, Comparator, FetchOptions};
pub use config::{Config, ConfigUpdate, Context};
pub use error::{CollectionFetchError, SyncError, TransportError, ValidationError};
pub use events::{CollectionEvent, Emitter, ModelEvent, SubscriptionId};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use model::{
    Attributes, CloneOptions, Model, Resource, SaveOptions, SetOptions, SyncOptions,
    ValidityOptions,
};
