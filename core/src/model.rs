//! Single-entity attribute container with change tracking and REST sync.
//!
//! # Design
//! A `Model<R>` owns its attributes privately; every mutation goes through
//! `set`, `unset` or `clear`. The resource type `R` supplies the static
//! per-entity hooks (endpoint, defaults, identity field, validation).
//!
//! Sync follows the host-does-IO split: `build_sync_request` produces an
//! `HttpRequest`, the context's `Transport` executes it, and
//! `parse_sync_response` interprets the `HttpResponse`. Both halves are
//! public so they can be tested without any transport.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde_json::Value;

use crate::config::Context;
use crate::error::{SyncError, ValidationError};
use crate::events::{Emitter, ModelEvent, SubscriptionId};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Attribute storage: field name to JSON value.
pub type Attributes = serde_json::Map<String, Value>;

/// Static description of one REST entity type.
pub trait Resource: 'static {
    /// Base path of the entity's REST collection, e.g. `"/users"`.
    fn endpoint() -> String;

    /// Path a `Collection` of this resource fetches from.
    fn collection_endpoint() -> String {
        Self::endpoint()
    }

    /// Attributes every new model starts with, under any initial data.
    fn defaults() -> Attributes {
        Attributes::new()
    }

    /// Identity field override; `None` defers to the configuration.
    fn id_attribute() -> Option<String> {
        None
    }

    fn validate(_attributes: &Attributes) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Run `Resource::validate` against the merged candidate first.
    pub validate: bool,
}

impl SetOptions {
    pub fn validated() -> Self {
        Self { validate: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityOptions {
    /// Do not touch `validation_error`.
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    pub validate: bool,
    pub headers: BTreeMap<String, String>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            validate: true,
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Replaces `Resource::endpoint` for this call.
    pub endpoint: Option<String>,
    /// Overlaid on the configured headers for this call.
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloneOptions {
    pub keep_id: bool,
}

/// One REST entity of resource `R`.
///
/// Holds the attribute map with per-`set` change tracking and the validation
/// gate, and syncs through the shared [`Context`].
pub struct Model<R> {
    context: Context,
    attributes: Attributes,
    changed: Attributes,
    previous: Attributes,
    validation_error: Option<ValidationError>,
    events: Emitter<ModelEvent>,
    resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Model<R> {
    pub fn new(context: Context) -> Self {
        Self::with_attributes(context, Attributes::new())
    }

    /// Create a model whose attributes are `R::defaults()` overlaid with
    /// `attributes`. Initial data is not recorded as a change.
    pub fn with_attributes(context: Context, attributes: Attributes) -> Self {
        let mut merged = R::defaults();
        merged.extend(attributes);
        Self {
            context,
            attributes: merged,
            changed: Attributes::new(),
            previous: Attributes::new(),
            validation_error: None,
            events: Emitter::new(),
            resource: PhantomData,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// True when `key` holds anything other than `null`.
    pub fn has(&self, key: &str) -> bool {
        !matches!(self.attributes.get(key), None | Some(Value::Null))
    }

    /// Merge `attrs` into the model.
    ///
    /// With `options.validate`, a failing candidate sets
    /// `validation_error` and returns false with nothing else touched.
    /// Otherwise `changed` becomes exactly `attrs` and `previous` the
    /// prior values of those keys; neither accumulates across calls.
    pub fn set(&mut self, attrs: Attributes, options: SetOptions) -> bool {
        if options.validate {
            let mut candidate = self.attributes.clone();
            candidate.extend(attrs.clone());
            if let Err(err) = R::validate(&candidate) {
                tracing::trace!(target: "restbind::model", error = %err, "set rejected by validation");
                self.validation_error = Some(err);
                return false;
            }
        }

        self.validation_error = None;
        let previous: Attributes = attrs
            .keys()
            .filter_map(|key| self.attributes.get(key).map(|v| (key.clone(), v.clone())))
            .collect();
        self.previous = previous;
        self.attributes.extend(attrs.clone());
        self.changed = attrs;
        self.events.emit(&ModelEvent::Change {
            changed: self.changed.clone(),
        });
        true
    }

    pub fn set_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        options: SetOptions,
    ) -> bool {
        let mut attrs = Attributes::new();
        attrs.insert(key.into(), value.into());
        self.set(attrs, options)
    }

    /// Remove `key` entirely. Not recorded in `changed`/`previous`.
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        let removed = self.attributes.remove(key);
        if removed.is_some() {
            self.events.emit(&ModelEvent::Unset {
                key: key.to_string(),
            });
        }
        removed
    }

    /// Drop every attribute, the identity field included.
    pub fn clear(&mut self) {
        self.attributes = Attributes::new();
        self.events.emit(&ModelEvent::Clear);
    }

    /// Name of the identity field, read from the configuration on each
    /// call unless the resource overrides it.
    pub fn id_attribute(&self) -> String {
        R::id_attribute().unwrap_or_else(|| self.context.id_attribute())
    }

    /// The identity value, if it is a non-empty string or a number.
    pub fn id(&self) -> Option<&Value> {
        self.attributes
            .get(&self.id_attribute())
            .filter(|value| match value {
                Value::String(s) => !s.is_empty(),
                Value::Number(_) => true,
                _ => false,
            })
    }

    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Validate the current attributes.
    pub fn is_valid(&mut self, options: ValidityOptions) -> bool {
        let result = R::validate(&self.attributes);
        let valid = result.is_ok();
        if !options.silent {
            self.validation_error = result.err();
        }
        valid
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.validation_error.as_ref()
    }

    /// Keys and values applied by the most recent `set`.
    pub fn changed(&self) -> &Attributes {
        &self.changed
    }

    /// Values the keys in `changed` held before the most recent `set`.
    /// Keys that did not exist before are absent.
    pub fn previous(&self) -> &Attributes {
        &self.previous
    }

    pub fn has_changed(&self, key: &str) -> bool {
        self.changed.contains_key(key)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// A new model of the same resource with a copy of the attributes.
    ///
    /// The identity field is dropped unless `options.keep_id` is set.
    /// Change tracking and listeners start empty.
    pub fn clone_with(&self, options: CloneOptions) -> Self {
        let mut attributes = self.attributes.clone();
        if !options.keep_id {
            attributes.remove(&self.id_attribute());
        }
        Self {
            context: self.context.clone(),
            attributes,
            changed: Attributes::new(),
            previous: Attributes::new(),
            validation_error: None,
            events: Emitter::new(),
            resource: PhantomData,
        }
    }

    /// Resource URL: origin, endpoint, then `/{id}` when not new.
    pub fn url(&self) -> String {
        self.resolve_url(None)
    }

    fn resolve_url(&self, endpoint: Option<&str>) -> String {
        let endpoint = endpoint.map_or_else(R::endpoint, str::to_string);
        let mut url = format!("{}{}", self.context.origin(), endpoint);
        match self.id() {
            Some(Value::String(id)) => {
                url.push('/');
                url.push_str(id);
            }
            Some(id) => {
                url.push('/');
                url.push_str(&id.to_string());
            }
            None => {}
        }
        url
    }

    pub fn build_sync_request(
        &self,
        method: HttpMethod,
        body: Option<&Value>,
        options: &SyncOptions,
    ) -> Result<HttpRequest, SyncError> {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            url: self.resolve_url(options.endpoint.as_deref()),
            headers: self.context.headers_with(&options.headers),
            body,
        })
    }

    /// Interpret a sync response: `None` for 204, parsed JSON otherwise.
    pub fn parse_sync_response(response: HttpResponse) -> Result<Option<Value>, SyncError> {
        check_status(&response)?;
        if response.is_empty_body() {
            return Ok(None);
        }
        serde_json::from_str(&response.body)
            .map(Some)
            .map_err(|e| SyncError::Deserialization(e.to_string()))
    }

    /// One request/response round-trip for this model.
    pub async fn sync(
        &self,
        method: HttpMethod,
        body: Option<&Value>,
        options: &SyncOptions,
    ) -> Result<Option<Value>, SyncError> {
        let request = self.build_sync_request(method, body, options)?;
        tracing::debug!(target: "restbind::model", method = %request.method, url = %request.url, "sync");
        let response = self.context.transport().send(request).await?;
        Self::parse_sync_response(response)
    }

    /// GET the resource and `set` an object response (unvalidated).
    pub async fn fetch(&mut self) -> Result<(), SyncError> {
        let response = self.sync(HttpMethod::Get, None, &SyncOptions::default()).await?;
        if let Some(Value::Object(attrs)) = response {
            self.set(attrs, SetOptions::default());
        }
        Ok(())
    }

    /// POST (new) or PUT (has identity) the full attribute snapshot.
    ///
    /// Returns `Ok(false)` without any request when validation fails. An
    /// object response is merged without validation or change tracking.
    pub async fn save(&mut self, options: SaveOptions) -> Result<bool, SyncError> {
        if options.validate && !self.is_valid(ValidityOptions::default()) {
            return Ok(false);
        }

        let method = if self.is_new() {
            HttpMethod::Post
        } else {
            HttpMethod::Put
        };
        let body = Value::Object(self.attributes.clone());
        let sync_options = SyncOptions {
            endpoint: None,
            headers: options.headers,
        };
        let response = self.sync(method, Some(&body), &sync_options).await?;

        if let Some(Value::Object(attrs)) = response {
            tracing::debug!(target: "restbind::model", fields = attrs.len(), "merging save response");
            self.attributes.extend(attrs);
            self.events.emit(&ModelEvent::Sync);
        }
        Ok(true)
    }

    /// DELETE the resource if it has an identity; returns whether a
    /// request was made. Attributes are left as they were.
    pub async fn destroy(&self) -> Result<bool, SyncError> {
        if self.is_new() {
            return Ok(false);
        }
        self.sync(HttpMethod::Delete, None, &SyncOptions::default())
            .await?;
        Ok(true)
    }

    pub fn to_json(&self) -> Attributes {
        self.attributes.clone()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl<R> serde::Serialize for Model<R> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.attributes, serializer)
    }
}

impl<R> std::fmt::Debug for Model<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("resource", &std::any::type_name::<R>())
            .field("attributes", &self.attributes)
            .field("validation_error", &self.validation_error)
            .finish_non_exhaustive()
    }
}

fn check_status(response: &HttpResponse) -> Result<(), SyncError> {
    if response.is_success() {
        return Ok(());
    }
    tracing::warn!(target: "restbind::model", status = response.status, "sync returned non-success status");
    Err(SyncError::Status {
        status: response.status,
        status_text: response.status_text.clone(),
    })
}
