//! Ordered container of models with sorting and bulk fetch.
//!
//! # Design
//! Raw rows become `Model<R>` through `Model::with_attributes`, so every item
//! is an instance of the bound resource. `reset` and `fetch` rebuild the item
//! list wholesale; `add` appends. Whenever a comparator is set, every `add`
//! and `reset` re-sorts with a stable sort.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Context;
use crate::error::CollectionFetchError;
use crate::events::{CollectionEvent, Emitter, SubscriptionId};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::model::{Attributes, Model, Resource};

type KeyFn<R> = dyn Fn(&Model<R>) -> Value + Send + Sync;
type CompareFn<R> = dyn Fn(&Model<R>, &Model<R>) -> Ordering + Send + Sync;

/// How a collection orders its items.
pub enum Comparator<R> {
    /// Ascending by the value of one attribute.
    Field(String),
    /// Ascending by a key computed per model.
    Key(Arc<KeyFn<R>>),
    /// Pairwise comparison used as-is.
    Compare(Arc<CompareFn<R>>),
}

impl<R> Comparator<R> {
    pub fn field(name: impl Into<String>) -> Self {
        Comparator::Field(name.into())
    }

    pub fn key<F>(key: F) -> Self
    where
        F: Fn(&Model<R>) -> Value + Send + Sync + 'static,
    {
        Comparator::Key(Arc::new(key))
    }

    pub fn compare<F>(compare: F) -> Self
    where
        F: Fn(&Model<R>, &Model<R>) -> Ordering + Send + Sync + 'static,
    {
        Comparator::Compare(Arc::new(compare))
    }
}

impl<R> Clone for Comparator<R> {
    fn clone(&self) -> Self {
        match self {
            Comparator::Field(name) => Comparator::Field(name.clone()),
            Comparator::Key(key) => Comparator::Key(Arc::clone(key)),
            Comparator::Compare(compare) => Comparator::Compare(Arc::clone(compare)),
        }
    }
}

impl<R> std::fmt::Debug for Comparator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::Field(name) => f.debug_tuple("Field").field(name).finish(),
            Comparator::Key(_) => f.write_str("Key(..)"),
            Comparator::Compare(_) => f.write_str("Compare(..)"),
        }
    }
}

/// Native ordering of attribute values.
///
/// Numbers compare numerically, strings lexicographically, booleans with
/// `false < true`. Values of different types order by type: null (or
/// missing), booleans, numbers, strings, then arrays and objects, which
/// all compare equal.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    /// Query parameters, in order. Values are stringified the way a browser
    /// would coerce them (arrays join their elements with `,`, objects become
    /// `[object Object]`, `null` becomes `null`) and then URL-encoded.
    pub search: Vec<(String, Value)>,
    pub headers: BTreeMap<String, String>,
}

impl FetchOptions {
    pub fn search(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.search.push((key.into(), value.into()));
        self
    }
}

/// An ordered set of [`Model`]s for resource `R`, kept sorted by an
/// optional [`Comparator`] and refilled wholesale by [`Collection::fetch`].
pub struct Collection<R> {
    context: Context,
    items: Vec<Model<R>>,
    comparator: Option<Comparator<R>>,
    events: Emitter<CollectionEvent>,
}

impl<R: Resource> Collection<R> {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            items: Vec::new(),
            comparator: None,
            events: Emitter::new(),
        }
    }

    /// Create a collection and `reset` it with `data`.
    pub fn with_data(context: Context, data: Vec<Attributes>) -> Self {
        let mut collection = Self::new(context);
        collection.reset(data);
        collection
    }

    pub fn with_comparator(mut self, comparator: Comparator<R>) -> Self {
        self.set_comparator(Some(comparator));
        self
    }

    /// Replace the comparator and re-sort. `None` keeps the current order.
    pub fn set_comparator(&mut self, comparator: Option<Comparator<R>>) {
        self.comparator = comparator;
        self.sort();
    }

    pub fn comparator(&self) -> Option<&Comparator<R>> {
        self.comparator.as_ref()
    }

    /// Wrap `data` in a new model and insert it.
    pub fn add(&mut self, data: Attributes) -> &Model<R> {
        let model = Model::with_attributes(self.context.clone(), data);
        self.add_model(model)
    }

    /// Append `model`, re-sort, and return it at its sorted position.
    pub fn add_model(&mut self, model: Model<R>) -> &Model<R> {
        self.items.push(model);
        let index = self.apply_sort(self.items.len() - 1);
        self.events.emit(&CollectionEvent::Add { index });
        &self.items[index]
    }

    /// Replace every item with one model per row, in row order, then sort.
    pub fn reset(&mut self, data: Vec<Attributes>) {
        self.items = data
            .into_iter()
            .map(|row| Model::with_attributes(self.context.clone(), row))
            .collect();
        if !self.items.is_empty() {
            self.apply_sort(0);
        }
        self.events.emit(&CollectionEvent::Reset {
            len: self.items.len(),
        });
    }

    /// First model whose attributes equal every entry of `query`.
    ///
    /// Equality is exact JSON equality: `"2"` does not match `2`.
    pub fn find(&self, query: &Attributes) -> Option<&Model<R>> {
        self.items
            .iter()
            .find(|model| query.iter().all(|(key, value)| model.get(key) == Some(value)))
    }

    pub fn get(&self, index: usize) -> Option<&Model<R>> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Model<R>> {
        self.items.get_mut(index)
    }

    /// The model whose identity value equals `id`.
    pub fn get_by_id(&self, id: &Value) -> Option<&Model<R>> {
        self.items.iter().find(|model| model.id() == Some(id))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Model<R>> {
        self.items.iter()
    }

    pub fn models(&self) -> &[Model<R>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Re-apply the comparator, if any.
    pub fn sort(&mut self) {
        if self.comparator.is_some() && !self.items.is_empty() {
            self.apply_sort(0);
            self.events.emit(&CollectionEvent::Sort);
        }
    }

    /// Remove every model matching `predicate` and return them in order.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Model<R>>
    where
        F: FnMut(&Model<R>) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.items.drain(..).partition(|model| predicate(model));
        self.items = kept;
        if !removed.is_empty() {
            self.events.emit(&CollectionEvent::Remove {
                count: removed.len(),
            });
        }
        removed
    }

    pub fn to_json(&self) -> Vec<Value> {
        self.items
            .iter()
            .map(|model| Value::Object(model.to_json()))
            .collect()
    }

    /// GET request for the collection endpoint plus any search parameters.
    pub fn build_fetch_request(&self, options: &FetchOptions) -> HttpRequest {
        let mut url = format!("{}{}", self.context.origin(), R::collection_endpoint());
        if !options.search.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(
                    options
                        .search
                        .iter()
                        .map(|(key, value)| (key.as_str(), stringify(value))),
                )
                .finish();
            url.push('?');
            url.push_str(&query);
        }
        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: self.context.headers_with(&options.headers),
            body: None,
        }
    }

    /// Turn a list response into rows; 204 yields no rows.
    pub fn parse_fetch_response(
        response: HttpResponse,
    ) -> Result<Vec<Attributes>, CollectionFetchError> {
        if !response.is_success() {
            tracing::warn!(target: "restbind::collection", status = response.status, "fetch returned non-success status");
            return Err(CollectionFetchError::Status {
                status: response.status,
                status_text: response.status_text,
            });
        }
        if response.is_empty_body() {
            return Ok(Vec::new());
        }
        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| CollectionFetchError::Deserialization(e.to_string()))?;
        let Value::Array(rows) = body else {
            return Err(CollectionFetchError::UnexpectedBody(
                "expected a JSON array".to_string(),
            ));
        };
        rows.into_iter()
            .enumerate()
            .map(|(i, row)| match row {
                Value::Object(attrs) => Ok(attrs),
                _ => Err(CollectionFetchError::UnexpectedBody(format!(
                    "element {i} is not an object"
                ))),
            })
            .collect()
    }

    /// Fetch the collection and `reset` with the result.
    ///
    /// On error the current items are left untouched.
    pub async fn fetch(&mut self, options: FetchOptions) -> Result<(), CollectionFetchError> {
        let request = self.build_fetch_request(&options);
        tracing::debug!(target: "restbind::collection", url = %request.url, "fetch");
        let response = self.context.transport().send(request).await?;
        let rows = Self::parse_fetch_response(response)?;
        tracing::debug!(target: "restbind::collection", rows = rows.len(), "resetting from fetch");
        self.reset(rows);
        Ok(())
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&CollectionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Stable-sort by the comparator and return the new index of the item
    /// that was at `tracked`.
    fn apply_sort(&mut self, tracked: usize) -> usize {
        let Some(comparator) = &self.comparator else {
            return tracked;
        };

        let mut order: Vec<usize> = (0..self.items.len()).collect();
        match comparator {
            Comparator::Field(name) => {
                let keys: Vec<Value> = self
                    .items
                    .iter()
                    .map(|model| model.get(name).cloned().unwrap_or(Value::Null))
                    .collect();
                order.sort_by(|&a, &b| compare_values(&keys[a], &keys[b]));
            }
            Comparator::Key(key) => {
                let keys: Vec<Value> = self.items.iter().map(|model| key(model)).collect();
                order.sort_by(|&a, &b| compare_values(&keys[a], &keys[b]));
            }
            Comparator::Compare(compare) => {
                let items = &self.items;
                order.sort_by(|&a, &b| compare(&items[a], &items[b]));
            }
        }

        let position = order.iter().position(|&i| i == tracked).unwrap_or(tracked);
        let mut slots: Vec<Option<Model<R>>> = self.items.drain(..).map(Some).collect();
        self.items = order.into_iter().filter_map(|i| slots[i].take()).collect();
        position
    }
}

impl<R> std::fmt::Debug for Collection<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("items", &self.items)
            .field("comparator", &self.comparator)
            .finish_non_exhaustive()
    }
}

impl<'a, R: Resource> IntoIterator for &'a Collection<R> {
    type Item = &'a Model<R>;
    type IntoIter = std::slice::Iter<'a, Model<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => stringify(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}
