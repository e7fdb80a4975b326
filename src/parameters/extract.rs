//! Generic routines for extracting element properties into index-aligned tables.
//!
//! There is one routine per access pattern. Each returns a `Vec` with one entry per index of the
//! given [`IndexSpace`], in index order.
use crate::index::{IndexSpace, TimeIndex};
use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use std::borrow::Borrow;
use std::hash::Hash;

/// Look up the element named by every index of a space
fn elements_of<'a, K, T>(
    collection: &'a IndexMap<K, T>,
    space: &'a IndexSpace<String>,
) -> impl Iterator<Item = Result<&'a T>>
where
    K: Borrow<str> + Hash + Eq,
{
    space.iter().map(move |(_, name)| {
        collection
            .get(name.as_str())
            .with_context(|| format!("Unknown {} element {name}", space.name()))
    })
}

/// Extract a property stored directly on each element.
///
/// # Arguments
///
/// * `collection` - The network elements
/// * `space` - The index space of the elements
/// * `get` - Computes the property for a single element
pub fn element_prop<K, T, V, F>(
    collection: &IndexMap<K, T>,
    space: &IndexSpace<String>,
    get: F,
) -> Result<Vec<V>>
where
    K: Borrow<str> + Hash + Eq,
    F: Fn(&T) -> Result<V>,
{
    elements_of(collection, space)
        .map(|element| get(element?))
        .collect()
}

/// Extract a property inherited from each element's type.
///
/// # Arguments
///
/// * `collection` - The network elements
/// * `space` - The index space of the elements
/// * `types` - The element types
/// * `type_of` - The type ID of an element
/// * `get` - Computes the property for a single type
pub fn type_prop<K, T, TK, TT, V, FT, F>(
    collection: &IndexMap<K, T>,
    space: &IndexSpace<String>,
    types: &IndexMap<TK, TT>,
    type_of: FT,
    get: F,
) -> Result<Vec<V>>
where
    K: Borrow<str> + Hash + Eq,
    TK: Borrow<str> + Hash + Eq,
    FT: Fn(&T) -> &str,
    F: Fn(&TT) -> Result<V>,
{
    element_prop(collection, space, |element| {
        let type_id = type_of(element);
        let element_type = types
            .get(type_id)
            .with_context(|| format!("Unknown type {type_id} for {} element", space.name()))?;
        get(element_type)
    })
}

/// Extract an index-valued property: the index of the entity each element refers to, if any.
///
/// Fails if a referenced entity is not in `target`.
pub fn index_prop<K, T, F>(
    collection: &IndexMap<K, T>,
    space: &IndexSpace<String>,
    target: &IndexSpace<String>,
    get: F,
) -> Result<Vec<Option<usize>>>
where
    K: Borrow<str> + Hash + Eq,
    F: Fn(&T) -> Option<&str>,
{
    element_prop(collection, space, |element| {
        get(element).map(|name| target.index_of(name)).transpose()
    })
}

/// Extract an index-valued property through each element's type
pub fn type_index_prop<K, T, TK, TT, FT, F>(
    collection: &IndexMap<K, T>,
    space: &IndexSpace<String>,
    types: &IndexMap<TK, TT>,
    type_of: FT,
    target: &IndexSpace<String>,
    get: F,
) -> Result<Vec<Option<usize>>>
where
    K: Borrow<str> + Hash + Eq,
    TK: Borrow<str> + Hash + Eq,
    FT: Fn(&T) -> &str,
    F: Fn(&TT) -> Option<&str>,
{
    type_prop(collection, space, types, type_of, |element_type| {
        get(element_type)
            .map(|name| target.index_of(name))
            .transpose()
    })
}

/// Extract a property which is only set for some elements, keyed by element index
pub fn optional_prop<K, T, V, F>(
    collection: &IndexMap<K, T>,
    space: &IndexSpace<String>,
    get: F,
) -> Result<IndexMap<usize, V>>
where
    K: Borrow<str> + Hash + Eq,
    F: Fn(&T) -> Result<Option<V>>,
{
    let values = element_prop(collection, space, get)?;
    Ok(values
        .into_iter()
        .enumerate()
        .filter_map(|(idx, value)| value.map(|value| (idx, value)))
        .collect())
}

/// Resolve a collection of names into indices of `target`
pub fn indices_of<'a, I, S>(target: &IndexSpace<String>, names: I) -> Result<IndexSet<usize>>
where
    I: IntoIterator<Item = &'a S>,
    S: Borrow<str> + ?Sized + 'a,
{
    names
        .into_iter()
        .map(|name| target.index_of(name.borrow()))
        .collect()
}

/// Re-key a map by the indices of its keys in `target`, transforming the values
pub fn keyed_by_index<K, V, W, F>(
    target: &IndexSpace<String>,
    map: &IndexMap<K, V>,
    transform: F,
) -> Result<IndexMap<usize, W>>
where
    K: Borrow<str>,
    F: Fn(&V) -> Result<W>,
{
    map.iter()
        .map(|(key, value)| Ok((target.index_of(key.borrow())?, transform(value)?)))
        .collect()
}

/// Divide a monetary value by the money scale
pub fn scale(value: f64, money_scale: f64) -> f64 {
    value / money_scale
}

/// Divide every value of a monetary series by the money scale
pub fn scale_series(series: &[f64], money_scale: f64) -> Vec<f64> {
    series.iter().map(|value| scale(*value, money_scale)).collect()
}

/// Gather the sampled entries of a series which may be unset in some years
pub fn sample_optional(time: &TimeIndex, series: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
    time.slice(series)
}
