//! Grouping-key helpers for keyed policies.

use crate::task::Task;

/// Group tasks by the JSON rendering of one parameter (missing parameters
/// group together under `null`).
pub fn by_parameter(index: usize) -> impl Fn(&Task) -> String + Send + Sync + Clone + 'static {
    move |task| match task.parameter(index) {
        Some(value) => value.to_string(),
        None => "null".to_string(),
    }
}

/// Group tasks by selector only.
pub fn by_selector() -> impl Fn(&Task) -> String + Send + Sync + Clone + 'static {
    |task| task.selector().to_string()
}

/// Group tasks by selector and one parameter.
pub fn by_selector_and_parameter(
    index: usize,
) -> impl Fn(&Task) -> String + Send + Sync + Clone + 'static {
    let param = by_parameter(index);
    move |task| format!("{}:{}", task.selector(), param(task))
}

/// Turn a key function into an exclusion relation: two tasks conflict when
/// their keys are equal.
pub fn same_key<K, F>(key: F) -> impl Fn(&Task, &Task) -> bool + Send + Sync + 'static
where
    K: PartialEq,
    F: Fn(&Task) -> K + Send + Sync + 'static,
{
    move |a, b| key(a) == key(b)
}
