//! Module that serializes a generic `HashMap` with its entries sorted by key,
//! so that persisted JSON is stable across runs.

use std::{collections::HashMap, hash::Hash};

use itertools::Itertools;
use serde::{Serialize, Serializer};

/// Serialize a `HashMap` sorted by its keys.
///
/// Example:
/// ```ignore
/// #[serde(serialize_with = "dorn_utils::serde::ordered::serialize")]
/// pub clients: HashMap<u32, ClientCounters>,
/// ```
pub fn serialize<K, V, S>(map: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    K: Serialize + Ord + Hash,
    V: Serialize,
    S: Serializer,
{
    serializer.collect_map(map.iter().sorted_by(|(k, _), (k2, _)| k.cmp(k2)))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use serde::Serialize;

    #[derive(Serialize)]
    struct Wrapper {
        #[serde(serialize_with = "super::serialize")]
        inner: HashMap<u32, &'static str>,
    }

    #[test]
    fn test_sorted_keys() {
        let wrapper = Wrapper {
            inner: HashMap::from_iter([(3, "c"), (1, "a"), (2, "b")]),
        };
        let json = serde_json::to_string(&wrapper).unwrap();
        assert_eq!(json, r#"{"inner":{"1":"a","2":"b","3":"c"}}"#);
    }
}
