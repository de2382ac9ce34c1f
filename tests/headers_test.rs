use std::collections::{BTreeMap, HashMap};
use xhrfetch::{FetchError, Headers, HeadersInit};

#[test]
fn test_set_then_get_returns_value() {
    let pairs = [
        ("Accept", "*/*"),
        ("x-request-id", "abc-123"),
        ("Cache-Control", "no-cache, no-store"),
        ("X-Empty", ""),
    ];
    let mut headers = Headers::new();
    for (name, value) in pairs {
        headers.set(name, value).unwrap();
        assert_eq!(headers.get(name), Some(value));
        assert_eq!(headers.get(&name.to_ascii_uppercase()), Some(value));
    }
}

#[test]
fn test_append_twice_joins() {
    let mut headers = Headers::new();
    headers.append("Vary", "v1").unwrap();
    headers.append("VARY", "v2").unwrap();
    assert_eq!(headers.get("vary"), Some("v1,v2"));
}

#[test]
fn test_append_onto_empty_value_replaces() {
    let mut headers = Headers::new();
    headers.append("X-A", "").unwrap();
    headers.append("X-A", "1").unwrap();
    assert_eq!(headers.get("x-a"), Some("1"));
}

#[test]
fn test_map_initializers() {
    let mut btree = BTreeMap::new();
    btree.insert("B-Header", "2");
    btree.insert("A-Header", "1");
    let headers = Headers::from_init(btree).unwrap();
    let keys: Vec<_> = headers.keys().collect();
    assert_eq!(keys, vec!["a-header", "b-header"]);

    let mut map = HashMap::new();
    map.insert("Only".to_string(), "one".to_string());
    let headers = Headers::try_from(HeadersInit::from(map)).unwrap();
    assert_eq!(headers.get("only"), Some("one"));
}

#[test]
fn test_invalid_initializer_propagates() {
    let err = Headers::from_init([("Good", "1"), ("Bad Name", "2")]).unwrap_err();
    assert_eq!(
        err,
        FetchError::InvalidHeaderName {
            name: "Bad Name".into()
        }
    );
}

#[test]
fn test_lookups_with_invalid_names_are_absent() {
    let mut headers = Headers::new();
    headers.append("X-A", "1").unwrap();
    assert_eq!(headers.get("X A"), None);
    assert!(!headers.has(""));
    headers.delete("bad name");
    assert_eq!(headers.len(), 1);
}

#[test]
fn test_iterators_exact_size() {
    let headers = Headers::from_init([("A", "1"), ("B", "2"), ("C", "3")]).unwrap();
    let mut entries = headers.entries();
    assert_eq!(entries.len(), 3);
    entries.next();
    assert_eq!(entries.len(), 2);
    let values: Vec<_> = headers.values().collect();
    assert_eq!(values, vec!["1", "2", "3"]);
}

#[test]
fn test_wire_entries_use_last_supplied_case() {
    let mut headers = Headers::new();
    headers.append("x-token", "a").unwrap();
    headers.append("X-Token", "b").unwrap();
    let wire: Vec<_> = headers.wire_entries().collect();
    assert_eq!(wire, vec![("X-Token", "a,b")]);
}
