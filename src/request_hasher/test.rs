use serde_json::json;

use super::*;

/// Request the golden assertion fixture was signed over. The challenge is a Node `Buffer`
/// serialized by `JSON.stringify`.
fn game_level_request() -> Value {
    json!({
        "levelId": 1234,
        "challenge": {
            "type": "Buffer",
            "data": [180, 247, 92, 34, 12, 88, 78, 108, 139, 50, 170, 9, 95, 240, 64, 55],
        },
        "action": "getGameLevel",
    })
}

#[test]
fn test_client_data_hash_matches_signed_request() {
    let hasher = RequestHasher::new();

    assert_eq!(
        hasher.hex_digest(&game_level_request()).unwrap(),
        "ef6c5b6fa9092de462bc53146d9e6d66a0b766e32e707ba73ced6f7bc76c49aa",
        "The generated hash does not match the expected value."
    );
}

#[test]
fn test_key_order_does_not_matter() {
    let hasher = RequestHasher::new();
    let body = r#"{"action":"getGameLevel","levelId":1234,"challenge":{"data":[180,247,92,34,12,88,78,108,139,50,170,9,95,240,64,55],"type":"Buffer"}}"#;

    assert_eq!(
        hasher.client_data_hash_from_str(body).unwrap(),
        hasher.client_data_hash(&game_level_request()).unwrap()
    );
}

#[test]
fn test_nested_objects_are_sorted() {
    let value = json!({
        "b": [{ "z": 1, "a": 2 }],
        "a": { "d": null, "c": true },
    });

    assert_eq!(
        serde_json::to_string(&sort_json(&value)).unwrap(),
        r#"{"a":{"c":true,"d":null},"b":[{"a":2,"z":1}]}"#
    );
}

#[test]
fn test_invalid_body() {
    assert!(RequestHasher::new().client_data_hash_from_str("{not json").is_err());
}
