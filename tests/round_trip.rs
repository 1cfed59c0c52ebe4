// Copyright 2015-2024 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::join;
use tokio::time::timeout;
use url::Url;

use driftwire::{
    cancellation, decode, encode, CustomPassthrough, CustomRef, DecodeOptions, DecodePlugin,
    Decoded, Deferred, EncodeOptions, PluginError, RecordRef, SeqRef, Symbol, Timestamp, Value,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

async fn round_trip_with(
    value: Value,
    encode_options: EncodeOptions,
    decode_options: DecodeOptions,
) -> Value {
    let (tx, rx) = tokio::io::duplex(1 << 16);
    let encode_task = encode(&value, tx, encode_options);
    let decode_task = async move {
        let Decoded { value, done } = decode(rx, decode_options).await.expect("Decoding failed.");
        done.await.expect("The stream did not terminate cleanly.");
        value
    };
    let (sent, received) = timeout(TEST_TIMEOUT, async { join!(encode_task, decode_task) })
        .await
        .expect("Test timed out.");
    sent.expect("Encoding failed.");
    received
}

async fn round_trip(value: Value) -> Value {
    round_trip_with(value, EncodeOptions::default(), DecodeOptions::default()).await
}

#[tokio::test]
async fn atoms_round_trip() {
    assert_eq!(round_trip(Value::Absent).await, Value::Absent);
    assert_eq!(round_trip(Value::Null).await, Value::Null);
    assert_eq!(round_trip(Value::Bool(true)).await, Value::Bool(true));
    assert_eq!(round_trip(Value::Bool(false)).await, Value::Bool(false));
    assert_eq!(
        round_trip(Value::Number(f64::INFINITY)).await,
        Value::Number(f64::INFINITY)
    );
    assert_eq!(
        round_trip(Value::Number(f64::NEG_INFINITY)).await,
        Value::Number(f64::NEG_INFINITY)
    );
}

#[tokio::test]
async fn nan_is_observably_nan() {
    match round_trip(Value::Number(f64::NAN)).await {
        Value::Number(n) => assert!(n.is_nan()),
        other => panic!("Unexpected value: {:?}", other),
    }
}

#[tokio::test]
async fn negative_zero_keeps_its_sign() {
    match round_trip(Value::Number(-0.0)).await {
        Value::Number(n) => assert!(n == 0.0 && n.is_sign_negative()),
        other => panic!("Unexpected value: {:?}", other),
    }
}

#[tokio::test]
async fn numbers_round_trip_exactly() {
    for number in [0.0, 0.5, -12345.678, 0.1 + 0.2, 1e300, 4503599627370497.0] {
        assert_eq!(round_trip(Value::Number(number)).await, Value::Number(number));
    }
}

#[tokio::test]
async fn scalars_round_trip() {
    let big: num_bigint::BigInt = "-123456789012345678901234567890".parse().unwrap();
    assert_eq!(
        round_trip(Value::BigInt(big.clone())).await,
        Value::BigInt(big)
    );
    assert_eq!(round_trip(Value::text("")).await, Value::text(""));
    assert_eq!(
        round_trip(Value::text("line\nbreak \"quoted\" é😀")).await,
        Value::text("line\nbreak \"quoted\" é😀")
    );
    assert_eq!(
        round_trip(Value::pattern("a+(b|c)", "gi")).await,
        Value::pattern("a+(b|c)", "gi")
    );
    let url = Url::parse("https://example.com/path?q=1").unwrap();
    assert_eq!(round_trip(Value::url(url.clone())).await, Value::url(url));
    let now = Timestamp::now();
    assert_eq!(
        round_trip(Value::Timestamp(now)).await,
        Value::Timestamp(now)
    );
}

#[tokio::test]
async fn symbols_round_trip_into_the_interned_name() {
    let decoded = round_trip(Value::symbol("router")).await;
    match decoded {
        Value::Symbol(symbol) => {
            assert_eq!(symbol, Symbol::new("router"));
            assert!(std::ptr::eq(symbol.name(), Symbol::new("router").name()));
        }
        other => panic!("Unexpected value: {:?}", other),
    }
}

#[tokio::test]
async fn containers_round_trip() {
    let value = Value::record(vec![
        ("numbers", Value::seq(vec![Value::number(1.0), Value::number(2.0)])),
        ("flag", Value::Bool(true)),
        ("error", Value::error("TypeError", "boom")),
        (
            "set",
            Value::set(vec![Value::text("a"), Value::text("b")]),
        ),
    ]);
    assert_eq!(round_trip(value.clone()).await, value);
}

#[tokio::test]
async fn mapping_keys_may_be_values() {
    let value = Value::map(vec![
        (Value::seq(vec![Value::number(1.0)]), Value::text("one")),
        (Value::Bool(true), Value::number(2.0)),
    ]);
    assert_eq!(round_trip(value.clone()).await, value);
}

#[tokio::test]
async fn sequence_holes_stay_absent() {
    let seq = SeqRef::new();
    seq.push(Value::number(1.0));
    seq.push_hole();
    seq.push(Value::number(3.0));
    let decoded = match round_trip(Value::Seq(seq)).await {
        Value::Seq(seq) => seq,
        other => panic!("Unexpected value: {:?}", other),
    };
    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded.get(0), Some(Some(Value::number(1.0))));
    assert_eq!(decoded.get(1), Some(None));
    assert_eq!(decoded.get(2), Some(Some(Value::number(3.0))));
}

#[tokio::test]
async fn absent_valued_keys_stay_present() {
    let decoded = match round_trip(Value::record(vec![("foo", Value::Absent)])).await {
        Value::Record(record) => record,
        other => panic!("Unexpected value: {:?}", other),
    };
    assert!(decoded.contains_key("foo"));
    assert_eq!(decoded.get("foo"), Some(Value::Absent));
}

#[tokio::test]
async fn shared_children_keep_their_identity() {
    let child = Value::seq(vec![Value::number(1.0)]);
    let value = Value::record(vec![("a", child.clone()), ("b", child)]);
    let decoded = match round_trip(value).await {
        Value::Record(record) => record,
        other => panic!("Unexpected value: {:?}", other),
    };
    match (decoded.get("a"), decoded.get("b")) {
        (Some(Value::Seq(left)), Some(Value::Seq(right))) => {
            assert!(SeqRef::same(&left, &right));
        }
        other => panic!("Unexpected entries: {:?}", other),
    }
}

#[tokio::test]
async fn self_referential_records_round_trip() {
    let record = RecordRef::new();
    let value = Value::Record(record.clone());
    record.insert("self", value.clone());
    record.insert("name", Value::text("loop"));
    let decoded = match round_trip(value).await {
        Value::Record(record) => record,
        other => panic!("Unexpected value: {:?}", other),
    };
    match decoded.get("self") {
        Some(Value::Record(inner)) => assert!(RecordRef::same(&decoded, &inner)),
        other => panic!("Unexpected entry: {:?}", other),
    }
    assert_eq!(decoded.get("name"), Some(Value::text("loop")));
}

struct CountingDecode(Arc<AtomicUsize>);

impl DecodePlugin for CountingDecode {
    fn decode(&self, tag: &str, fields: &[Value]) -> Result<Option<Value>, PluginError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Value::custom(tag, fields.to_vec())))
    }
}

#[tokio::test]
async fn custom_values_round_trip_through_plugins() {
    let custom = Value::custom("point", vec![Value::number(1.0), Value::number(2.0)]);
    let value = Value::seq(vec![custom.clone(), custom]);
    let calls = Arc::new(AtomicUsize::new(0));
    let encode_options = EncodeOptions {
        plugins: vec![Box::new(CustomPassthrough)],
        signal: None,
    };
    let decode_options = DecodeOptions {
        plugins: vec![Box::new(CountingDecode(calls.clone()))],
        signal: None,
    };
    let decoded = match round_trip_with(value, encode_options, decode_options).await {
        Value::Seq(seq) => seq,
        other => panic!("Unexpected value: {:?}", other),
    };
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match (decoded.get(0), decoded.get(1)) {
        (Some(Some(Value::Custom(left))), Some(Some(Value::Custom(right)))) => {
            assert!(CustomRef::same(&left, &right));
            assert_eq!(left.tag(), "point");
            assert_eq!(
                left.fields(),
                &[Value::number(1.0), Value::number(2.0)]
            );
        }
        other => panic!("Unexpected items: {:?}", other),
    }
}

#[tokio::test]
async fn fulfilled_deferred_at_the_root() {
    let value = Value::Deferred(Deferred::fulfilled(Value::number(42.0)));
    let (tx, rx) = tokio::io::duplex(1 << 16);
    let decode_task = async move {
        let Decoded { value, done } = decode(rx, DecodeOptions::default())
            .await
            .expect("Decoding failed.");
        let deferred = match value {
            Value::Deferred(deferred) => deferred,
            other => panic!("Unexpected value: {:?}", other),
        };
        done.await.expect("The stream did not terminate cleanly.");
        assert_eq!(deferred.try_settled(), Some(Ok(Value::number(42.0))));
    };
    let (sent, _) = timeout(TEST_TIMEOUT, async {
        join!(encode(&value, tx, EncodeOptions::default()), decode_task)
    })
    .await
    .expect("Test timed out.");
    sent.expect("Encoding failed.");
}

#[tokio::test]
async fn rejected_deferred_at_the_root() {
    let value = Value::Deferred(Deferred::rejected(Value::error("TypeError", "boom")));
    let (tx, rx) = tokio::io::duplex(1 << 16);
    let decode_task = async move {
        let Decoded { value, done } = decode(rx, DecodeOptions::default())
            .await
            .expect("Decoding failed.");
        let deferred = match value {
            Value::Deferred(deferred) => deferred,
            other => panic!("Unexpected value: {:?}", other),
        };
        done.await.expect("The stream did not terminate cleanly.");
        assert_eq!(
            deferred.try_settled(),
            Some(Err(Value::error("TypeError", "boom")))
        );
    };
    let (sent, _) = timeout(TEST_TIMEOUT, async {
        join!(encode(&value, tx, EncodeOptions::default()), decode_task)
    })
    .await
    .expect("Test timed out.");
    sent.expect("Encoding failed.");
}

#[tokio::test]
async fn one_frame_settles_every_occurrence() {
    let (deferred, completer) = Deferred::new();
    let value = Value::record(vec![
        ("a", Value::Deferred(deferred.clone())),
        ("b", Value::Deferred(deferred)),
    ]);
    let (tx, rx) = tokio::io::duplex(1 << 16);
    let decode_task = async move {
        let Decoded { value, done } = decode(rx, DecodeOptions::default())
            .await
            .expect("Decoding failed.");
        let record = match value {
            Value::Record(record) => record,
            other => panic!("Unexpected value: {:?}", other),
        };
        let (first, second) = match (record.get("a"), record.get("b")) {
            (Some(Value::Deferred(first)), Some(Value::Deferred(second))) => (first, second),
            other => panic!("Unexpected entries: {:?}", other),
        };
        assert!(Deferred::same(&first, &second));
        assert!(first.is_pending());
        completer.fulfill(Value::number(5.0));
        let (done_result, settled) = join!(done, first.settled());
        done_result.expect("The stream did not terminate cleanly.");
        assert_eq!(settled, Ok(Value::number(5.0)));
        assert_eq!(second.try_settled(), Some(Ok(Value::number(5.0))));
    };
    let (sent, _) = timeout(TEST_TIMEOUT, async {
        join!(encode(&value, tx, EncodeOptions::default()), decode_task)
    })
    .await
    .expect("Test timed out.");
    sent.expect("Encoding failed.");
}

#[tokio::test]
async fn nested_deferred_is_observable_before_it_settles() {
    let (deferred, completer) = Deferred::new();
    let value = Value::seq(vec![Value::text("head"), Value::Deferred(deferred)]);
    let (tx, rx) = tokio::io::duplex(1 << 16);
    let decode_task = async move {
        let Decoded { value, done } = decode(rx, DecodeOptions::default())
            .await
            .expect("Decoding failed.");
        let seq = match value {
            Value::Seq(seq) => seq,
            other => panic!("Unexpected value: {:?}", other),
        };
        let placeholder = match seq.get(1) {
            Some(Some(Value::Deferred(placeholder))) => placeholder,
            other => panic!("Unexpected item: {:?}", other),
        };
        assert!(placeholder.is_pending());
        completer.fulfill(Value::text("late"));
        let (done_result, settled) = join!(done, placeholder.settled());
        done_result.expect("The stream did not terminate cleanly.");
        assert_eq!(settled, Ok(Value::text("late")));
    };
    let (sent, _) = timeout(TEST_TIMEOUT, async {
        join!(encode(&value, tx, EncodeOptions::default()), decode_task)
    })
    .await
    .expect("Test timed out.");
    sent.expect("Encoding failed.");
}

#[tokio::test]
async fn deferreds_may_resolve_to_deferreds() {
    let (inner, inner_completer) = Deferred::new();
    let outer = Deferred::fulfilled(Value::Deferred(inner));
    let value = Value::Deferred(outer);
    let (tx, rx) = tokio::io::duplex(1 << 16);
    let decode_task = async move {
        let Decoded { value, done } = decode(rx, DecodeOptions::default())
            .await
            .expect("Decoding failed.");
        let placeholder = match value {
            Value::Deferred(placeholder) => placeholder,
            other => panic!("Unexpected value: {:?}", other),
        };
        inner_completer.fulfill(Value::number(7.0));
        done.await.expect("The stream did not terminate cleanly.");
        let nested = match placeholder.try_settled() {
            Some(Ok(Value::Deferred(nested))) => nested,
            other => panic!("Unexpected settlement: {:?}", other),
        };
        assert_eq!(nested.try_settled(), Some(Ok(Value::number(7.0))));
    };
    let (sent, _) = timeout(TEST_TIMEOUT, async {
        join!(encode(&value, tx, EncodeOptions::default()), decode_task)
    })
    .await
    .expect("Test timed out.");
    sent.expect("Encoding failed.");
}

#[tokio::test]
async fn cancellation_rejects_the_decoded_deferred() {
    let (encode_handle, encode_signal) = cancellation();
    let (decode_handle, decode_signal) = cancellation();
    let (deferred, _completer) = Deferred::new();
    let value = Value::record(vec![("p", Value::Deferred(deferred))]);
    let (tx, rx) = tokio::io::duplex(1 << 16);
    let encode_task = encode(
        &value,
        tx,
        EncodeOptions {
            plugins: vec![],
            signal: Some(encode_signal),
        },
    );
    let decode_task = async move {
        let Decoded { value, done } = decode(
            rx,
            DecodeOptions {
                plugins: vec![],
                signal: Some(decode_signal),
            },
        )
        .await
        .expect("Decoding failed.");
        let placeholder = match value {
            Value::Record(record) => match record.get("p") {
                Some(Value::Deferred(placeholder)) => placeholder,
                other => panic!("Unexpected entry: {:?}", other),
            },
            other => panic!("Unexpected value: {:?}", other),
        };
        assert!(placeholder.is_pending());
        decode_handle.cancel(Value::text("stop"));
        encode_handle.cancel(Value::text("stop"));
        let (done_result, settled) = join!(done, placeholder.settled());
        done_result.expect("Cancellation after the root should complete the driver.");
        assert_eq!(settled, Err(Value::text("stop")));
    };
    let (sent, _) = timeout(TEST_TIMEOUT, async { join!(encode_task, decode_task) })
        .await
        .expect("Test timed out.");
    sent.expect("Encoding failed.");
}

#[tokio::test]
async fn errors_round_trip_with_kind_and_message() {
    let decoded = round_trip(Value::error("RangeError", "out of range")).await;
    match decoded {
        Value::Error(error) => {
            assert_eq!(error.kind(), "RangeError");
            assert_eq!(error.message(), "out of range");
        }
        other => panic!("Unexpected value: {:?}", other),
    }
}

#[tokio::test]
async fn deeply_shared_structure_is_rebuilt_once() {
    let leaf = Value::seq(vec![Value::text("leaf")]);
    let left = Value::seq(vec![leaf.clone()]);
    let right = Value::seq(vec![leaf]);
    let value = Value::seq(vec![left, right]);
    let decoded = match round_trip(value).await {
        Value::Seq(seq) => seq,
        other => panic!("Unexpected value: {:?}", other),
    };
    let leaf_of = |branch: Option<Option<Value>>| match branch {
        Some(Some(Value::Seq(seq))) => match seq.get(0) {
            Some(Some(Value::Seq(leaf))) => leaf,
            other => panic!("Unexpected leaf: {:?}", other),
        },
        other => panic!("Unexpected branch: {:?}", other),
    };
    let first = leaf_of(decoded.get(0));
    let second = leaf_of(decoded.get(1));
    assert!(SeqRef::same(&first, &second));
}
