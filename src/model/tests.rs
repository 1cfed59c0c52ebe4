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

use futures::join;

use super::{Deferred, RecordRef, SeqRef, SetRef, Symbol, Timestamp, Value};

#[test]
fn record_insert_replaces_in_place() {
    let record = RecordRef::new();
    record.insert("a", Value::number(1.0));
    record.insert("b", Value::number(2.0));
    record.insert("a", Value::number(3.0));
    assert_eq!(record.keys(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(record.get("a"), Some(Value::number(3.0)));
}

#[test]
fn seq_tracks_holes() {
    let seq = SeqRef::new();
    seq.push(Value::number(1.0));
    seq.push_hole();
    seq.push(Value::number(3.0));
    assert_eq!(seq.len(), 3);
    assert_eq!(seq.get(1), Some(None));
    assert_eq!(seq.get(3), None);
}

#[test]
fn set_insert_rejects_duplicates() {
    let set = SetRef::new();
    assert!(set.insert(Value::text("a")));
    assert!(!set.insert(Value::text("a")));
    assert_eq!(set.len(), 1);
}

#[test]
fn map_keys_compare_structurally() {
    let map = Value::map(vec![(Value::seq(vec![Value::number(1.0)]), Value::text("one"))]);
    if let Value::Map(map) = map {
        map.insert(Value::seq(vec![Value::number(1.0)]), Value::text("uno"));
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(&Value::seq(vec![Value::number(1.0)])),
            Some(Value::text("uno"))
        );
    } else {
        panic!("Expected a map.");
    }
}

#[test]
fn clones_share_identity() {
    let value = Value::seq(vec![Value::number(1.0)]);
    let copy = value.clone();
    assert_eq!(value.identity(), copy.identity());
    if let (Value::Seq(left), Value::Seq(right)) = (&value, &copy) {
        assert!(SeqRef::same(left, right));
    } else {
        panic!("Expected sequences.");
    }
}

#[test]
fn scalars_carry_no_identity() {
    assert!(Value::number(1.0).identity().is_none());
    assert!(Value::text("a").identity().is_none());
    assert!(Value::Null.identity().is_none());
}

#[test]
fn symbols_intern_by_name() {
    let first = Symbol::new("router");
    let second = Symbol::new("router");
    assert_eq!(first, second);
    assert!(std::ptr::eq(first.name(), second.name()));
    assert_ne!(first, Symbol::new("routed"));
}

#[test]
fn timestamps_truncate_to_millis() {
    let now = Timestamp::now();
    assert_eq!(Timestamp::from_millis(now.millis()), Some(now));
}

#[test]
fn timestamp_far_out_of_range_rejected() {
    assert!(Timestamp::from_millis(i64::MAX).is_none());
}

#[test]
fn deferred_clones_share_settlement() {
    let (deferred, completer) = Deferred::new();
    let copy = deferred.clone();
    assert!(Deferred::same(&deferred, &copy));
    assert!(deferred.is_pending());
    completer.fulfill(Value::number(7.0));
    assert_eq!(copy.try_settled(), Some(Ok(Value::number(7.0))));
}

#[test]
fn deferred_rejection_carries_reason() {
    let deferred = Deferred::rejected(Value::text("no"));
    assert_eq!(deferred.try_settled(), Some(Err(Value::text("no"))));
}

#[test]
fn dropping_completer_rejects() {
    let (deferred, completer) = Deferred::new();
    drop(completer);
    match deferred.try_settled() {
        Some(Err(Value::Error(error))) => {
            assert_eq!(error.kind(), "AbandonedCompleter");
        }
        other => panic!("Unexpected settlement: {:?}", other),
    }
}

#[tokio::test]
async fn settlement_wakes_on_fulfillment() {
    let (deferred, completer) = Deferred::new();
    let (settled, _) = join!(deferred.settled(), async move {
        completer.fulfill(Value::text("done"));
    });
    assert_eq!(settled, Ok(Value::text("done")));
}

#[test]
fn structural_equality_with_identity_fast_path() {
    let shared = Value::seq(vec![Value::number(1.0)]);
    assert_eq!(shared, shared.clone());
    assert_eq!(
        Value::seq(vec![Value::number(1.0)]),
        Value::seq(vec![Value::number(1.0)])
    );
    assert_ne!(
        Value::seq(vec![Value::number(1.0)]),
        Value::seq(vec![Value::number(2.0)])
    );
    assert_eq!(
        Value::record(vec![("a", Value::Absent)]),
        Value::record(vec![("a", Value::Absent)])
    );
    assert_ne!(Value::Absent, Value::Null);
}

#[test]
fn distinct_deferreds_are_unequal() {
    let left = Value::Deferred(Deferred::fulfilled(Value::Null));
    let right = Value::Deferred(Deferred::fulfilled(Value::Null));
    assert_ne!(left, right);
    assert_eq!(left, left.clone());
}
