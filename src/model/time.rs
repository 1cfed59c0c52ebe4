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

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt::{Display, Formatter};

/// A UTC instant truncated to millisecond precision (the wire resolution).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Ord, PartialOrd, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl AsRef<DateTime<Utc>> for Timestamp {
    fn as_ref(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<TZ> From<DateTime<TZ>> for Timestamp
where
    TZ: TimeZone,
{
    fn from(dt: DateTime<TZ>) -> Self {
        let utc = dt.with_timezone(&Utc);
        let sub_millis = utc.timestamp_subsec_nanos() % 1_000_000;
        Timestamp(utc - Duration::nanoseconds(sub_millis as i64))
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl Timestamp {
    /// A timestamp for the current instant.
    pub fn now() -> Timestamp {
        Timestamp::from(Utc::now())
    }

    /// Reconstruct a timestamp from non-leap-milliseconds since January 1,
    /// 1970 UTC. Fails for instants outside the representable range.
    pub fn from_millis(millis: i64) -> Option<Timestamp> {
        Utc.timestamp_millis_opt(millis).single().map(Timestamp)
    }

    /// The number of non-leap-milliseconds since January 1, 1970 UTC.
    pub fn millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}
