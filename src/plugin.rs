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

use thiserror::Error;

use crate::model::Value;

/// An encoder extension. Plugins are consulted in registration order for
/// every value before the built-in kind table, so a plugin may override a
/// built-in encoding. The first plugin to return parts wins.
pub trait EncodePlugin: Send + Sync {
    /// Claim `value` by returning a tag and its sub-values, or decline with
    /// `Ok(None)`.
    fn encode(&self, value: &Value) -> Result<Option<(String, Vec<Value>)>, PluginError>;
}

/// A decoder extension. Plugins are consulted in registration order for each
/// custom-tagged entry; the hydrated sub-values are passed positionally.
pub trait DecodePlugin: Send + Sync {
    /// Claim `tag` by returning the reconstructed value, or decline with
    /// `Ok(None)`.
    fn decode(&self, tag: &str, fields: &[Value]) -> Result<Option<Value>, PluginError>;
}

/// Error raised by a plugin. Fatal to the call that invoked the plugin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("plugin failed: {message}")]
pub struct PluginError {
    message: String,
}

impl PluginError {
    pub fn new<M: Into<String>>(message: M) -> PluginError {
        PluginError {
            message: message.into(),
        }
    }
}

/// Plugin pair that transports [`Value::Custom`] values verbatim: each custom
/// value is encoded under its own tag and any tag no earlier plugin claimed
/// is rebuilt as a custom value.
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomPassthrough;

impl EncodePlugin for CustomPassthrough {
    fn encode(&self, value: &Value) -> Result<Option<(String, Vec<Value>)>, PluginError> {
        match value {
            Value::Custom(custom) => Ok(Some((
                custom.tag().to_owned(),
                custom.fields().to_vec(),
            ))),
            _ => Ok(None),
        }
    }
}

impl DecodePlugin for CustomPassthrough {
    fn decode(&self, tag: &str, fields: &[Value]) -> Result<Option<Value>, PluginError> {
        Ok(Some(Value::custom(tag, fields.to_vec())))
    }
}
