// Copyright 2025 larder Project Authors
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

//! Cache construction from a URL.
//!
//! Supported forms:
//!
//! - `mem://lru?max_keys=10&max_cache_size=1024`
//! - `mem://expirable?ttl=30s&max_val_size=100`
//! - `nop://`
//!
//! Recognized query parameters: `max_keys`, `max_val_size`, `max_key_size`,
//! `max_cache_size`, and `ttl` (a duration like `500ms`, `30s`, `5m`, `2h`).
//! Unknown parameters are ignored; unparseable values are collected into one
//! aggregate error.

use std::time::Duration;

use crate::{
    cache::Cache,
    config::{CacheBuilder, Strategy},
    error::{Error, Result},
    Value,
};

impl<V> Cache<V>
where
    V: Value,
{
    /// Construct a cache from a URL. `remote://` is recognized but a
    /// transport cannot be built from a string; supply a store through
    /// [`CacheBuilder::build_remote`] instead.
    pub async fn from_url(uri: &str) -> Result<Self> {
        let parsed = split_uri(uri)?;

        match parsed.scheme {
            "mem" => {
                let builder = match parsed.host {
                    // recency-ordered, no expiry unless the query asks for it
                    "lru" => CacheBuilder::new()
                        .with_strategy(Strategy::Lru)
                        .with_ttl(Duration::ZERO),
                    "expirable" => CacheBuilder::new(),
                    _ => return Err(Error::UnsupportedUrl(uri.to_string())),
                };
                apply_query(builder, &parsed.query)?.build().await
            }
            "nop" => Ok(Cache::nop()),
            "remote" => Err(Error::config(
                "remote cache requires a store, construct it with CacheBuilder::build_remote",
            )),
            _ => Err(Error::UnsupportedUrl(uri.to_string())),
        }
    }
}

struct ParsedUri<'a> {
    scheme: &'a str,
    host: &'a str,
    query: Vec<(&'a str, &'a str)>,
}

fn split_uri(uri: &str) -> Result<ParsedUri<'_>> {
    let (scheme, rest) = uri.split_once("://").ok_or_else(|| Error::InvalidUrl {
        url: uri.to_string(),
        reason: "missing scheme separator".to_string(),
    })?;
    let (host, query) = rest.split_once('?').unwrap_or((rest, ""));
    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect();
    Ok(ParsedUri {
        scheme,
        host: host.trim_end_matches('/'),
        query,
    })
}

fn apply_query<V>(mut builder: CacheBuilder<V>, query: &[(&str, &str)]) -> Result<CacheBuilder<V>>
where
    V: Value,
{
    let mut errs = Vec::new();

    for &(key, value) in query {
        match key {
            "max_keys" | "max_val_size" | "max_key_size" | "max_cache_size" => match value.parse::<i64>() {
                Ok(parsed) => {
                    builder = match key {
                        "max_keys" => builder.with_max_keys(parsed),
                        "max_val_size" => builder.with_max_value_size(parsed),
                        "max_key_size" => builder.with_max_key_size(parsed),
                        _ => builder.with_max_cache_size(parsed),
                    }
                }
                Err(_) => errs.push(Error::config(format!("invalid {key} query parameter {value:?}"))),
            },
            "ttl" => match parse_duration(value) {
                Some(ttl) => builder = builder.with_ttl(ttl),
                None => errs.push(Error::config(format!("invalid ttl query parameter {value:?}"))),
            },
            // unknown parameters are ignored
            _ => {}
        }
    }

    if !errs.is_empty() {
        return Err(Error::multiple(errs));
    }
    Ok(builder)
}

// Duration strings in the `500ms` / `30s` / `5m` / `2h` form.
fn parse_duration(s: &str) -> Option<Duration> {
    let (number, unit): (&str, fn(u64) -> Duration) = if let Some(number) = s.strip_suffix("ms") {
        (number, Duration::from_millis)
    } else if let Some(number) = s.strip_suffix('s') {
        (number, Duration::from_secs)
    } else if let Some(number) = s.strip_suffix('m') {
        (number, |m| Duration::from_secs(m * 60))
    } else if let Some(number) = s.strip_suffix('h') {
        (number, |h| Duration::from_secs(h * 60 * 60))
    } else {
        return None;
    };
    number.parse::<u64>().ok().map(unit)
}
