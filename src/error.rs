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

use std::fmt::Display;

/// Cache error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid cache option. Fatal to construction, never raised afterwards.
    #[error("failed to set cache option: {0}")]
    Config(String),
    /// Error returned by a caller-supplied loader. Propagated verbatim; the
    /// failed outcome is never cached.
    #[error(transparent)]
    Loader(anyhow::Error),
    /// Error raised by a remote backend store. Counted as a loader error in
    /// the cache statistics.
    #[error("remote store error: {0}")]
    Remote(#[source] anyhow::Error),
    /// Error raised by the event bus during subscription.
    #[error("event bus error: {0}")]
    Bus(#[source] anyhow::Error),
    /// A string that is not in the canonical `partition@@id@@scopes` form.
    #[error("can not parse cache key {0:?}")]
    KeyParse(String),
    /// A cache URL with an unrecognized scheme or memory backend.
    #[error("unsupported cache url {0:?}")]
    UnsupportedUrl(String),
    /// A cache URL that does not even split into `scheme://rest`.
    #[error("invalid cache url {url:?}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Multiple error list.
    #[error(transparent)]
    Multiple(MultipleError),
}

impl Error {
    /// Combine multiple errors into one error.
    pub fn multiple(errs: Vec<Error>) -> Self {
        Self::Multiple(MultipleError(errs))
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }
}

/// A list of errors reported together, e.g. by cache URL option parsing.
#[derive(thiserror::Error, Debug)]
pub struct MultipleError(Vec<Error>);

impl MultipleError {
    /// The collected errors.
    pub fn errors(&self) -> &[Error] {
        &self.0
    }
}

impl Display for MultipleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "multiple errors: [")?;
        if let Some((last, errs)) = self.0.as_slice().split_last() {
            for err in errs {
                write!(f, "{}, ", err)?;
            }
            write!(f, "{}", last)?;
        }
        write!(f, "]")?;
        Ok(())
    }
}

/// Cache result.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_prefix() {
        let err = Error::config("negative max keys");
        assert_eq!(err.to_string(), "failed to set cache option: negative max keys");
    }

    #[test]
    fn test_multiple_error_format() {
        let err = Error::multiple(vec![
            Error::config("negative max keys"),
            Error::KeyParse("abc".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            "multiple errors: [failed to set cache option: negative max keys, can not parse cache key \"abc\"]"
        );
    }
}
