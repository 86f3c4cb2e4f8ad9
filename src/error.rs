// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The crate's error type and the de-duplicated error list the
//! renderer keeps for its callers.

use failure::Fail;

/// Everything that can stop a render.
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum RenderError {
    /// A buffer was too large to allocate.
    #[fail(display = "could not allocate {} bytes for the {}", bytes, what)]
    Allocation {
        /// Which buffer.
        what: &'static str,
        /// Its size.
        bytes: usize,
    },

    /// The genome failed `Genome::check`.
    #[fail(display = "invalid genome: {}", _0)]
    InvalidGenome(String),

    /// Density estimation would need too many kernels.
    #[fail(display = "density filter needs {} kernels, more than the limit", _0)]
    DensityFilter(usize),

    /// The spatial filter kept summing to zero.
    #[fail(display = "spatial filter did not normalize after {} attempts", _0)]
    SpatialFilter(usize),

    /// Settings out of range.
    #[fail(display = "invalid render settings: {}", _0)]
    InvalidSettings(String),

    /// The caller's output buffer is short.
    #[fail(display = "output buffer holds {} bytes, {} are required", got, needed)]
    OutputTooSmall {
        /// Bytes supplied.
        got: usize,
        /// Bytes the frame needs.
        needed: usize,
    },

    #[fail(display = "a render worker thread panicked")]
    /// An iteration thread died.
    WorkerPanic,
}

/// Results carrying a `RenderError`.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Error messages in the order first seen, without repeats.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorReport {
    messages: Vec<String>,
}

impl ErrorReport {
    /// An empty report.
    pub fn new() -> Self {
        ErrorReport::default()
    }

    /// Records `message` unless it is already present.
    pub fn push<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        if !self.messages.contains(&message) {
            self.messages.push(message);
        }
    }

    /// Records an error's message.
    pub fn push_error(&mut self, err: &RenderError) {
        self.push(err.to_string());
    }

    /// Messages in the order first seen.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of distinct messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Forgets every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Moves every message of `other` that is not already here.
    pub fn extend(&mut self, other: &ErrorReport) {
        for m in &other.messages {
            self.push(m.as_str());
        }
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.messages.join("\n"))
    }
}
