// Copyright 2019
//     by  Centrality Investments Ltd.
//     and Parity Technologies (UK) Ltd.
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

//! The error taxonomy for the type/object core.
//!
//! Every variant here is, by contract, fatal: the only public entry point
//! that consumes an [`Error`] is [`fatal`], which logs it and aborts the
//! process via panic. Nothing in this crate returns `Result<_, Error>` to a
//! caller. The type still exists (rather than building ad-hoc strings at
//! each call site) so the diagnostic format stays consistent and so the
//! handful of internal helpers that *can* fail locally (for instance,
//! resolving a parent name before we know whether it is fatal) have
//! something typed to propagate with `?`.

use std::fmt;

/// A caller site, forwarded through the `*_assert` family so that a fatal
/// diagnostic points at the offending call rather than at this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallSite {
	pub file: &'static str,
	pub line: u32,
	pub func: &'static str,
}

impl CallSite {
	pub const fn new(file: &'static str, line: u32, func: &'static str) -> Self {
		Self { file, line, func }
	}
}

impl fmt::Display for CallSite {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{} ({})", self.file, self.line, self.func)
	}
}

/// Captures the call site of the current function, for use in `*_assert`
/// entry points.
#[macro_export]
macro_rules! call_site {
	() => {
		$crate::error::CallSite::new(file!(), line!(), "<unknown>")
	};
}

/// The error taxonomy of the core. See module docs: every variant here is
/// fatal when it reaches [`fatal`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// Registering a duplicate name; instantiating an abstract type;
	/// querying with a null/empty name where non-empty is required;
	/// ref/unref imbalance; registering during enumeration.
	#[error("usage error: {0}")]
	Usage(String),

	/// Unknown parent name, unknown declared interface, unknown target
	/// name in a `*_assert` cast.
	#[error("unknown type {name:?}")]
	Resolution { name: String },

	/// Parent chain cycle, `instance_size` smaller than the instance
	/// header, `class_size` smaller than the parent's.
	#[error("structural error: {0}")]
	Structural(String),

	/// A dynamic cast to an interface reachable through two or more
	/// distinct interface entries.
	#[error("ambiguous cast to {target:?} from {source:?}")]
	Ambiguity { source: String, target: String },
}

impl Error {
	pub fn usage(msg: impl Into<String>) -> Self {
		Error::Usage(msg.into())
	}

	pub fn resolution(name: impl Into<String>) -> Self {
		Error::Resolution { name: name.into() }
	}

	pub fn structural(msg: impl Into<String>) -> Self {
		Error::Structural(msg.into())
	}

	pub fn ambiguity(source: impl Into<String>, target: impl Into<String>) -> Self {
		Error::Ambiguity {
			source: source.into(),
			target: target.into(),
		}
	}
}

/// The one fatal-error sink the core uses. Logs `err` (optionally annotated
/// with the caller site that triggered it) and terminates the process.
///
/// This is the Rust analogue of the environment's "fatal-error sink"
/// primitive (spec section on environment primitives): a diagnostic
/// followed by abort. Panicking (rather than `std::process::abort`) is used
/// so that the standard `#[should_panic]` test idiom can exercise these
/// paths.
#[track_caller]
pub fn fatal(err: Error) -> ! {
	tracing::error!(error = %err, "fatal type-system error");
	panic!("{err}");
}

/// As [`fatal`], but prefixes the message with an explicit caller site
/// forwarded from a `*_assert` entry point, mirroring the original's
/// `__FILE__`/`__LINE__`/`__func__` forwarding.
pub fn fatal_at(site: CallSite, err: Error) -> ! {
	tracing::error!(error = %err, at = %site, "fatal type-system error");
	panic!("{site}: {err}");
}
