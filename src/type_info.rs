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

//! [`TypeInfo`]: the caller-supplied description of a type, as passed to
//! [`crate::registry::register`]. This is the input; [`crate::type_descriptor::TypeDescriptor`]
//! is what the registry turns it into.

use std::any::Any;
use std::rc::Rc;

/// Constructs a new class payload of the type introducing it. Called only
/// for a type that declares its own class struct (i.e. whose `class_size`
/// is non-zero, meaning it adds vtable fields beyond its parent's). `parent`
/// is the already-materialized parent class data, available so the new
/// struct can embed a copy of it; it is `None` only for the two root types.
pub type ClassNewFn = fn(parent: Option<&dyn Any>) -> Box<dyn ClassData>;

/// Lets a class override entries in its (already parent-inherited) class
/// payload. Invoked once, last, during materialization.
pub type ClassInitFn = fn(class: &mut dyn ClassData, class_data: Option<&dyn Any>);

/// Invoked on every base class, after parent materialization but before
/// `class_init`, to undo effects of inheriting the parent's entries ("undo
/// the memcpy" in the original C model — see spec section 4.3 step 7).
pub type ClassBaseInitFn = fn(class: &mut dyn ClassData, class_data: Option<&dyn Any>);

/// Constructs the per-instance state introduced by a type. Called only for
/// a type that declares its own instance fields (non-zero `instance_size`
/// relative to its parent).
pub type InstanceNewFn = fn() -> Box<dyn Any>;

/// Initializes a type's own instance state. Invoked top-down (root to leaf)
/// over every ancestor that has one.
pub type InstanceInitFn = fn(state: &mut dyn Any);

/// Tears down a type's own instance state. Invoked bottom-up (leaf to
/// root), before the state (and eventually the instance) is freed.
pub type InstanceFinalizeFn = fn(state: &mut dyn Any);

/// A class payload: the author-defined vtable/metadata struct for one
/// type's class. Blanket-implemented for any `Any + Clone` type, since
/// materializing a subclass that does *not* introduce a new class struct
/// just clones the parent's payload verbatim (see spec section 4.3 step 3
/// and the design notes on replacing byte-copy inheritance with cloning).
pub trait ClassData: Any {
	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
	fn clone_data(&self) -> Box<dyn ClassData>;
}

impl<T: Any + Clone> ClassData for T {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}

	fn clone_data(&self) -> Box<dyn ClassData> {
		Box::new(self.clone())
	}
}

/// Controls when a type's class is first materialized: at registration, or
/// lazily on first use. See spec section 3 and 4.3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitPhase {
	/// Materialize immediately when `register` inserts the type.
	Register,
	/// Materialize the first time something needs the class (default).
	Lazy,
}

impl Default for InitPhase {
	fn default() -> Self {
		InitPhase::Lazy
	}
}

/// The hooks and declared interfaces portion of a [`TypeInfo`], broken out
/// into its own struct so [`crate::type_descriptor::TypeDescriptor`] can
/// hold it directly without re-deriving `Default`.
#[derive(Default, Clone)]
pub struct Hooks {
	pub instance_new: Option<InstanceNewFn>,
	pub instance_init: Option<InstanceInitFn>,
	pub instance_finalize: Option<InstanceFinalizeFn>,
	pub class_new: Option<ClassNewFn>,
	pub class_init: Option<ClassInitFn>,
	pub class_base_init: Option<ClassBaseInitFn>,
	pub class_finalize: Option<ClassFinalizeFn>,
	/// Opaque data forwarded to `class_init`/`class_base_init`/`class_finalize`.
	pub class_data: Option<Rc<dyn Any>>,
}

pub type ClassFinalizeFn = fn(class: &mut dyn ClassData, class_data: Option<&dyn Any>);

/// The caller-supplied description of a type, as passed to
/// [`crate::registry::TypeRegistry::register`]. `instance_size` and
/// `class_size` of `0` mean "inherit the parent's effective size" (spec
/// section 3); a declared `instance_size` that is effectively `0` all the
/// way up the parent chain forces the type abstract.
#[derive(Default, Clone)]
pub struct TypeInfo {
	pub name: String,
	pub parent: Option<String>,
	pub instance_size: usize,
	pub class_size: usize,
	pub abstract_: bool,
	pub hooks: Hooks,
	pub declared_interfaces: Vec<String>,
	pub init_phase: InitPhase,
}

impl TypeInfo {
	/// Convenience constructor for the common concrete case: name and
	/// parent only, everything else left at its default (lazy, no hooks).
	/// `instance_size` defaults to a nominal `1` rather than `0`: unlike
	/// the original, nothing here actually allocates a buffer of that many
	/// bytes (instance state is a `Vec` of individually boxed, opt-in
	/// slots — see `object.rs`), so the byte count itself is moot, but
	/// leaving it at `0` would trip the "effectively zero forces abstract"
	/// rule (spec section 4.2) for every type built this way. A type that
	/// declares its own state with `instance_new`, or one that should be
	/// abstract, overrides the relevant field directly after construction.
	pub fn new(name: impl Into<String>, parent: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			parent: Some(parent.into()),
			instance_size: 1,
			..Default::default()
		}
	}

	/// As [`TypeInfo::new`], but for a type with no parent (only the two
	/// root types should use this). Instance size is left at `0`
	/// ("object" carries no fields beyond the universal instance header,
	/// conceptually zero-sized in its own right); `abstract_` is set
	/// explicitly, since both roots are abstract by declaration, not
	/// merely because their size happens to be zero. A concrete type
	/// further down the chain is expected to declare its own non-zero
	/// `instance_size` (see spec section 4.2), exactly as the original's
	/// own leaf types do.
	pub fn root(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			parent: None,
			abstract_: true,
			..Default::default()
		}
	}
}
