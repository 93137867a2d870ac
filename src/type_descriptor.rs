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

//! [`TypeDescriptor`]: the registry-owned, (mostly) immutable record of a
//! registered type. See spec section 3 for the exact invariants.

use std::cell::OnceCell;
use std::rc::Rc;

use crate::class::ClassDescriptor;
use crate::type_info::{Hooks, InitPhase, TypeInfo};

/// One per registered type. Created by [`crate::registry::TypeRegistry::register`]
/// and never mutated afterward except for the two lazy cache fields
/// (`parent_type`, `class`), per spec invariant (I3).
pub struct TypeDescriptor {
	pub name: Rc<str>,
	pub parent_name: Option<Rc<str>>,
	pub declared_instance_size: usize,
	pub declared_class_size: usize,
	pub declared_abstract: bool,
	pub hooks: Hooks,
	pub declared_interfaces: Vec<Rc<str>>,
	pub init_phase: InitPhase,

	/// Resolved on first ancestor walk; caches the `Rc` handle to the
	/// parent's own descriptor so repeated chain walks don't re-hit the
	/// registry hash map.
	parent_type: OnceCell<Rc<TypeDescriptor>>,
	/// Set exactly once, by the Materializer. Per (I3), this is the only
	/// field besides `parent_type` ever written after construction.
	class: OnceCell<Rc<ClassDescriptor>>,

	effective_instance_size: OnceCell<usize>,
	effective_class_size: OnceCell<usize>,
	effective_abstract: OnceCell<bool>,
}

impl TypeDescriptor {
	pub(crate) fn new(info: TypeInfo, interfaces: Vec<Rc<str>>) -> Self {
		Self {
			name: Rc::from(info.name.as_str()),
			parent_name: info.parent.map(|p| Rc::from(p.as_str())),
			declared_instance_size: info.instance_size,
			declared_class_size: info.class_size,
			declared_abstract: info.abstract_,
			hooks: info.hooks,
			declared_interfaces: interfaces,
			init_phase: info.init_phase,
			parent_type: OnceCell::new(),
			class: OnceCell::new(),
			effective_instance_size: OnceCell::new(),
			effective_class_size: OnceCell::new(),
			effective_abstract: OnceCell::new(),
		}
	}

	/// Returns the resolved parent, caching it on first lookup. `resolve`
	/// is handed in by the caller (the registry) rather than captured,
	/// since `TypeDescriptor` itself holds no reference back to the
	/// registry.
	pub(crate) fn parent<'a>(
		&'a self,
		resolve: impl FnOnce(&str) -> Option<Rc<TypeDescriptor>>,
	) -> Option<&'a Rc<TypeDescriptor>> {
		match &self.parent_name {
			None => None,
			Some(name) => Some(self.parent_type.get_or_init(|| {
				resolve(name).unwrap_or_else(|| {
					crate::error::fatal(crate::error::Error::resolution(name.to_string()))
				})
			})),
		}
	}

	pub fn class(&self) -> Option<&Rc<ClassDescriptor>> {
		self.class.get()
	}

	/// Publishes the materialized class. Per (I3)/spec section 4.3's
	/// ordering guarantee, this must be the *last* write a materializer
	/// performs for a type, so no observer ever sees a half-built class.
	/// Idempotent-fatal: calling this twice is a logic error in the
	/// Materializer, not a user-reachable condition, so it panics plainly
	/// rather than going through the fatal-error sink.
	pub(crate) fn publish_class(&self, class: Rc<ClassDescriptor>) {
		self.class
			.set(class)
			.unwrap_or_else(|_| panic!("class already materialized for type {:?}", self.name));
	}

	pub fn effective_instance_size(&self) -> usize {
		*self
			.effective_instance_size
			.get()
			.expect("effective sizes computed during materialization")
	}

	pub fn effective_class_size(&self) -> usize {
		*self
			.effective_class_size
			.get()
			.expect("effective sizes computed during materialization")
	}

	pub fn is_abstract(&self) -> bool {
		*self
			.effective_abstract
			.get()
			.expect("effective sizes computed during materialization")
	}

	/// Computes and caches the effective sizes/abstractness from a parent's
	/// already-computed effective sizes. Called exactly once, by the
	/// Materializer, as step 1 of spec section 4.3's algorithm.
	pub(crate) fn compute_effective_sizes(&self, parent: Option<&TypeDescriptor>) {
		let parent_instance_size = parent.map(|p| p.effective_instance_size()).unwrap_or(0);
		let parent_class_size = parent.map(|p| p.effective_class_size()).unwrap_or(0);

		let instance_size = if self.declared_instance_size != 0 {
			self.declared_instance_size
		} else {
			parent_instance_size
		};
		let class_size = if self.declared_class_size != 0 {
			self.declared_class_size
		} else {
			parent_class_size
		};

		if class_size < parent_class_size {
			crate::error::fatal(crate::error::Error::structural(format!(
				"type {:?} has class_size {} smaller than parent's {}",
				self.name, class_size, parent_class_size
			)));
		}

		let abstract_ = self.declared_abstract || instance_size == 0;

		let _ = self.effective_instance_size.set(instance_size);
		let _ = self.effective_class_size.set(class_size);
		let _ = self.effective_abstract.set(abstract_);
	}
}

impl std::fmt::Debug for TypeDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TypeDescriptor")
			.field("name", &self.name)
			.field("parent_name", &self.parent_name)
			.finish_non_exhaustive()
	}
}
