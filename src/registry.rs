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

//! The Type Registry (spec section 4.1): a process-wide table mapping type
//! names to [`TypeDescriptor`]s, plus the two bootstrap root types ("object"
//! and "interface").
//!
//! Single-threaded and cooperative, as the spec's concurrency model demands
//! (section 5): no locking primitives anywhere in this crate, and the
//! registry itself lives behind a `thread_local!`, never a `Mutex`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::class::{materialize, ClassDescriptor};
use crate::error::{fatal, Error};
use crate::type_descriptor::TypeDescriptor;
use crate::type_info::{InitPhase, TypeInfo};

thread_local! {
	static REGISTRY: RefCell<TypeRegistry> = RefCell::new(TypeRegistry::new());
}

/// Runs `f` with shared access to the process-wide registry.
pub fn with_registry<R>(f: impl FnOnce(&TypeRegistry) -> R) -> R {
	REGISTRY.with(|r| f(&r.borrow()))
}

/// Runs `f` with exclusive access to the process-wide registry. Panics
/// (via the fatal sink) if called reentrantly, e.g. from within a
/// `foreach` callback that tries to register a new type (spec section 4.1,
/// "registering while enumerating is a usage error").
pub fn with_registry_mut<R>(f: impl FnOnce(&mut TypeRegistry) -> R) -> R {
	REGISTRY.with(|r| f(&mut r.borrow_mut()))
}

/// Idempotently bootstraps the registry's two root types and registers any
/// caller-declared types eagerly. Safe to call more than once: later calls
/// are no-ops. See `SPEC_FULL.md` section B for why idempotence, not a
/// single-call-site requirement, was chosen here.
pub fn init() {
	with_registry_mut(|registry| registry.bootstrap_roots());
}

/// Registers a type, returning its freshly allocated [`TypeDescriptor`].
/// Fatal (usage error) on a duplicate name. If `info.init_phase` is
/// [`InitPhase::Register`], the class is materialized immediately rather
/// than lazily.
pub fn register(info: TypeInfo) -> Rc<TypeDescriptor> {
	with_registry_mut(|registry| registry.register(info))
}

/// As [`register`], for a batch of types registered in one contiguous call
/// (mirrors the original's `type_register_static_array`, spec section C).
pub fn register_many(infos: impl IntoIterator<Item = TypeInfo>) -> Vec<Rc<TypeDescriptor>> {
	with_registry_mut(|registry| infos.into_iter().map(|info| registry.register(info)).collect())
}

/// Looks up a registered type by name, materializing nothing. Returns
/// `None` if unregistered, rather than going fatal: lookups back callers
/// that need to tell "unregistered" from "registered" apart without a
/// panic (e.g. interface-already-covered checks during materialization).
pub fn lookup(name: &str) -> Option<Rc<TypeDescriptor>> {
	with_registry(|registry| registry.lookup(name))
}

/// `is_compatible` (spec section 6): true if `candidate` is, or descends
/// from, `target` by parent ancestry alone (interface implementation is
/// deliberately not considered here; see [`crate::cast::is_compatible_type`]
/// for the cast-based query that also consults a class's interface list).
pub fn is_compatible(candidate: &str, target: &str) -> bool {
	with_registry(|registry| registry.is_compatible(candidate, target))
}

/// `class_foreach` (spec section 6): materializes and visits every
/// registered type's class, optionally restricted to descendants/
/// implementors of `filter_name` and/or excluding abstract types.
pub fn class_foreach(
	filter_name: Option<&str>,
	include_abstract: bool,
	f: impl FnMut(&Rc<ClassDescriptor>),
) {
	with_registry_mut(|registry| registry.class_foreach(filter_name, include_abstract, f))
}

/// `class_get_list` (spec section 6): the same traversal as
/// [`class_foreach`], collected into a `Vec`.
pub fn class_get_list(filter_name: Option<&str>, include_abstract: bool) -> Vec<Rc<ClassDescriptor>> {
	with_registry_mut(|registry| registry.class_get_list(filter_name, include_abstract))
}

/// `get_instance_size` (spec section 6).
pub fn get_instance_size(name: &str) -> usize {
	with_registry(|registry| crate::class::get_instance_size_in(registry, name))
}

/// `class_get_parent` (spec section 6).
pub fn class_get_parent(class: &ClassDescriptor) -> Option<Rc<ClassDescriptor>> {
	with_registry(|registry| crate::class::class_get_parent_in(registry, class))
}

/// `class_is_abstract` (spec section 6).
pub fn class_is_abstract(class: &ClassDescriptor) -> bool {
	with_registry(|registry| crate::class::class_is_abstract_in(registry, class))
}

/// The registry itself. Kept separate from the `thread_local!` plumbing
/// above so it can be unit-tested directly, without going through the
/// process-wide singleton.
pub struct TypeRegistry {
	types: HashMap<Rc<str>, Rc<TypeDescriptor>>,
	enumerating: bool,
}

impl TypeRegistry {
	pub fn new() -> Self {
		Self {
			types: HashMap::new(),
			enumerating: false,
		}
	}

	/// Registers the two bootstrap root types, "object" and "interface",
	/// if not already present. Both are abstract, parentless, and carry no
	/// hooks: all behavior is added by types that derive from them.
	pub fn bootstrap_roots(&mut self) {
		if !self.types.contains_key("object") {
			self.register(TypeInfo::root("object"));
		}
		if !self.types.contains_key("interface") {
			self.register(TypeInfo::root("interface"));
		}
	}

	pub fn register(&mut self, info: TypeInfo) -> Rc<TypeDescriptor> {
		if self.enumerating {
			fatal(Error::usage("cannot register a type while enumerating the registry"));
		}
		let name: Rc<str> = Rc::from(info.name.as_str());
		if self.types.contains_key(&name) {
			fatal(Error::usage(format!("type {:?} already registered", name)));
		}

		let interfaces: Vec<Rc<str>> = info
			.declared_interfaces
			.iter()
			.map(|s| Rc::from(s.as_str()))
			.collect();
		let init_phase = info.init_phase;
		let descriptor = Rc::new(TypeDescriptor::new(info, interfaces));
		self.types.insert(name.clone(), descriptor.clone());

		if init_phase == InitPhase::Register {
			materialize(self, &descriptor);
		}

		descriptor
	}

	pub fn lookup(&self, name: &str) -> Option<Rc<TypeDescriptor>> {
		self.types.get(name).cloned()
	}

	/// Calls `f` with every registered [`TypeDescriptor`], in unspecified
	/// order. Registering a new type from within `f` is a usage error
	/// (spec section 4.1).
	pub fn foreach(&mut self, mut f: impl FnMut(&Rc<TypeDescriptor>)) {
		self.enumerating = true;
		let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			for descriptor in self.types.values() {
				f(descriptor);
			}
		}));
		self.enumerating = false;
		if let Err(payload) = result {
			std::panic::resume_unwind(payload);
		}
	}

	/// Materializes and visits every registered type's class, in
	/// unspecified order, applying the same reentrancy guard as
	/// [`TypeRegistry::foreach`]. `filter_name`, if given, restricts the
	/// visit to classes that are, descend from, or implement that type
	/// (spec section 4.1, "materializing each so that `filter` ... can be
	/// evaluated via dynamic cast"); `include_abstract` controls whether
	/// abstract types are visited at all.
	pub fn class_foreach(
		&mut self,
		filter_name: Option<&str>,
		include_abstract: bool,
		mut f: impl FnMut(&Rc<ClassDescriptor>),
	) {
		if let Some(filter) = filter_name {
			if !self.types.contains_key(filter) {
				fatal(Error::resolution(filter.to_string()));
			}
		}

		self.enumerating = true;
		let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			let names: Vec<Rc<str>> = self.types.keys().cloned().collect();
			for name in names {
				let ty = self.types.get(&name).cloned().expect("just collected from this map");
				let class = materialize(&*self, &ty);
				if !include_abstract && ty.is_abstract() {
					continue;
				}
				if let Some(filter) = filter_name {
					if !self.is_compatible(&ty.name, filter) {
						continue;
					}
				}
				f(&class);
			}
		}));
		self.enumerating = false;
		if let Err(payload) = result {
			std::panic::resume_unwind(payload);
		}
	}

	/// As [`TypeRegistry::class_foreach`], collected into a `Vec`.
	pub fn class_get_list(&mut self, filter_name: Option<&str>, include_abstract: bool) -> Vec<Rc<ClassDescriptor>> {
		let mut out = Vec::new();
		self.class_foreach(filter_name, include_abstract, |class| out.push(class.clone()));
		out
	}

	/// True if `candidate` names a type that is `target` or a descendant of
	/// it, walking up `candidate`'s parent chain. Fatal if either name is
	/// unregistered.
	pub fn is_compatible(&self, candidate: &str, target: &str) -> bool {
		let mut current = self
			.lookup(candidate)
			.unwrap_or_else(|| fatal(Error::resolution(candidate.to_string())));
		if !self.types.contains_key(target) {
			fatal(Error::resolution(target.to_string()));
		}
		loop {
			if current.name.as_ref() == target {
				return true;
			}
			match current.parent(|name| self.lookup(name)) {
				Some(parent) => current = parent.clone(),
				None => return false,
			}
		}
	}
}

impl Default for TypeRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bootstrap_is_idempotent() {
		let mut registry = TypeRegistry::new();
		registry.bootstrap_roots();
		registry.bootstrap_roots();
		assert!(registry.lookup("object").is_some());
		assert!(registry.lookup("interface").is_some());
	}

	#[test]
	fn duplicate_registration_is_fatal() {
		let mut registry = TypeRegistry::new();
		registry.bootstrap_roots();
		registry.register(TypeInfo::new("widget", "object"));
		let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			registry.register(TypeInfo::new("widget", "object"));
		}));
		assert!(result.is_err());
	}

	#[test]
	fn is_compatible_walks_ancestry() {
		let mut registry = TypeRegistry::new();
		registry.bootstrap_roots();
		registry.register(TypeInfo::new("widget", "object"));
		registry.register(TypeInfo::new("gadget", "widget"));
		assert!(registry.is_compatible("gadget", "widget"));
		assert!(registry.is_compatible("gadget", "object"));
		assert!(!registry.is_compatible("widget", "gadget"));
	}

	#[test]
	fn foreach_visits_all_registered_types() {
		let mut registry = TypeRegistry::new();
		registry.bootstrap_roots();
		registry.register(TypeInfo::new("widget", "object"));
		let mut seen = Vec::new();
		registry.foreach(|ty| seen.push(ty.name.to_string()));
		assert!(seen.contains(&"object".to_string()));
		assert!(seen.contains(&"interface".to_string()));
		assert!(seen.contains(&"widget".to_string()));
	}

	#[test]
	fn class_get_list_filters_by_ancestry_and_abstractness() {
		let mut registry = TypeRegistry::new();
		registry.bootstrap_roots();
		registry.register(TypeInfo::new("widget", "object"));
		registry.register(TypeInfo::new("gadget", "widget"));
		registry.register(TypeInfo::new("gizmo", "object"));

		let widgets = registry.class_get_list(Some("widget"), true);
		let names: Vec<String> = widgets.iter().map(|c| c.type_name.to_string()).collect();
		assert!(names.contains(&"widget".to_string()));
		assert!(names.contains(&"gadget".to_string()));
		assert!(!names.contains(&"gizmo".to_string()));

		let mut info = TypeInfo::new("shape", "object");
		info.abstract_ = true;
		registry.register(info);
		let concrete_only = registry.class_get_list(None, false);
		assert!(!concrete_only.iter().any(|c| &*c.type_name == "shape"));
		let with_abstract = registry.class_get_list(None, true);
		assert!(with_abstract.iter().any(|c| &*c.type_name == "shape"));
	}
}
