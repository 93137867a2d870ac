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

//! A small, single-threaded runtime type system: a registry of named
//! types arranged in a single-inheritance tree, lazily materialized
//! classes that inherit their parent's vtable-like payload, stateless
//! interfaces a class can implement (possibly through inheritance), and
//! reference-counted instances that can be dynamically cast up and down
//! the type tree.
//!
//! Two types are always present: `"object"`, the root of the concrete
//! type tree, and `"interface"`, the root every interface type descends
//! from. Call [`init`] once at process start (it is safe, and a no-op,
//! to call more than once) before registering or instantiating anything
//! else.
//!
//! ```
//! object_model::init();
//! object_model::registry::register(object_model::type_info::TypeInfo::new("widget", "object"));
//! let obj = object_model::object::object_new("widget");
//! assert_eq!(&*object_model::object::object_get_typename(&obj), "widget");
//! object_model::object::object_unref(obj);
//! ```

pub mod cast;
pub mod class;
pub mod error;
pub mod object;
pub mod property;
pub mod registry;
pub mod type_descriptor;
pub mod type_info;

pub use error::Error;
pub use object::Object;
pub use type_info::TypeInfo;

/// Bootstraps the process-wide registry's two root types. Safe to call
/// more than once.
pub fn init() {
	registry::init();
}
