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

//! A reserved slot for the property system the original associates with
//! every class and instance. Out of scope here (spec section 1's
//! Non-goals list "a property/QOM-property system beyond allocation"): this
//! crate allocates the table so its presence in [`crate::class::ClassDescriptor`]
//! and instance layout doesn't need to change if a future crate version
//! adds real get/set operations, but exposes no read or write API today.

use std::collections::HashMap;

/// An allocated, currently inert property table.
#[derive(Default)]
pub struct PropertyTable {
	#[allow(dead_code)]
	entries: HashMap<String, ()>,
}

impl PropertyTable {
	pub fn new() -> Self {
		Self {
			entries: HashMap::new(),
		}
	}
}
