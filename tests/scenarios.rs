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

//! End-to-end seeding scenarios exercised against the process-wide
//! registry (each test gets its own `thread_local!` instance, since
//! `cargo test` runs each test on its own thread).

use std::any::Any;

use object_model::cast::{class_by_name, class_dynamic_cast_assert, is_compatible_type, object_dynamic_cast};
use object_model::class::class_get_name;
use object_model::error::CallSite;
use object_model::object::{object_get_typename, object_initialize, object_new, object_unref};
use object_model::registry::{
	class_get_list, class_get_parent, class_is_abstract, get_instance_size, is_compatible, register, register_many,
};
use object_model::type_info::{ClassData, TypeInfo};

fn here() -> CallSite {
	CallSite::new(file!(), line!(), "test")
}

#[test]
fn minimal_hierarchy() {
	object_model::init();
	register(TypeInfo::new("animal", "object"));
	register(TypeInfo::new("dog", "animal"));

	let obj = object_new("dog");
	assert_eq!(&*object_get_typename(&obj), "dog");
	assert!(is_compatible_type(&obj.get_class(), "animal"));
	assert!(is_compatible_type(&obj.get_class(), "object"));
	object_unref(obj);
}

#[derive(Clone)]
struct SpeakClass {
	greeting: &'static str,
}

fn base_class_init(class: &mut dyn ClassData, _data: Option<&dyn Any>) {
	if let Some(speak) = class.as_any_mut().downcast_mut::<SpeakClass>() {
		speak.greeting = "...";
	}
}

fn dog_class_init(class: &mut dyn ClassData, _data: Option<&dyn Any>) {
	if let Some(speak) = class.as_any_mut().downcast_mut::<SpeakClass>() {
		speak.greeting = "woof";
	}
}

#[test]
fn override_replaces_ancestor_class_init_result() {
	object_model::init();
	let base = {
		let mut info = TypeInfo::new("speaker", "object");
		info.hooks.class_new = Some(|_parent: Option<&dyn Any>| -> Box<dyn ClassData> {
			Box::new(SpeakClass { greeting: "" })
		});
		info.hooks.class_init = Some(base_class_init);
		info
	};
	let dog = {
		let mut info = TypeInfo::new("barker", "speaker");
		info.hooks.class_init = Some(dog_class_init);
		info
	};
	register_many(vec![base, dog]);

	let obj = object_new("barker");
	let class = obj.get_class();
	let speak = class.downcast_ref::<SpeakClass>().expect("SpeakClass payload");
	assert_eq!(speak.greeting, "woof");
	object_unref(obj);
}

#[test]
#[should_panic(expected = "cannot instantiate abstract type")]
fn abstract_refusal() {
	object_model::init();
	let mut info = TypeInfo::new("shape", "object");
	info.abstract_ = true;
	register(info);
	let obj = object_new("shape");
	object_unref(obj);
}

#[test]
#[should_panic(expected = "already registered")]
fn duplicate_rejection() {
	object_model::init();
	register(TypeInfo::new("widget", "object"));
	register(TypeInfo::new("widget", "object"));
}

#[test]
fn interface_cast() {
	object_model::init();
	let mut iface = TypeInfo::new("printable", "interface");
	iface.abstract_ = true;
	register(iface);

	let mut doc = TypeInfo::new("document", "object");
	doc.declared_interfaces = vec!["printable".into()];
	register(doc);
	register(TypeInfo::new("unrelated-sibling", "object"));

	let obj = object_new("document");
	assert!(object_dynamic_cast(&obj, "printable").is_some());
	assert!(object_dynamic_cast(&obj, "object").is_some());
	assert!(object_dynamic_cast(&obj, "unrelated-sibling").is_none());
	object_unref(obj);
}

#[test]
#[should_panic]
fn ambiguous_interface_cast() {
	object_model::init();
	register({
		let mut i = TypeInfo::new("readable", "interface");
		i.abstract_ = true;
		i
	});
	register({
		let mut i = TypeInfo::new("writable", "interface");
		i.abstract_ = true;
		i
	});
	let mut info = TypeInfo::new("channel", "object");
	info.declared_interfaces = vec!["readable".into(), "writable".into()];
	register(info);

	let obj = object_new("channel");
	class_dynamic_cast_assert(here(), &obj.get_class(), "interface");
	object_unref(obj);
}

#[test]
fn class_introspection_surface() {
	object_model::init();
	let mut shape = TypeInfo::new("polygon", "object");
	shape.abstract_ = true;
	register(shape);
	register(TypeInfo::new("triangle", "polygon"));

	let triangle = class_by_name("triangle").expect("registered");
	assert_eq!(&*class_get_name(&triangle), "triangle");
	assert!(!class_is_abstract(&triangle));
	let parent = class_get_parent(&triangle).expect("has a parent");
	assert_eq!(&*parent.type_name, "polygon");
	assert!(class_is_abstract(&parent));
	assert!(class_by_name("never-registered").is_none());

	assert_eq!(get_instance_size("triangle"), 1);

	let polygons = class_get_list(Some("polygon"), true);
	assert!(polygons.iter().any(|c| &*c.type_name == "polygon"));
	assert!(polygons.iter().any(|c| &*c.type_name == "triangle"));
	let concrete_polygons = class_get_list(Some("polygon"), false);
	assert!(!concrete_polygons.iter().any(|c| &*c.type_name == "polygon"));
	assert!(concrete_polygons.iter().any(|c| &*c.type_name == "triangle"));

	let obj = object_initialize("triangle", get_instance_size("triangle"));
	assert_eq!(&*object_get_typename(&obj), "triangle");
	object_unref(obj);

	assert!(is_compatible("triangle", "polygon"));
	assert!(is_compatible("triangle", "object"));
	assert!(!is_compatible("polygon", "triangle"));
}
