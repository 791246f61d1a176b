#[cfg(test)]
pub mod test {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use crate::configuration::Configuration;
    use crate::element::{PojoBinding, PojoRegistry};
    use crate::error::ProptreeError;
    use crate::loader::Loader;
    use crate::resource::{Resource, ResourceRegistry, StringResource};
    use crate::value::ValueTypeRegistry;

    #[derive(Debug, PartialEq)]
    pub struct Student {
        pub first_name: String,
        pub age: Option<i32>,
        pub courses: Vec<String>,
        pub nicknames: Option<BTreeSet<String>>,
    }

    impl Default for Student {
        fn default() -> Self {
            Self {
                first_name: String::new(),
                age: None,
                courses: vec!["orientation".into()],
                nicknames: None,
            }
        }
    }

    pub fn student_binding() -> PojoBinding {
        PojoBinding::builder::<Student>("Student")
            .field("firstName", |s: &mut Student| &mut s.first_name)
            .optional("age", |s: &mut Student| &mut s.age)
            .collection("courses", |s: &mut Student| &mut s.courses)
            .collection("nicknames", |s: &mut Student| &mut s.nicknames)
            .build()
    }

    /// Exercises every element form.
    pub const APP: &str = r#"
name = "app"
version = "1.2.3"

[reload]
check-every = "5s"

[metadata]
owner = "platform"
revision = 7

[elements]
port = 8080
big = 5000000000
ratio = 0.5
debug = false
hosts = ["a", "b"]
title = "Demo"
timeout = { value = "30", type = "long", description = "request timeout" }
labels = { value = "x:1,y:2", type = "dict" }
doubled = { expression = "x * 2" }
mode = { switch = [
    { when = "x == 1", value = "a" },
    { when = "x == 2", value = "b" },
    { else = "c" },
] }
alias = { reference = "server:host" }

[elements.server]
host = "localhost"
port = 80

[elements.x1.x1]
xxx = "deep"

[elements.student]
pojo = "Student"
description = "the example student"
fields = { firstName = "Ruslan", age = 30, courses = ["math"] }

[elements.colors]
set = { primary = "red", secondary = "blue", again = "red" }
"#;

    pub const BASE: &str = r#"
name = "base"
include = ["mem:c1", "mem:c2"]

[elements]
local = "base"
"#;

    pub const C1: &str = r#"
name = "c1"

[elements]
p = 1
only-c1 = "c1"
"#;

    pub const C2: &str = r#"
name = "c2"

[elements]
p = 2
only-c2 = "c2"
"#;

    /// Loader with the Student binding and a `mem:` prefix serving `sources`
    /// by name.
    pub fn loader(sources: &[(&str, &str)]) -> Loader {
        let sources: HashMap<String, Arc<StringResource>> = sources
            .iter()
            .map(|(name, content)| {
                let location = format!("mem:{name}");
                (name.to_string(), Arc::new(StringResource::named(&location, content)))
            })
            .collect();
        let resources = ResourceRegistry::with_defaults();
        resources.register("mem", move |name| {
            sources
                .get(name)
                .map(|resource| Arc::clone(resource) as Arc<dyn Resource>)
                .ok_or_else(|| ProptreeError::load(name, "no such source"))
        });
        let pojos = PojoRegistry::new();
        pojos.register(student_binding());
        Loader::new(
            Arc::new(ValueTypeRegistry::with_defaults()),
            Arc::new(pojos),
            Arc::new(resources),
        )
    }

    pub fn parse(source: &str) -> Configuration {
        loader(&[]).load_resource(&StringResource::new(source)).unwrap()
    }

    /// [`BASE`] loaded with its two includes.
    pub fn parse_with_includes() -> Configuration {
        loader(&[("base", BASE), ("c1", C1), ("c2", C2)])
            .load("mem:base")
            .unwrap()
    }
}
